//! # capture-proof: Provenance Records
//!
//! A [`Proof`] bundles captured payloads with the facts observed at
//! capture time ([`Truth`]) and the signatures over both. It is:
//!
//! - **Self-verifying.** Signatures cover the canonical text of
//!   `{payloads, truth}`; [`Proof::is_verified`] recomputes that text and
//!   checks every signature against an explicit [`VerifierRegistry`].
//! - **Content-identified.** [`Proof::get_id`] hashes the canonical text of
//!   `{payloads, truth, signatures}`, so semantically identical records
//!   share one id regardless of map insertion order.
//! - **Light in memory.** After construction a record holds only payload
//!   keys into the [`ImageStore`]; bytes are read back on demand.
//!
//! [`repository`] persists records as index views; [`legacy`] converts to
//! and from the older backend schema.
//!
//! [`VerifierRegistry`]: capture_crypto::VerifierRegistry
//! [`ImageStore`]: capture_store::ImageStore

pub mod error;
pub mod legacy;
pub mod proof;
pub mod repository;
pub mod truth;

pub use error::{ProofError, RepositoryError};
pub use proof::{
    signed_targets_string, validate_signature, IndexedPayloads, IndexedProofView, PayloadMeta,
    Payloads, Proof, Signatures,
};
pub use repository::{ProofRepository, TableProofRepository};
pub use truth::{validate_facts, DefaultFactId, FactValue, Facts, Truth};
