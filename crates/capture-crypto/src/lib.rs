//! # capture-crypto: Cryptographic Capabilities
//!
//! The provenance core never hard-codes a hash function or a signature
//! scheme. It consumes them through the traits defined here:
//!
//! - [`ContentHasher`]: bytes to store key. [`Sha256Hasher`] is the default.
//! - [`SignatureProvider`]: signs the canonical signing target of a record.
//! - [`SignatureVerifier`]: checks one signature; collected per provider id
//!   in an explicit [`VerifierRegistry`] that callers pass to verification.
//!
//! **Ed25519** implementations of the provider and verifier are included for
//! the command-line tool and for tests.
//!
//! ## Crate Policy
//!
//! - Depends only on `capture-core` internally.
//! - No mocking of cryptographic operations in tests: all tests use real
//!   SHA-256 and real Ed25519.

pub mod ed25519;
pub mod error;
pub mod sha256;
pub mod signature;

pub use ed25519::{Ed25519KeyPair, Ed25519SignatureProvider, Ed25519Verifier, ED25519_PROVIDER_ID};
pub use error::CryptoError;
pub use sha256::{sha256_hex, ContentHasher, Sha256Hasher};
pub use signature::{Signature, SignatureProvider, SignatureVerifier, VerifierRegistry};
