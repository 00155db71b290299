//! # capture-core: Foundational Types for the Provenance Core
//!
//! This crate is the leaf of the capture workspace. It defines the primitives
//! every other crate builds on: the canonical serialization used for record
//! identity and signatures, the content-hash key of the file stores, provider
//! identifiers, millisecond timestamps, MIME types, and runtime configuration.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every byte string that is hashed or signed
//!    flows through `CanonicalBytes::new()`. Sorted keys at every depth, compact
//!    separators, ECMAScript number formatting. Two records that differ only in
//!    map insertion order serialize identically.
//!
//! 2. **Newtypes for keys.** `ContentHash` and `ProviderId` are validated
//!    newtypes rather than bare strings, so a provider id can never be used
//!    where a store key is expected.
//!
//! 3. **Milliseconds since the Unix epoch.** `Timestamp` serializes as a bare
//!    integer, matching the wire shape of `truth.timestamp`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `capture-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod config;
pub mod error;
pub mod identity;
pub mod mime;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use config::CaptureConfig;
pub use error::{CanonicalizationError, ConfigError, ValidationError};
pub use identity::{ContentHash, ProviderId};
pub use mime::MimeType;
pub use temporal::Timestamp;
