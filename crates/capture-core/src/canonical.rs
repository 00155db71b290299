//! # Canonical Serialization: JCS Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for bytes
//! used in record identity and signature computation.
//!
//! ## Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only ways to
//! construct it are `CanonicalBytes::new()` and `CanonicalBytes::from_value()`,
//! both of which emit RFC 8785 (JSON Canonicalization Scheme) text:
//!
//! 1. **Sorted keys**: every object, at every depth, has its keys ordered by
//!    UTF-16 code units.
//! 2. **Compact separators**: no whitespace between tokens.
//! 3. **Shortest numbers**: `1.0` is emitted as `1`, `1e21` as `1e+21`.
//!
//! A record whose maps were populated in a different order therefore yields
//! the same bytes, the same identity hash, and the same signed message.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization.
///
/// # Invariants
///
/// - Keys are sorted at every depth.
/// - Separators are compact.
/// - The content is valid UTF-8 JSON text.
///
/// These invariants are enforced by the constructors and cannot be violated
/// by downstream code because the inner `Vec<u8>` is private.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::SerializationFailed` if the value cannot
    /// be represented as JSON (for example a map with non-string keys).
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Construct canonical bytes from an already-built JSON value.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for hashing or signing.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// View the canonical bytes as JSON text.
    ///
    /// Canonical output is always produced from a `String`.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// Consume the bytes and return the JSON text.
    pub fn into_string(self) -> String {
        String::from_utf8(self.0).unwrap_or_default()
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for CanonicalBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
