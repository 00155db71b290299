//! # Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through the core. These
//! prevent accidental identifier confusion: a `ProviderId` cannot be passed
//! where a `ContentHash` store key is expected.
//!
//! Both serialize as bare strings so they can be used as JSON object keys.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Key of a payload in a content-addressed store.
///
/// Produced by a content hasher over the payload bytes. The value is used
/// verbatim as a file name, so only `[0-9A-Za-z_-]` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a validated content hash.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::InvalidIdentifier {
                kind: "content hash",
                reason: "must not be empty".into(),
            });
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(ValidationError::InvalidIdentifier {
                kind: "content hash",
                reason: format!("character {c:?} is not allowed in a store key"),
            });
        }
        Ok(Self(value))
    }

    /// Render a raw digest as a lowercase hex store key.
    ///
    /// Infallible: hex digits are always within the accepted alphabet.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Return the hash as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContentHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Stable identifier of a facts or signature provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Create a provider identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Return the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::borrow::Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_accepts_hex() {
        let h = ContentHash::new("93ae7d494fad0fb30cbf3ae746a39c4b").unwrap();
        assert_eq!(h.as_str(), "93ae7d494fad0fb30cbf3ae746a39c4b");
    }

    #[test]
    fn content_hash_rejects_path_characters() {
        assert!(ContentHash::new("").is_err());
        assert!(ContentHash::new("../etc").is_err());
        assert!(ContentHash::new("a/b").is_err());
        assert!(ContentHash::new("a.png").is_err());
    }

    #[test]
    fn content_hash_deserialize_validates() {
        let ok: Result<ContentHash, _> = serde_json::from_str("\"abc_1-2\"");
        assert!(ok.is_ok());
        let bad: Result<ContentHash, _> = serde_json::from_str("\"a/b\"");
        assert!(bad.is_err());
    }

    #[test]
    fn provider_id_serializes_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ProviderId::new("device"), 1);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"device":1}"#);
    }
}
