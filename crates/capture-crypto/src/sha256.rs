//! # Content Hashing
//!
//! The store key of a payload and the identity of a record are both produced
//! by a [`ContentHasher`]. The default is SHA-256 rendered as lowercase hex,
//! which is always a valid [`ContentHash`].

use capture_core::ContentHash;
use sha2::{Digest, Sha256};

/// Injectable hash capability.
pub trait ContentHasher: Send + Sync {
    /// Hash `bytes` into a store key.
    fn hash(&self, bytes: &[u8]) -> ContentHash;

    /// Algorithm name, for diagnostics.
    fn algorithm(&self) -> &'static str;
}

/// SHA-256, lowercase hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn hash(&self, bytes: &[u8]) -> ContentHash {
        ContentHash::from_digest(&Sha256::digest(bytes))
    }

    fn algorithm(&self) -> &'static str {
        "sha256"
    }
}

/// Compute a SHA-256 hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sha256_vector() {
        // SHA256("{}")
        assert_eq!(
            sha256_hex(b"{}"),
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
    }

    #[test]
    fn test_hasher_is_deterministic() {
        let h = Sha256Hasher;
        assert_eq!(h.hash(b"hello"), h.hash(b"hello"));
        assert_ne!(h.hash(b"hello"), h.hash(b"hello!"));
        assert_eq!(h.hash(b"hello").as_str().len(), 64);
        assert_eq!(h.algorithm(), "sha256");
    }

    #[test]
    fn test_hasher_matches_free_function() {
        assert_eq!(Sha256Hasher.hash(b"abc").as_str(), sha256_hex(b"abc"));
    }

    #[test]
    fn test_hello_vector() {
        assert_eq!(
            Sha256Hasher.hash(b"hello").as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
