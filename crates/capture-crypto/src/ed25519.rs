//! # Ed25519 Signing and Verification
//!
//! Ed25519 implementation of [`SignatureProvider`] and
//! [`SignatureVerifier`]. The message signed is the UTF-8 text of the
//! canonical signing target; signature and public key travel as lowercase
//! hex strings inside a [`Signature`].
//!
//! ## Security Invariant
//!
//! - Private keys are never serialized or logged. `Ed25519KeyPair` does
//!   not implement `Serialize` or expose the private key bytes.
//! - A malformed signature or key string verifies as `false`, never panics.

use async_trait::async_trait;
use capture_core::{CanonicalBytes, ProviderId};
use ed25519_dalek::{Signer, Verifier};

use crate::error::CryptoError;
use crate::signature::{Signature, SignatureProvider, SignatureVerifier};

/// Conventional provider id for the bundled Ed25519 signer.
pub const ED25519_PROVIDER_ID: &str = "ed25519";

/// An Ed25519 key pair for signing operations.
pub struct Ed25519KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Ed25519KeyPair {
    /// Generate a new random Ed25519 key pair.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a key pair from a raw 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(seed),
        }
    }

    /// Public key as 64 lowercase hex characters.
    pub fn public_key_hex(&self) -> String {
        to_hex(&self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message, returning 128 lowercase hex characters.
    pub fn sign_message(&self, message: &str) -> String {
        to_hex(&self.signing_key.sign(message.as_bytes()).to_bytes())
    }

    /// Sign canonical bytes.
    pub fn sign(&self, data: &CanonicalBytes) -> String {
        to_hex(&self.signing_key.sign(data.as_bytes()).to_bytes())
    }
}

impl std::fmt::Debug for Ed25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ed25519KeyPair(<private>)")
    }
}

/// Signature provider backed by a local Ed25519 key.
#[derive(Debug)]
pub struct Ed25519SignatureProvider {
    id: ProviderId,
    key: Ed25519KeyPair,
}

impl Ed25519SignatureProvider {
    pub fn new(id: impl Into<ProviderId>, key: Ed25519KeyPair) -> Self {
        Self { id: id.into(), key }
    }

    pub fn public_key_hex(&self) -> String {
        self.key.public_key_hex()
    }
}

#[async_trait]
impl SignatureProvider for Ed25519SignatureProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn provide(&self, message: &str) -> Result<Signature, CryptoError> {
        Ok(Signature::new(
            self.key.sign_message(message),
            self.key.public_key_hex(),
        ))
    }
}

/// Verifier for signatures produced by [`Ed25519SignatureProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    /// Synchronous verification, reporting why a check failed.
    pub fn check(message: &str, signature: &str, public_key: &str) -> Result<(), CryptoError> {
        let key_bytes: [u8; 32] = from_hex_array(public_key)
            .map_err(|e| CryptoError::KeyError(format!("public key: {e}")))?;
        let sig_bytes: [u8; 64] =
            from_hex_array(signature).map_err(CryptoError::MalformedSignature)?;
        let vk = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| CryptoError::KeyError(format!("invalid public key: {e}")))?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        vk.verify(message.as_bytes(), &sig)
            .map_err(|e| CryptoError::MalformedSignature(format!("Ed25519 verification failed: {e}")))
    }
}

#[async_trait]
impl SignatureVerifier for Ed25519Verifier {
    async fn verify(&self, message: &str, signature: &str, public_key: &str) -> bool {
        match Self::check(message, signature, public_key) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "ed25519 signature rejected");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex_array<const N: usize>(hex: &str) -> Result<[u8; N], String> {
    let hex = hex.trim();
    if hex.len() != N * 2 {
        return Err(format!("expected {} hex chars, got {}", N * 2, hex.len()));
    }
    if !hex.is_ascii() {
        return Err("non-ASCII character in hex string".to_string());
    }
    let mut out = [0u8; N];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| format!("invalid hex at position {}: {e}", i * 2))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_and_verify() {
        let provider = Ed25519SignatureProvider::new("ed25519", Ed25519KeyPair::generate());
        let sig = provider.provide(r#"{"payloads":{}}"#).await.unwrap();
        assert_eq!(sig.signature.len(), 128);
        assert_eq!(sig.public_key.len(), 64);
        assert!(
            Ed25519Verifier
                .verify(r#"{"payloads":{}}"#, &sig.signature, &sig.public_key)
                .await
        );
    }

    #[tokio::test]
    async fn test_verify_wrong_message_fails() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign_message("original");
        assert!(!Ed25519Verifier.verify("tampered", &sig, &kp.public_key_hex()).await);
    }

    #[tokio::test]
    async fn test_verify_wrong_key_fails() {
        let kp1 = Ed25519KeyPair::generate();
        let kp2 = Ed25519KeyPair::generate();
        let sig = kp1.sign_message("m");
        assert!(!Ed25519Verifier.verify("m", &sig, &kp2.public_key_hex()).await);
    }

    #[tokio::test]
    async fn test_malformed_inputs_verify_false() {
        let kp = Ed25519KeyPair::generate();
        let sig = kp.sign_message("m");
        assert!(!Ed25519Verifier.verify("m", "not-hex", &kp.public_key_hex()).await);
        assert!(!Ed25519Verifier.verify("m", &sig, "aabb").await);
        assert!(!Ed25519Verifier.verify("m", &sig, &"zz".repeat(32)).await);
        assert!(!Ed25519Verifier.verify("m", "", "").await);
    }

    #[test]
    fn test_deterministic_from_seed() {
        let kp1 = Ed25519KeyPair::from_seed(&[42u8; 32]);
        let kp2 = Ed25519KeyPair::from_seed(&[42u8; 32]);
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.sign_message("x"), kp2.sign_message("x"));
    }

    #[test]
    fn test_sign_canonical_matches_sign_message() {
        let kp = Ed25519KeyPair::from_seed(&[7u8; 32]);
        let cb = CanonicalBytes::new(&serde_json::json!({"b": 1, "a": 2})).unwrap();
        assert_eq!(kp.sign(&cb), kp.sign_message(r#"{"a":2,"b":1}"#));
    }

    #[test]
    fn test_check_reports_reason() {
        let err = Ed25519Verifier::check("m", "00", &"00".repeat(32)).unwrap_err();
        assert!(matches!(err, CryptoError::MalformedSignature(_)));
    }

    #[test]
    fn test_debug_does_not_leak_private_key() {
        let kp = Ed25519KeyPair::generate();
        assert_eq!(format!("{kp:?}"), "Ed25519KeyPair(<private>)");
    }
}
