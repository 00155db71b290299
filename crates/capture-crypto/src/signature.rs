//! # Signatures and Signature Capabilities
//!
//! A [`Signature`] is the opaque pair a signature provider returns: the
//! signature string and the public key string. The core never interprets
//! either value; only a [`SignatureVerifier`] registered for the same
//! provider id does.
//!
//! Verification consults an explicit [`VerifierRegistry`] handed in by the
//! caller. There is no process-wide verifier table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use capture_core::error::json_type_name;
use capture_core::{ProviderId, ValidationError};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// A signature over the canonical signing target of a record.
///
/// Serialized as `{"signature": "...", "publicKey": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub signature: String,
    pub public_key: String,
}

impl Signature {
    pub fn new(signature: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
            public_key: public_key.into(),
        }
    }

    /// Both members must be non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signature.is_empty() {
            return Err(ValidationError::EmptyField { field: "signature" });
        }
        if self.public_key.is_empty() {
            return Err(ValidationError::EmptyField { field: "publicKey" });
        }
        Ok(())
    }

    /// Validate an untyped JSON value as a signature.
    ///
    /// Accepts exactly an object whose `signature` and `publicKey` members
    /// are strings. Extra members are ignored.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject {
            what: "signature",
            found: json_type_name(value),
        })?;
        let field = |name: &'static str| -> Result<String, ValidationError> {
            match obj.get(name) {
                Some(serde_json::Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(ValidationError::InvalidField {
                    field: name,
                    reason: format!("must be a string, found {}", json_type_name(other)),
                }),
                None => Err(ValidationError::EmptyField { field: name }),
            }
        };
        Ok(Self {
            signature: field("signature")?,
            public_key: field("publicKey")?,
        })
    }
}

/// Produces a signature over a canonical message.
#[async_trait]
pub trait SignatureProvider: Send + Sync {
    /// Stable identifier; keys the signature in the record.
    fn id(&self) -> &ProviderId;

    /// Sign `message`, the canonical signing target text.
    async fn provide(&self, message: &str) -> Result<Signature, CryptoError>;
}

/// Checks one signature produced by the matching provider.
#[async_trait]
pub trait SignatureVerifier: Send + Sync {
    /// Return `true` iff `signature` by `public_key` is valid over `message`.
    ///
    /// Malformed inputs verify as `false`; they are not errors.
    async fn verify(&self, message: &str, signature: &str, public_key: &str) -> bool;
}

/// Verifiers keyed by the id of the provider whose signatures they check.
#[derive(Clone, Default)]
pub struct VerifierRegistry {
    verifiers: HashMap<ProviderId, Arc<dyn SignatureVerifier>>,
}

impl VerifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `verifier` for `provider`, returning any verifier it replaces.
    pub fn register(
        &mut self,
        provider: impl Into<ProviderId>,
        verifier: Arc<dyn SignatureVerifier>,
    ) -> Option<Arc<dyn SignatureVerifier>> {
        self.verifiers.insert(provider.into(), verifier)
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: impl Into<ProviderId>, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.register(provider, verifier);
        self
    }

    pub fn unregister(&mut self, provider: &str) -> Option<Arc<dyn SignatureVerifier>> {
        self.verifiers.remove(provider)
    }

    pub fn get(&self, provider: &str) -> Option<&Arc<dyn SignatureVerifier>> {
        self.verifiers.get(provider)
    }

    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }
}

impl std::fmt::Debug for VerifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.verifiers.keys().map(ProviderId::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("VerifierRegistry").field("providers", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AcceptAll;

    #[async_trait]
    impl SignatureVerifier for AcceptAll {
        async fn verify(&self, _: &str, _: &str, _: &str) -> bool {
            true
        }
    }

    #[test]
    fn signature_serializes_camel_case() {
        let sig = Signature::new("abc", "def");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, r#"{"signature":"abc","publicKey":"def"}"#);
        let back: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn validate_requires_both_members() {
        assert!(Signature::new("s", "k").validate().is_ok());
        assert_eq!(
            Signature::new("", "k").validate(),
            Err(ValidationError::EmptyField { field: "signature" })
        );
        assert!(Signature::new("s", "").validate().is_err());
    }

    #[test]
    fn from_value_accepts_well_formed() {
        let v = serde_json::json!({"signature": "s", "publicKey": "k", "extra": 1});
        assert_eq!(Signature::from_value(&v).unwrap(), Signature::new("s", "k"));
    }

    #[test]
    fn from_value_rejects_malformed() {
        assert!(Signature::from_value(&serde_json::json!("nope")).is_err());
        assert!(Signature::from_value(&serde_json::json!({"signature": "s"})).is_err());
        assert!(Signature::from_value(&serde_json::json!({"signature": 1, "publicKey": "k"})).is_err());
        assert!(Signature::from_value(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn registry_register_and_replace() {
        let mut reg = VerifierRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.register("a", Arc::new(AcceptAll)).is_none());
        assert!(reg.register("a", Arc::new(AcceptAll)).is_some());
        assert_eq!(reg.len(), 1);
        assert!(reg.get("a").is_some());
        assert!(reg.get("b").is_none());
        assert!(reg.unregister("a").is_some());
        assert!(reg.is_empty());
    }

    #[test]
    fn registry_debug_lists_sorted_ids() {
        let reg = VerifierRegistry::new()
            .with("zeta", Arc::new(AcceptAll))
            .with("alpha", Arc::new(AcceptAll));
        assert_eq!(
            format!("{reg:?}"),
            r#"VerifierRegistry { providers: ["alpha", "zeta"] }"#
        );
    }
}
