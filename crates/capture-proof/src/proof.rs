//! # Provenance Record
//!
//! ## Canonical forms
//!
//! Two strings are derived from a record, both through
//! [`CanonicalBytes`] (keys sorted at every depth, compact, ECMAScript
//! number formatting):
//!
//! - the **signing target**, `{"payloads": …, "truth": …}`, which every
//!   signature provider signs ([`signed_targets_string`]);
//! - the **record text**, `{"payloads": …, "signatures": …, "truth": …}`,
//!   whose hash is the record id ([`Proof::stringify`], [`Proof::get_id`]).
//!
//! In both, `payloads` maps the base64 encoding of each payload to its
//! metadata, so the text depends on payload content rather than on the
//! store that happens to hold it.
//!
//! ## Ownership
//!
//! A record owns every payload it references. [`Proof::destroy`] deletes
//! them from the store, thumbnails included. Two records referencing the
//! same payload bytes are not supported: destroying one strands the other.

use std::collections::BTreeMap;
use std::sync::Arc;

use base64::prelude::{Engine as _, BASE64_STANDARD};
use capture_core::{CanonicalBytes, CanonicalizationError, ContentHash, MimeType, ProviderId, Timestamp};
use capture_crypto::{Signature, VerifierRegistry};
use capture_store::{FileStore, ImageStore, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProofError;
use crate::truth::{DefaultFactId, FactValue, Truth};

/// Metadata attached to each payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    pub mime_type: MimeType,
}

impl PayloadMeta {
    pub fn new(mime_type: impl Into<MimeType>) -> Self {
        Self {
            mime_type: mime_type.into(),
        }
    }
}

/// Payloads keyed by their base64 encoding.
pub type Payloads = BTreeMap<String, PayloadMeta>;

/// Payloads keyed by their store key.
pub type IndexedPayloads = BTreeMap<ContentHash, PayloadMeta>;

/// Signatures keyed by the id of the provider that produced them.
pub type Signatures = BTreeMap<ProviderId, Signature>;

/// A record as persisted: payload keys instead of payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedProofView {
    pub indexed_payloads: IndexedPayloads,
    pub truth: Truth,
    pub signatures: Signatures,
}

#[derive(Serialize)]
struct SignedTargets<'a> {
    payloads: &'a Payloads,
    truth: &'a Truth,
}

#[derive(Serialize)]
struct SerializedProofRef<'a> {
    payloads: &'a Payloads,
    truth: &'a Truth,
    signatures: &'a Signatures,
}

#[derive(Deserialize)]
struct SerializedProof {
    payloads: Payloads,
    truth: Value,
    signatures: BTreeMap<String, Value>,
}

/// Canonical text of `{payloads, truth}`: the message every signature
/// provider signs.
pub fn signed_targets_string(payloads: &Payloads, truth: &Truth) -> Result<String, CanonicalizationError> {
    Ok(CanonicalBytes::new(&SignedTargets { payloads, truth })?.into_string())
}

/// Validate untyped JSON as a signature with non-empty members.
pub fn validate_signature(value: &Value) -> Result<Signature, capture_core::ValidationError> {
    let signature = Signature::from_value(value)?;
    signature.validate()?;
    Ok(signature)
}

/// A self-verifying provenance record.
pub struct Proof {
    store: Arc<ImageStore>,
    indexed_payloads: IndexedPayloads,
    truth: Truth,
    signatures: Signatures,
    created: Vec<ContentHash>,
}

impl Proof {
    /// Store every payload and build a record over their keys.
    ///
    /// If any write fails, payloads this call newly stored are deleted
    /// again before the error is returned.
    pub async fn from(
        store: Arc<ImageStore>,
        payloads: Payloads,
        truth: Truth,
        signatures: Signatures,
    ) -> Result<Self, ProofError> {
        let mut indexed_payloads = IndexedPayloads::new();
        let mut created = Vec::new();
        for (base64, meta) in payloads {
            match Self::store_payload(&store, &base64, &meta).await {
                Ok((key, was_new)) => {
                    if was_new {
                        created.push(key.clone());
                    }
                    indexed_payloads.insert(key, meta);
                }
                Err(e) => {
                    rollback(&store, &created).await;
                    return Err(e);
                }
            }
        }
        Ok(Self {
            store,
            indexed_payloads,
            truth,
            signatures,
            created,
        })
    }

    async fn store_payload(
        store: &ImageStore,
        base64: &str,
        meta: &PayloadMeta,
    ) -> Result<(ContentHash, bool), ProofError> {
        let bytes = BASE64_STANDARD
            .decode(base64)
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
        let existed = store.exists(&store.hasher().hash(&bytes)).await?;
        let key = store.write(base64, &meta.mime_type).await?;
        Ok((key, !existed))
    }

    /// Parse record text, validate every component, and store the payloads.
    pub async fn parse(store: Arc<ImageStore>, json: &str) -> Result<Self, ProofError> {
        let parsed: SerializedProof = serde_json::from_str(json)?;
        let truth = Truth::from_value(&parsed.truth)?;
        let signatures = parsed
            .signatures
            .iter()
            .map(|(id, value)| Ok((ProviderId::new(id.as_str()), validate_signature(value)?)))
            .collect::<Result<Signatures, ProofError>>()?;
        Self::from(store, parsed.payloads, truth, signatures).await
    }

    /// Rebuild a record whose payloads are already stored. Writes nothing.
    pub fn from_indexed_view(store: Arc<ImageStore>, view: IndexedProofView) -> Self {
        Self {
            store,
            indexed_payloads: view.indexed_payloads,
            truth: view.truth,
            signatures: view.signatures,
            created: Vec::new(),
        }
    }

    pub fn indexed_payloads(&self) -> &IndexedPayloads {
        &self.indexed_payloads
    }

    pub fn truth(&self) -> &Truth {
        &self.truth
    }

    pub fn signatures(&self) -> &Signatures {
        &self.signatures
    }

    pub fn timestamp(&self) -> Timestamp {
        self.truth.timestamp
    }

    pub fn store(&self) -> &Arc<ImageStore> {
        &self.store
    }

    /// Keys whose content was not in the store before this record wrote
    /// them. Empty for records rebuilt from an indexed view.
    pub fn created_keys(&self) -> &[ContentHash] {
        &self.created
    }

    /// Read every payload back, keyed by base64.
    pub async fn get_payloads(&self) -> Result<Payloads, ProofError> {
        let mut payloads = Payloads::new();
        for (key, meta) in &self.indexed_payloads {
            payloads.insert(self.store.read(key).await?, meta.clone());
        }
        Ok(payloads)
    }

    /// Canonical record text.
    pub async fn stringify(&self) -> Result<String, ProofError> {
        let payloads = self.get_payloads().await?;
        let text = CanonicalBytes::new(&SerializedProofRef {
            payloads: &payloads,
            truth: &self.truth,
            signatures: &self.signatures,
        })?;
        Ok(text.into_string())
    }

    /// Hash of the canonical record text.
    pub async fn get_id(&self) -> Result<ContentHash, ProofError> {
        let text = self.stringify().await?;
        Ok(self.store.hasher().hash(text.as_bytes()))
    }

    /// Canonical signing target of this record.
    pub async fn signed_targets(&self) -> Result<String, ProofError> {
        let payloads = self.get_payloads().await?;
        Ok(signed_targets_string(&payloads, &self.truth)?)
    }

    /// Whether every signature verifies over the signing target.
    ///
    /// A record without signatures verifies. A signature from a provider
    /// with no verifier in `registry` fails verification.
    pub async fn is_verified(&self, registry: &VerifierRegistry) -> Result<bool, ProofError> {
        if self.signatures.is_empty() {
            return Ok(true);
        }
        let message = self.signed_targets().await?;
        for (provider, signature) in &self.signatures {
            let Some(verifier) = registry.get(provider.as_str()) else {
                tracing::warn!(provider = %provider, "no verifier registered for signature provider");
                return Ok(false);
            };
            if !verifier
                .verify(&message, &signature.signature, &signature.public_key)
                .await
            {
                tracing::debug!(provider = %provider, "signature did not verify");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// First value reported for `fact_id`, scanning providers in id order.
    ///
    /// When providers disagree the disagreement is logged and the first
    /// value is still returned; use [`get_fact_values`](Self::get_fact_values)
    /// to see every report.
    pub fn get_fact_value(&self, fact_id: &str) -> Option<&FactValue> {
        let values = self.get_fact_values(fact_id);
        let (_, first) = values.first()?;
        if values.iter().any(|(_, v)| v != first) {
            tracing::warn!(
                fact = fact_id,
                providers = ?values.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
                "providers disagree on fact value"
            );
        }
        Some(*first)
    }

    /// Every provider's report for `fact_id`, in provider id order.
    pub fn get_fact_values(&self, fact_id: &str) -> Vec<(&ProviderId, &FactValue)> {
        self.truth
            .providers
            .iter()
            .filter_map(|(provider, facts)| facts.get(fact_id).map(|v| (provider, v)))
            .collect()
    }

    pub fn device_name(&self) -> Option<&FactValue> {
        self.get_fact_value(DefaultFactId::DeviceName.as_str())
    }

    pub fn geolocation_latitude(&self) -> Option<&FactValue> {
        self.get_fact_value(DefaultFactId::GeolocationLatitude.as_str())
    }

    pub fn geolocation_longitude(&self) -> Option<&FactValue> {
        self.get_fact_value(DefaultFactId::GeolocationLongitude.as_str())
    }

    /// Thumbnail `data:` URI of the first image payload, if there is one.
    pub async fn get_thumbnail_url(&self) -> Result<Option<String>, ProofError> {
        let Some((key, _)) = self
            .indexed_payloads
            .iter()
            .find(|(_, meta)| meta.mime_type.is_image())
        else {
            return Ok(None);
        };
        Ok(Some(self.store.get_or_create_thumbnail(key).await?))
    }

    pub fn get_indexed_view(&self) -> IndexedProofView {
        IndexedProofView {
            indexed_payloads: self.indexed_payloads.clone(),
            truth: self.truth.clone(),
            signatures: self.signatures.clone(),
        }
    }

    /// Undo the writes of [`from`](Self::from): delete only the payloads it
    /// newly created, leaving content other records already referenced.
    pub async fn discard(&self) {
        rollback(&self.store, &self.created).await;
    }

    /// Delete every payload this record owns. Payloads already gone are
    /// skipped, so a second call succeeds.
    pub async fn destroy(&self) -> Result<(), ProofError> {
        for key in self.indexed_payloads.keys() {
            match self.store.delete(key).await {
                Ok(_) => {}
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(key = %key, "payload already removed");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

async fn rollback(store: &ImageStore, created: &[ContentHash]) {
    for key in created {
        if let Err(e) = store.delete(key).await {
            tracing::error!(key = %key, error = %e, "failed to roll back stored payload");
        } else {
            tracing::warn!(key = %key, "rolled back stored payload");
        }
    }
}

impl std::fmt::Debug for Proof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proof")
            .field("indexed_payloads", &self.indexed_payloads)
            .field("truth", &self.truth)
            .field("signatures", &self.signatures.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::truth::Facts;
    use capture_store::{StoreContext, Thumbnail, ThumbnailError, Thumbnailer};

    struct EchoThumbnailer;

    impl Thumbnailer for EchoThumbnailer {
        fn thumbnail(&self, bytes: &[u8], mime: &MimeType, _: u32) -> Result<Thumbnail, ThumbnailError> {
            Ok(Thumbnail {
                bytes: bytes.to_vec(),
                mime_type: mime.clone(),
            })
        }
    }

    fn image_store() -> Arc<ImageStore> {
        Arc::new(ImageStore::new(&StoreContext::in_memory(), Arc::new(EchoThumbnailer), 100).unwrap())
    }

    fn facts(pairs: &[(&str, FactValue)]) -> Facts {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn from_keeps_only_indexed_payloads() {
        let store = image_store();
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        let proof = Proof::from(store.clone(), payloads.clone(), Truth::new(Timestamp::from_millis(1)), Signatures::new())
            .await
            .unwrap();

        let key = ContentHash::new("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824").unwrap();
        assert_eq!(proof.indexed_payloads().keys().collect::<Vec<_>>(), vec![&key]);
        assert!(store.exists(&key).await.unwrap());
        assert_eq!(proof.get_payloads().await.unwrap(), payloads);
    }

    #[tokio::test]
    async fn invalid_payload_rolls_back_earlier_writes() {
        let store = image_store();
        let mut payloads = Payloads::new();
        // Sorted order: the valid payload is stored before the invalid one.
        payloads.insert("AAAA".into(), PayloadMeta::new("image/png"));
        payloads.insert("~~not base64~~".into(), PayloadMeta::new("image/png"));
        let err = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(1)), Signatures::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::Store(StoreError::InvalidPayload(_))));

        let key = store.hasher().hash(&[0, 0, 0]);
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn first_fact_wins_and_all_are_exposed() {
        let truth = Truth::new(Timestamp::from_millis(0))
            .with_provider("b", facts(&[("DEVICE_NAME", "Beta".into())]))
            .with_provider("a", facts(&[("DEVICE_NAME", "Alpha".into()), ("X", false.into())]));
        let proof = Proof::from(image_store(), Payloads::new(), truth, Signatures::new()).await.unwrap();

        assert_eq!(proof.device_name(), Some(&FactValue::from("Alpha")));
        assert_eq!(proof.get_fact_values("DEVICE_NAME").len(), 2);
        // Falsy values are still values.
        assert_eq!(proof.get_fact_value("X"), Some(&FactValue::Bool(false)));
        assert_eq!(proof.geolocation_latitude(), None);
    }

    #[tokio::test]
    async fn zero_signatures_verify() {
        let proof = Proof::from(image_store(), Payloads::new(), Truth::new(Timestamp::from_millis(0)), Signatures::new())
            .await
            .unwrap();
        assert!(proof.is_verified(&VerifierRegistry::new()).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_provider_fails_verification() {
        let mut signatures = Signatures::new();
        signatures.insert(ProviderId::new("nobody"), Signature::new("s", "k"));
        let proof = Proof::from(image_store(), Payloads::new(), Truth::new(Timestamp::from_millis(0)), signatures)
            .await
            .unwrap();
        assert!(!proof.is_verified(&VerifierRegistry::new()).await.unwrap());
    }

    #[tokio::test]
    async fn thumbnail_url_only_for_images() {
        let store = image_store();
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        let text_only = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(0)), Signatures::new())
            .await
            .unwrap();
        assert_eq!(text_only.get_thumbnail_url().await.unwrap(), None);

        let mut payloads = Payloads::new();
        payloads.insert("AAECAw==".into(), PayloadMeta::new("image/png"));
        let with_image = Proof::from(store, payloads, Truth::new(Timestamp::from_millis(0)), Signatures::new())
            .await
            .unwrap();
        assert_eq!(
            with_image.get_thumbnail_url().await.unwrap().as_deref(),
            Some("data:image/png;base64,AAECAw==")
        );
    }

    #[tokio::test]
    async fn destroy_is_repeatable() {
        let store = image_store();
        let mut payloads = Payloads::new();
        payloads.insert("AAECAw==".into(), PayloadMeta::new("image/png"));
        let proof = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(0)), Signatures::new())
            .await
            .unwrap();
        proof.get_thumbnail_url().await.unwrap();
        proof.destroy().await.unwrap();
        proof.destroy().await.unwrap();
        for key in proof.indexed_payloads().keys() {
            assert!(!store.exists(key).await.unwrap());
        }
        assert!(proof.stringify().await.is_err());
    }

    #[tokio::test]
    async fn parse_rejects_invalid_components() {
        let store = image_store();
        let nested_fact = r#"{"payloads":{},"truth":{"timestamp":0,"providers":{"p":{"A":{"x":1}}}},"signatures":{}}"#;
        assert!(matches!(
            Proof::parse(store.clone(), nested_fact).await,
            Err(ProofError::Validation(_))
        ));
        let empty_sig = r#"{"payloads":{},"truth":{"timestamp":0,"providers":{}},"signatures":{"p":{"signature":"","publicKey":"k"}}}"#;
        assert!(matches!(
            Proof::parse(store.clone(), empty_sig).await,
            Err(ProofError::Validation(_))
        ));
        assert!(matches!(
            Proof::parse(store, "{").await,
            Err(ProofError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn indexed_view_roundtrip_writes_nothing() {
        let store = image_store();
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        let proof = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(9)), Signatures::new())
            .await
            .unwrap();
        let view = proof.get_indexed_view();
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("indexedPayloads").is_some());

        let rebuilt = Proof::from_indexed_view(store, view);
        assert_eq!(rebuilt.get_id().await.unwrap(), proof.get_id().await.unwrap());
    }

    #[test]
    fn signing_target_excludes_signatures() {
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        let text = signed_targets_string(&payloads, &Truth::new(Timestamp::from_millis(1))).unwrap();
        assert_eq!(
            text,
            r#"{"payloads":{"aGVsbG8=":{"mimeType":"text/plain"}},"truth":{"providers":{},"timestamp":1}}"#
        );
    }

    #[tokio::test]
    async fn discard_spares_content_stored_earlier() {
        let store = image_store();
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        payloads.insert("d29ybGQ=".into(), PayloadMeta::new("text/plain"));
        let first = Proof::from(store.clone(), payloads.clone(), Truth::new(Timestamp::from_millis(1)), Signatures::new())
            .await
            .unwrap();
        assert_eq!(first.created_keys().len(), 2);

        payloads.insert("Zm9v".into(), PayloadMeta::new("text/plain"));
        let second = Proof::from(store.clone(), payloads, Truth::new(Timestamp::from_millis(2)), Signatures::new())
            .await
            .unwrap();
        let foo = store.hasher().hash(b"foo");
        assert_eq!(second.created_keys(), &[foo.clone()]);

        second.discard().await;
        assert!(!store.exists(&foo).await.unwrap());
        assert!(store.exists(&store.hasher().hash(b"hello")).await.unwrap());
        assert!(first.stringify().await.is_ok());
    }
}
