//! # Record Assembly
//!
//! [`Collector::run_and_store`] turns captured payloads into a stored
//! record in five steps:
//!
//! 1. every registered facts provider runs concurrently; their facts form
//!    the [`Truth`], stamped when assembly started;
//! 2. the signing target is computed from `{payloads, truth}`;
//! 3. every registered signature provider signs it concurrently;
//! 4. [`Proof::from`] writes the payloads to the store;
//! 5. the record is added to the [`ProofRepository`].
//!
//! Nothing is written before step 4. A provider error or timeout aborts
//! the other in-flight provider calls and fails the assembly. If step 5
//! fails, the payloads step 4 newly stored are deleted again; content that
//! was already in the store stays.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use capture_core::{CaptureConfig, ProviderId, Timestamp};
use capture_crypto::SignatureProvider;
use capture_proof::{signed_targets_string, Payloads, Proof, ProofRepository, Signatures, Truth};
use capture_store::ImageStore;
use parking_lot::RwLock;
use tokio::task::JoinSet;

use crate::error::CollectorError;
use crate::facts::FactsProvider;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound on each provider call.
    pub provider_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: capture_core::config::DEFAULT_PROVIDER_TIMEOUT,
        }
    }
}

impl From<&CaptureConfig> for CollectorConfig {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            provider_timeout: config.provider_timeout,
        }
    }
}

pub struct Collector {
    store: Arc<ImageStore>,
    repository: Arc<dyn ProofRepository>,
    config: CollectorConfig,
    facts_providers: RwLock<BTreeMap<ProviderId, Arc<dyn FactsProvider>>>,
    signature_providers: RwLock<BTreeMap<ProviderId, Arc<dyn SignatureProvider>>>,
}

impl Collector {
    pub fn new(store: Arc<ImageStore>, repository: Arc<dyn ProofRepository>, config: CollectorConfig) -> Self {
        Self {
            store,
            repository,
            config,
            facts_providers: RwLock::new(BTreeMap::new()),
            signature_providers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a facts provider. Returns `false` and keeps the existing
    /// one if a provider with the same id is already registered.
    pub fn add_facts_provider(&self, provider: Arc<dyn FactsProvider>) -> bool {
        let mut providers = self.facts_providers.write();
        if providers.contains_key(provider.id()) {
            return false;
        }
        providers.insert(provider.id().clone(), provider);
        true
    }

    pub fn remove_facts_provider(&self, id: &str) -> Option<Arc<dyn FactsProvider>> {
        self.facts_providers.write().remove(id)
    }

    /// Register a signature provider. Same duplicate rule as
    /// [`add_facts_provider`](Self::add_facts_provider).
    pub fn add_signature_provider(&self, provider: Arc<dyn SignatureProvider>) -> bool {
        let mut providers = self.signature_providers.write();
        if providers.contains_key(provider.id()) {
            return false;
        }
        providers.insert(provider.id().clone(), provider);
        true
    }

    pub fn remove_signature_provider(&self, id: &str) -> Option<Arc<dyn SignatureProvider>> {
        self.signature_providers.write().remove(id)
    }

    pub fn facts_provider_ids(&self) -> Vec<ProviderId> {
        self.facts_providers.read().keys().cloned().collect()
    }

    pub fn signature_provider_ids(&self) -> Vec<ProviderId> {
        self.signature_providers.read().keys().cloned().collect()
    }

    /// Assemble, store, and persist a record for `payloads`.
    pub async fn run_and_store(&self, payloads: Payloads) -> Result<Proof, CollectorError> {
        let payloads = Arc::new(payloads);
        let truth = self.collect_truth(&payloads).await?;
        let message: Arc<str> = signed_targets_string(&payloads, &truth)?.into();
        let signatures = self.sign_targets(&message).await?;

        // Provider tasks have all finished, so this is normally the last
        // reference.
        let payloads = Arc::try_unwrap(payloads).unwrap_or_else(|shared| (*shared).clone());
        let proof = Proof::from(self.store.clone(), payloads, truth, signatures).await?;

        match self.repository.add(&proof).await {
            Ok(id) => {
                tracing::info!(id = %id, "record assembled");
                Ok(proof)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to persist record, discarding new payloads");
                proof.discard().await;
                Err(e.into())
            }
        }
    }

    async fn collect_truth(&self, payloads: &Arc<Payloads>) -> Result<Truth, CollectorError> {
        let timestamp = Timestamp::now();
        let providers: Vec<_> = self.facts_providers.read().values().cloned().collect();
        let timeout = self.config.provider_timeout;

        let mut tasks = JoinSet::new();
        for provider in providers {
            let payloads = Arc::clone(payloads);
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, provider.provide(&payloads)).await;
                (provider.id().clone(), result)
            });
        }

        let mut truth = Truth::new(timestamp);
        while let Some(joined) = tasks.join_next().await {
            let (id, result) = joined?;
            let facts = match result {
                Ok(Ok(facts)) => facts,
                Ok(Err(e)) => {
                    tracing::warn!(provider = %id, error = %e, "facts provider failed");
                    return Err(CollectorError::Provider {
                        id,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::warn!(provider = %id, ?timeout, "facts provider timed out");
                    return Err(CollectorError::ProviderTimeout { id, timeout });
                }
            };
            tracing::debug!(provider = %id, facts = facts.len(), "facts collected");
            truth.providers.insert(id, facts);
        }
        Ok(truth)
    }

    async fn sign_targets(&self, message: &Arc<str>) -> Result<Signatures, CollectorError> {
        let providers: Vec<_> = self.signature_providers.read().values().cloned().collect();
        let timeout = self.config.provider_timeout;

        let mut tasks = JoinSet::new();
        for provider in providers {
            let message = Arc::clone(message);
            tasks.spawn(async move {
                let result = tokio::time::timeout(timeout, provider.provide(&message)).await;
                (provider.id().clone(), result)
            });
        }

        let mut signatures = Signatures::new();
        while let Some(joined) = tasks.join_next().await {
            let (id, result) = joined?;
            let signature = match result {
                Ok(Ok(signature)) => signature,
                Ok(Err(e)) => {
                    tracing::warn!(provider = %id, error = %e, "signature provider failed");
                    return Err(CollectorError::Provider {
                        id,
                        reason: e.to_string(),
                    });
                }
                Err(_) => {
                    tracing::warn!(provider = %id, ?timeout, "signature provider timed out");
                    return Err(CollectorError::ProviderTimeout { id, timeout });
                }
            };
            signatures.insert(id, signature);
        }
        Ok(signatures)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("config", &self.config)
            .field("facts_providers", &self.facts_provider_ids())
            .field("signature_providers", &self.signature_provider_ids())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use capture_proof::{Facts, FactValue, PayloadMeta, TableProofRepository};
    use capture_store::{FileStore, ImageThumbnailer, StoreContext};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StaticFacts(ProviderId, Facts);

    #[async_trait]
    impl FactsProvider for StaticFacts {
        fn id(&self) -> &ProviderId {
            &self.0
        }

        async fn provide(&self, _: &Payloads) -> Result<Facts, ProviderError> {
            Ok(self.1.clone())
        }
    }

    struct SlowFacts {
        id: ProviderId,
        finished: Arc<AtomicBool>,
    }

    #[async_trait]
    impl FactsProvider for SlowFacts {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        async fn provide(&self, _: &Payloads) -> Result<Facts, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            self.finished.store(true, Ordering::SeqCst);
            Ok(Facts::new())
        }
    }

    struct FailingFacts(ProviderId);

    #[async_trait]
    impl FactsProvider for FailingFacts {
        fn id(&self) -> &ProviderId {
            &self.0
        }

        async fn provide(&self, _: &Payloads) -> Result<Facts, ProviderError> {
            Err(ProviderError::new("sensor offline"))
        }
    }

    fn setup() -> (Collector, Arc<ImageStore>) {
        let ctx = StoreContext::in_memory();
        let store = Arc::new(ImageStore::new(&ctx, Arc::new(ImageThumbnailer), 100).unwrap());
        let repo = Arc::new(TableProofRepository::new(&ctx, store.clone()).unwrap());
        let collector = Collector::new(
            store.clone(),
            repo,
            CollectorConfig {
                provider_timeout: Duration::from_secs(5),
            },
        );
        (collector, store)
    }

    fn payloads() -> Payloads {
        let mut payloads = Payloads::new();
        payloads.insert("aGVsbG8=".into(), PayloadMeta::new("text/plain"));
        payloads
    }

    #[tokio::test]
    async fn duplicate_ids_are_ignored() {
        let (collector, _) = setup();
        let facts: Facts = [("A".to_string(), FactValue::from(1i64))].into();
        assert!(collector.add_facts_provider(Arc::new(StaticFacts("p".into(), facts.clone()))));
        assert!(!collector.add_facts_provider(Arc::new(StaticFacts("p".into(), Facts::new()))));

        let proof = collector.run_and_store(payloads()).await.unwrap();
        assert_eq!(proof.truth().providers["p"], facts);

        assert!(collector.remove_facts_provider("p").is_some());
        assert!(collector.remove_facts_provider("p").is_none());
        let proof = collector.run_and_store(payloads()).await.unwrap();
        assert!(proof.truth().providers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_provider_and_writes_nothing() {
        let (collector, store) = setup();
        let finished = Arc::new(AtomicBool::new(false));
        collector.add_facts_provider(Arc::new(SlowFacts {
            id: "slow".into(),
            finished: finished.clone(),
        }));

        match collector.run_and_store(payloads()).await.unwrap_err() {
            CollectorError::ProviderTimeout { id, timeout } => {
                assert_eq!(id.as_str(), "slow");
                assert_eq!(timeout, Duration::from_secs(5));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(!finished.load(Ordering::SeqCst));
        let key = store.hasher().hash(b"hello");
        assert!(!store.exists(&key).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_aborts_siblings() {
        let (collector, store) = setup();
        let finished = Arc::new(AtomicBool::new(false));
        collector.add_facts_provider(Arc::new(SlowFacts {
            id: "slow".into(),
            finished: finished.clone(),
        }));
        collector.add_facts_provider(Arc::new(FailingFacts("broken".into())));

        match collector.run_and_store(payloads()).await.unwrap_err() {
            CollectorError::Provider { id, reason } => {
                assert_eq!(id.as_str(), "broken");
                assert_eq!(reason, "sensor offline");
            }
            other => panic!("unexpected error {other:?}"),
        }
        tokio::time::sleep(Duration::from_secs(7200)).await;
        assert!(!finished.load(Ordering::SeqCst));
        assert!(!store.exists(&store.hasher().hash(b"hello")).await.unwrap());
    }
}
