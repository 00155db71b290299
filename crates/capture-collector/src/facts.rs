use async_trait::async_trait;
use capture_core::ProviderId;
use capture_proof::{Facts, Payloads};

use crate::error::ProviderError;

/// Observes facts about a capture.
///
/// A fact the provider cannot determine is left out of the returned map.
#[async_trait]
pub trait FactsProvider: Send + Sync {
    /// Stable identifier; keys the facts in the record's truth.
    fn id(&self) -> &ProviderId;

    async fn provide(&self, payloads: &Payloads) -> Result<Facts, ProviderError>;
}
