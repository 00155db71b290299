//! Errors raised while assembling records.

use std::time::Duration;

use capture_core::{CanonicalizationError, ProviderId};
use capture_proof::{ProofError, RepositoryError};
use capture_store::TableError;
use thiserror::Error;

/// Failure reported by a facts provider or one of its capabilities.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ProviderError(pub String);

impl ProviderError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl From<PreferenceError> for ProviderError {
    fn from(e: PreferenceError) -> Self {
        Self(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("preference table: {0}")]
    Table(#[from] TableError),
}

#[derive(Error, Debug)]
pub enum CollectorError {
    /// A facts or signature provider returned an error.
    #[error("provider {id} failed: {reason}")]
    Provider { id: ProviderId, reason: String },

    /// A provider did not answer within the configured timeout.
    #[error("provider {id} timed out after {timeout:?}")]
    ProviderTimeout { id: ProviderId, timeout: Duration },

    /// A provider task panicked or was cancelled.
    #[error("provider task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    #[error(transparent)]
    Proof(#[from] ProofError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
