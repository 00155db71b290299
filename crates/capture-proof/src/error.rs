//! Errors raised while building, reading, and persisting records.

use capture_core::{CanonicalizationError, ValidationError};
use capture_store::{StoreError, TableError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofError {
    /// Payload storage failed.
    #[error("payload store: {0}")]
    Store(#[from] StoreError),

    /// Canonical serialization failed.
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),

    /// A record component had the wrong shape.
    #[error("invalid record: {0}")]
    Validation(#[from] ValidationError),

    /// The record text was not the expected JSON structure.
    #[error("malformed record JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An operation that needs at least one payload found none.
    #[error("record has no payloads")]
    NoPayloads,
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("record table: {0}")]
    Table(#[from] TableError),

    #[error(transparent)]
    Proof(#[from] ProofError),
}
