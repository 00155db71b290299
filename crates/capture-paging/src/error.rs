use capture_store::TableError;
use thiserror::Error;

/// A remote page request failed. Recovered locally by cache fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("page fetch failed: {0}")]
pub struct FetchError(pub String);

impl FetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

#[derive(Error, Debug)]
pub enum PagingError {
    /// The local page cache could not be read or written.
    #[error("page cache: {0}")]
    Cache(#[from] TableError),

    /// A source with this id already exists for a different item type.
    #[error("paging source {id} already exists with a different item type")]
    TypeMismatch { id: String },
}
