//! # capture-paging: Paged Remote Data with a Local Cache
//!
//! [`PagingSource`] pages through a remote collection through a
//! [`PageFetcher`], writes every fetched item into a per-source cache
//! table, and serves the cached window whenever the remote fails. Fetch
//! failures never surface to callers; only cache I/O errors do.
//!
//! [`PagingSourceManager`] hands out one shared source per id.

pub mod error;
pub mod fetcher;
pub mod manager;
pub mod source;

pub use error::{FetchError, PagingError};
pub use fetcher::{PageFetcher, PagingFetchOptions};
pub use manager::{PagingSourceManager, SharedPagingSource};
pub use source::{
    cache_table_name, CachedData, PageItem, PageOrigin, PageOutcome, PagingSource, PagingState,
};
