//! # Paging Source
//!
//! A [`PagingSource`] keeps an in-memory list of remote items, filled a
//! page at a time, and mirrors every fetched item into a local cache table
//! keyed by its absolute offset. When the remote is unreachable the same
//! window is served from the cache instead.
//!
//! ## Cursor
//!
//! The cursor is the offset of the next remote page. It advances only by
//! the length of a page that actually came from the remote; a cache
//! fallback leaves it where it was, so the next call asks the remote for
//! the same window again. Items are spliced into the list at
//! `[cursor, cursor + len)` rather than appended, which keeps the list
//! consistent when remote items replace cached ones.
//!
//! ## States
//!
//! `Idle → Fetching → Settled → Idle` on success and
//! `Idle → Fetching → FetchFailed → CacheFallback → Idle` on failure.
//! Transitions are published on a [`watch`] channel.

use std::sync::Arc;

use capture_store::{Database, OnConflictStrategy, Table, Tuple};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::PagingError;
use crate::fetcher::{PageFetcher, PagingFetchOptions};

/// Bounds on items a [`PagingSource`] can hold and cache.
pub trait PageItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> PageItem for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Cache row: one item at its absolute offset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: PageItem")]
pub struct CachedData<T> {
    pub data: T,
    pub index: usize,
}

impl<T: PageItem> Tuple for CachedData<T> {
    type Key = usize;

    fn key(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingState {
    Idle,
    Fetching,
    Settled,
    FetchFailed,
    CacheFallback,
}

/// Where a page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOrigin {
    Remote,
    Cache,
}

/// Result of one `refresh` or `load_more`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub origin: PageOrigin,
    /// Items placed into the list by this call.
    pub len: usize,
    /// The remote answered with an empty page: nothing more to load.
    pub exhausted: bool,
}

pub fn cache_table_name(id: &str) -> String {
    format!("PagingSource_{id}_cache")
}

pub struct PagingSource<T: PageItem> {
    id: String,
    fetcher: Arc<dyn PageFetcher<T>>,
    page_size: usize,
    cache: Arc<Table<CachedData<T>>>,
    data: Vec<T>,
    cursor: usize,
    exhausted: bool,
    state: watch::Sender<PagingState>,
}

impl<T: PageItem> PagingSource<T> {
    pub fn new(
        id: impl Into<String>,
        fetcher: Arc<dyn PageFetcher<T>>,
        page_size: usize,
        database: &Database,
    ) -> Result<Self, PagingError> {
        let id = id.into();
        let cache = database.table(&cache_table_name(&id))?;
        let (state, _) = watch::channel(PagingState::Idle);
        Ok(Self {
            id,
            fetcher,
            page_size,
            cache,
            data: Vec::new(),
            cursor: 0,
            exhausted: false,
            state,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether the last successful fetch returned no items.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn state(&self) -> PagingState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PagingState> {
        self.state.subscribe()
    }

    /// Restart from offset zero, replacing the list with the first page.
    pub async fn refresh(&mut self) -> Result<PageOutcome, PagingError> {
        self.cursor = 0;
        self.exhausted = false;
        let result = self.fetch_window().await;
        let outcome = match result {
            Ok((page, origin)) => {
                let len = page.len();
                self.data = page;
                if origin == PageOrigin::Remote {
                    self.cursor = len;
                    self.exhausted = len == 0;
                }
                Ok(PageOutcome {
                    origin,
                    len,
                    exhausted: self.exhausted,
                })
            }
            Err(e) => Err(e),
        };
        self.transition(PagingState::Idle);
        outcome
    }

    /// Fetch the page at the cursor and splice it into the list.
    pub async fn load_more(&mut self) -> Result<PageOutcome, PagingError> {
        let result = self.fetch_window().await;
        let outcome = match result {
            Ok((page, origin)) => {
                let len = page.len();
                let start = self.cursor.min(self.data.len());
                let end = (start + len).min(self.data.len());
                self.data.splice(start..end, page);
                if origin == PageOrigin::Remote {
                    self.cursor += len;
                    self.exhausted = len == 0;
                }
                Ok(PageOutcome {
                    origin,
                    len,
                    exhausted: self.exhausted,
                })
            }
            Err(e) => Err(e),
        };
        self.transition(PagingState::Idle);
        outcome
    }

    /// One page at the cursor: from the remote (and written through to the
    /// cache), or from the cache when the remote fails.
    async fn fetch_window(&self) -> Result<(Vec<T>, PageOrigin), PagingError> {
        let offset = self.cursor;
        self.transition(PagingState::Fetching);
        let options = PagingFetchOptions {
            page_size: self.page_size,
            offset,
        };
        match self.fetcher.fetch(options).await {
            Ok(page) => {
                self.write_cache(&page, offset).await?;
                self.transition(PagingState::Settled);
                tracing::debug!(source = %self.id, offset, len = page.len(), "page fetched");
                Ok((page, PageOrigin::Remote))
            }
            Err(e) => {
                self.transition(PagingState::FetchFailed);
                tracing::warn!(source = %self.id, offset, error = %e, "page fetch failed, serving cache");
                let cached = self.read_cache(offset).await?;
                self.transition(PagingState::CacheFallback);
                Ok((cached, PageOrigin::Cache))
            }
        }
    }

    async fn write_cache(&self, page: &[T], offset: usize) -> Result<(), PagingError> {
        let rows = page
            .iter()
            .enumerate()
            .map(|(i, data)| CachedData {
                data: data.clone(),
                index: offset + i,
            })
            .collect();
        self.cache.insert(rows, OnConflictStrategy::Replace).await?;
        Ok(())
    }

    async fn read_cache(&self, offset: usize) -> Result<Vec<T>, PagingError> {
        let end = offset + self.page_size;
        let mut rows = self
            .cache
            .query_where(|row| row.index >= offset && row.index < end)
            .await?;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.data).collect())
    }

    fn transition(&self, next: PagingState) {
        self.state.send_replace(next);
    }
}

impl<T: PageItem> std::fmt::Debug for PagingSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingSource")
            .field("id", &self.id)
            .field("page_size", &self.page_size)
            .field("len", &self.data.len())
            .field("cursor", &self.cursor)
            .field("exhausted", &self.exhausted)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Remote with `total` numbered items; fails every call once `fail` is
    /// set.
    struct Remote {
        total: usize,
        fail: std::sync::atomic::AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PageFetcher<u32> for Remote {
        async fn fetch(&self, options: PagingFetchOptions) -> Result<Vec<u32>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::new("offline"));
            }
            let end = (options.offset + options.page_size).min(self.total);
            Ok((options.offset.min(end)..end).map(|i| i as u32).collect())
        }
    }

    fn remote(total: usize) -> Arc<Remote> {
        Arc::new(Remote {
            total,
            fail: Default::default(),
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn pages_until_exhausted() {
        let remote = remote(25);
        let mut source = PagingSource::new("n", remote.clone(), 10, &Database::in_memory()).unwrap();

        let first = source.refresh().await.unwrap();
        assert_eq!(first, PageOutcome { origin: PageOrigin::Remote, len: 10, exhausted: false });
        source.load_more().await.unwrap();
        let third = source.load_more().await.unwrap();
        assert_eq!(third.len, 5);
        assert_eq!(source.data().len(), 25);
        assert_eq!(source.data()[24], 24);

        let done = source.load_more().await.unwrap();
        assert!(done.exhausted);
        assert!(source.is_exhausted());
        assert_eq!(source.cursor(), 25);
        assert_eq!(source.state(), PagingState::Idle);
    }

    #[tokio::test]
    async fn refresh_fallback_keeps_cursor_and_retry_replaces_in_place() {
        let db = Database::in_memory();
        let remote = remote(30);
        let mut source = PagingSource::new("n", remote.clone(), 10, &db).unwrap();
        source.refresh().await.unwrap();
        source.load_more().await.unwrap();

        remote.fail.store(true, Ordering::SeqCst);
        let fallback = source.refresh().await.unwrap();
        assert_eq!(fallback.origin, PageOrigin::Cache);
        assert_eq!(source.data(), (0..10).collect::<Vec<u32>>().as_slice());
        assert_eq!(source.cursor(), 0);

        remote.fail.store(false, Ordering::SeqCst);
        let retried = source.load_more().await.unwrap();
        assert_eq!(retried.origin, PageOrigin::Remote);
        assert_eq!(source.data(), (0..10).collect::<Vec<u32>>().as_slice());
        assert_eq!(source.cursor(), 10);
    }

    #[tokio::test]
    async fn state_transitions_are_published() {
        let remote = remote(5);
        let mut source = PagingSource::new("n", remote.clone(), 10, &Database::in_memory()).unwrap();
        let mut rx = source.subscribe();
        source.refresh().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), PagingState::Idle);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_table_is_named_after_source() {
        assert_eq!(cache_table_name("assets"), "PagingSource_assets_cache");
    }
}
