use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use capture_store::{Database, StoreContext};
use parking_lot::Mutex;

use crate::error::PagingError;
use crate::fetcher::PageFetcher;
use crate::source::{PageItem, PagingSource};

/// A source shared between callers. Holding the lock makes `refresh` and
/// `load_more` single-flight per source.
pub type SharedPagingSource<T> = Arc<tokio::sync::Mutex<PagingSource<T>>>;

/// Registry handing out one [`PagingSource`] per id.
#[derive(Clone)]
pub struct PagingSourceManager {
    database: Database,
    sources: Arc<Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl PagingSourceManager {
    pub fn new(database: Database) -> Self {
        Self {
            database,
            sources: Arc::default(),
        }
    }

    pub fn from_context(context: &StoreContext) -> Self {
        Self::new(context.database.clone())
    }

    /// The source registered under `id`, created with `fetcher` and
    /// `page_size` on first request. Later calls return the existing
    /// source and ignore both arguments.
    pub fn get_paging_source<T: PageItem>(
        &self,
        id: &str,
        fetcher: Arc<dyn PageFetcher<T>>,
        page_size: usize,
    ) -> Result<SharedPagingSource<T>, PagingError> {
        let mut sources = self.sources.lock();
        if let Some(existing) = sources.get(id) {
            return Arc::clone(existing)
                .downcast::<tokio::sync::Mutex<PagingSource<T>>>()
                .map_err(|_| PagingError::TypeMismatch { id: id.to_string() });
        }
        let source = Arc::new(tokio::sync::Mutex::new(PagingSource::new(
            id,
            fetcher,
            page_size,
            &self.database,
        )?));
        sources.insert(id.to_string(), source.clone() as Arc<dyn Any + Send + Sync>);
        tracing::debug!(source = id, page_size, "paging source created");
        Ok(source)
    }

    pub fn len(&self) -> usize {
        self.sources.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.lock().is_empty()
    }
}

impl std::fmt::Debug for PagingSourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<String> = self.sources.lock().keys().cloned().collect();
        ids.sort();
        f.debug_struct("PagingSourceManager")
            .field("sources", &ids)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetcher::PagingFetchOptions;

    fn empty_fetcher<T: PageItem>() -> Arc<dyn PageFetcher<T>> {
        Arc::new(|_: PagingFetchOptions| async { Ok::<Vec<T>, FetchError>(Vec::new()) })
    }

    #[tokio::test]
    async fn same_id_returns_same_source() {
        let manager = PagingSourceManager::new(Database::in_memory());
        let a = manager.get_paging_source::<u32>("assets", empty_fetcher(), 10).unwrap();
        let b = manager.get_paging_source::<u32>("assets", empty_fetcher(), 99).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.lock().await.page_size(), 10);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn different_item_type_is_rejected() {
        let manager = PagingSourceManager::new(Database::in_memory());
        manager.get_paging_source::<u32>("assets", empty_fetcher(), 10).unwrap();
        assert!(matches!(
            manager.get_paging_source::<String>("assets", empty_fetcher(), 10),
            Err(PagingError::TypeMismatch { .. })
        ));
    }
}
