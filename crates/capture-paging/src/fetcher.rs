use std::future::Future;

use async_trait::async_trait;

use crate::error::FetchError;

/// Window requested from the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingFetchOptions {
    pub page_size: usize,
    pub offset: usize,
}

/// Fetches one page of remote items.
///
/// Implemented for any `Fn(PagingFetchOptions) -> impl Future<Output =
/// Result<Vec<T>, FetchError>>`, so a closure calling an HTTP client is
/// enough.
#[async_trait]
pub trait PageFetcher<T: Send + 'static>: Send + Sync {
    async fn fetch(&self, options: PagingFetchOptions) -> Result<Vec<T>, FetchError>;
}

#[async_trait]
impl<T, F, Fut> PageFetcher<T> for F
where
    T: Send + 'static,
    F: Fn(PagingFetchOptions) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<T>, FetchError>> + Send + 'static,
{
    async fn fetch(&self, options: PagingFetchOptions) -> Result<Vec<T>, FetchError> {
        (self)(options).await
    }
}
