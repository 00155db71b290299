//! Content-addressed store in the cache directory.
//!
//! The platform may wipe the cache at any time, so deleting a key that is
//! already gone is not an error.

use async_trait::async_trait;
use capture_core::{ContentHash, MimeType};

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::file_store::{FileStore, FileStoreBase};
use crate::filesystem::Directory;

pub const CACHE_STORE_ID: &str = "CacheStore";

#[derive(Debug)]
pub struct CacheStore {
    base: FileStoreBase,
}

impl CacheStore {
    pub fn new(context: &StoreContext) -> Result<Self, StoreError> {
        Ok(Self {
            base: FileStoreBase::new(CACHE_STORE_ID, Directory::Cache, context)?,
        })
    }

    /// Read a cached payload, or `None` if it is not (or no longer) cached.
    pub async fn read_cache(&self, key: &ContentHash) -> Result<Option<String>, StoreError> {
        match self.base.read(key).await {
            Ok(base64) => Ok(Some(base64)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn write_bytes(
        &self,
        bytes: &[u8],
        mime_type: &MimeType,
    ) -> Result<ContentHash, StoreError> {
        self.base.write_bytes(bytes, mime_type).await
    }
}

#[async_trait]
impl FileStore for CacheStore {
    async fn write(&self, base64: &str, mime_type: &MimeType) -> Result<ContentHash, StoreError> {
        self.base.write(base64, mime_type).await
    }

    async fn read(&self, key: &ContentHash) -> Result<String, StoreError> {
        self.base.read(key).await
    }

    async fn delete(&self, key: &ContentHash) -> Result<ContentHash, StoreError> {
        match self.base.delete(key).await {
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(key = %key, "cache entry already absent");
                Ok(key.clone())
            }
            other => other,
        }
    }

    async fn exists(&self, key: &ContentHash) -> Result<bool, StoreError> {
        self.base.exists(key).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.base.clear().await
    }

    async fn drop_store(&self) -> Result<(), StoreError> {
        self.base.drop_store().await
    }

    async fn mime_type(&self, key: &ContentHash) -> Result<Option<MimeType>, StoreError> {
        self.base.mime_type(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFilesystem;
    use std::sync::Arc;

    #[tokio::test]
    async fn delete_of_absent_key_succeeds() {
        let cache = CacheStore::new(&StoreContext::in_memory()).unwrap();
        let key = ContentHash::new("0000").unwrap();
        assert_eq!(cache.delete(&key).await.unwrap(), key);
        assert_eq!(cache.delete(&key).await.unwrap(), key);
    }

    #[tokio::test]
    async fn read_cache_is_optional() {
        let cache = CacheStore::new(&StoreContext::in_memory()).unwrap();
        let key = cache.write("aGVsbG8=", &MimeType::from("text/plain")).await.unwrap();
        assert_eq!(cache.read_cache(&key).await.unwrap().as_deref(), Some("aGVsbG8="));
        cache.delete(&key).await.unwrap();
        assert_eq!(cache.read_cache(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn lives_in_cache_directory() {
        let fs = Arc::new(MemoryFilesystem::new());
        let cache = CacheStore::new(&StoreContext::new(fs.clone())).unwrap();
        cache.write("aGVsbG8=", &MimeType::from("text/plain")).await.unwrap();
        assert_eq!(fs.file_count(Directory::Cache), 1);
        // Only the side table lives in the data directory.
        assert_eq!(fs.file_count(Directory::Data), 1);
    }
}
