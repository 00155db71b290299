//! # Image Store
//!
//! A content-addressed store for captured media that also derives
//! thumbnails. Thumbnails are written into a [`CacheStore`] and linked to
//! their source through the `ImageStore_thumbnailRef` table, one row per
//! source image.
//!
//! Thumbnail creation is memoized but not single-flighted: two concurrent
//! first requests may both compute the thumbnail. Both write the same
//! bytes to the same cache key and the ref insert ignores conflicts, so
//! the result is the same either way.

use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use capture_core::{CaptureConfig, ContentHash, MimeType};
use capture_crypto::ContentHasher;
use serde::{Deserialize, Serialize};

use crate::cache::CacheStore;
use crate::context::StoreContext;
use crate::error::{StoreError, ThumbnailError};
use crate::file_store::{FileStore, FileStoreBase};
use crate::filesystem::Directory;
use crate::table::{OnConflictStrategy, Table, Tuple};
use crate::thumbnail::{ImageThumbnailer, Thumbnailer};

pub const IMAGE_STORE_ID: &str = "ImageStore";

/// Link from a source image to its cached thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRef {
    pub image_index: ContentHash,
    pub thumbnail_index: ContentHash,
}

impl Tuple for ThumbnailRef {
    type Key = ContentHash;

    fn key(&self) -> ContentHash {
        self.image_index.clone()
    }
}

pub struct ImageStore {
    base: FileStoreBase,
    cache: CacheStore,
    thumbnail_refs: Arc<Table<ThumbnailRef>>,
    thumbnailer: Arc<dyn Thumbnailer>,
    thumbnail_max: u32,
}

impl ImageStore {
    pub fn new(
        context: &StoreContext,
        thumbnailer: Arc<dyn Thumbnailer>,
        thumbnail_max: u32,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            base: FileStoreBase::new(IMAGE_STORE_ID, Directory::Data, context)?,
            cache: CacheStore::new(context)?,
            thumbnail_refs: context
                .database
                .table(&format!("{IMAGE_STORE_ID}_thumbnailRef"))?,
            thumbnailer,
            thumbnail_max,
        })
    }

    /// Image store with the `image`-crate thumbnailer and the configured
    /// thumbnail size.
    pub fn with_config(context: &StoreContext, config: &CaptureConfig) -> Result<Self, StoreError> {
        Self::new(context, Arc::new(ImageThumbnailer), config.thumbnail_max)
    }

    /// The hasher that produces this store's keys.
    pub fn hasher(&self) -> &Arc<dyn ContentHasher> {
        self.base.hasher()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Raw bytes of a stored payload.
    pub async fn read_bytes(&self, key: &ContentHash) -> Result<Vec<u8>, StoreError> {
        self.base.read_bytes(key).await
    }

    /// Thumbnail of `key` as a `data:` URI, deriving and caching it on
    /// first request.
    pub async fn get_or_create_thumbnail(&self, key: &ContentHash) -> Result<String, StoreError> {
        let (thumb_key, base64) = self.ensure_thumbnail(key).await?;
        let mime = self
            .cache
            .mime_type(&thumb_key)
            .await?
            .unwrap_or_else(|| MimeType::from("image/png"));
        Ok(format!("data:{mime};base64,{base64}"))
    }

    /// Thumbnail of `key` as base64, deriving and caching it on first
    /// request.
    pub async fn read_thumbnail(&self, key: &ContentHash) -> Result<String, StoreError> {
        Ok(self.ensure_thumbnail(key).await?.1)
    }

    async fn ensure_thumbnail(
        &self,
        key: &ContentHash,
    ) -> Result<(ContentHash, String), StoreError> {
        if let Some(existing) = self.thumbnail_refs.get(key).await? {
            if let Some(base64) = self.cache.read_cache(&existing.thumbnail_index).await? {
                return Ok((existing.thumbnail_index, base64));
            }
            // The cache was wiped underneath the ref; derive again.
            tracing::warn!(key = %key, "thumbnail missing from cache, regenerating");
            self.thumbnail_refs.delete(key).await?;
        }

        let mime_type = self
            .base
            .mime_type(key)
            .await?
            .unwrap_or_else(|| MimeType::from("application/octet-stream"));
        if !mime_type.is_image() {
            return Err(StoreError::NotAnImage {
                hash: key.clone(),
                mime_type,
            });
        }
        let bytes = self.base.read_bytes(key).await?;

        let thumbnailer = self.thumbnailer.clone();
        let max = self.thumbnail_max;
        let thumbnail = tokio::task::spawn_blocking(move || {
            thumbnailer.thumbnail(&bytes, &mime_type, max)
        })
        .await
        .map_err(|e| ThumbnailError::Worker(e.to_string()))??;

        let thumb_key = self
            .cache
            .write_bytes(&thumbnail.bytes, &thumbnail.mime_type)
            .await?;
        self.thumbnail_refs
            .insert(
                vec![ThumbnailRef {
                    image_index: key.clone(),
                    thumbnail_index: thumb_key.clone(),
                }],
                OnConflictStrategy::Ignore,
            )
            .await?;
        tracing::debug!(key = %key, thumbnail = %thumb_key, "thumbnail created");
        Ok((thumb_key, BASE64_STANDARD.encode(&thumbnail.bytes)))
    }

    async fn delete_thumbnail(&self, key: &ContentHash) -> Result<(), StoreError> {
        if let Some(existing) = self.thumbnail_refs.delete(key).await? {
            self.cache.delete(&existing.thumbnail_index).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for ImageStore {
    async fn write(&self, base64: &str, mime_type: &MimeType) -> Result<ContentHash, StoreError> {
        self.base.write(base64, mime_type).await
    }

    async fn read(&self, key: &ContentHash) -> Result<String, StoreError> {
        self.base.read(key).await
    }

    /// Deletes the thumbnail and its ref first, then the image.
    async fn delete(&self, key: &ContentHash) -> Result<ContentHash, StoreError> {
        self.delete_thumbnail(key).await?;
        self.base.delete(key).await
    }

    async fn exists(&self, key: &ContentHash) -> Result<bool, StoreError> {
        self.base.exists(key).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for existing in self.thumbnail_refs.query_all().await? {
            self.cache.delete(&existing.thumbnail_index).await?;
        }
        self.thumbnail_refs.clear().await?;
        self.base.clear().await
    }

    async fn drop_store(&self) -> Result<(), StoreError> {
        self.thumbnail_refs.drop_table().await?;
        self.cache.drop_store().await?;
        self.base.drop_store().await
    }

    async fn mime_type(&self, key: &ContentHash) -> Result<Option<MimeType>, StoreError> {
        self.base.mime_type(key).await
    }
}

impl std::fmt::Debug for ImageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStore")
            .field("base", &self.base)
            .field("cache", &self.cache)
            .field("thumbnail_max", &self.thumbnail_max)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::thumbnail::Thumbnail;

    /// Returns a fixed payload and counts invocations.
    #[derive(Default)]
    struct CountingThumbnailer {
        calls: AtomicUsize,
    }

    impl Thumbnailer for CountingThumbnailer {
        fn thumbnail(
            &self,
            bytes: &[u8],
            _: &MimeType,
            _: u32,
        ) -> Result<Thumbnail, ThumbnailError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Thumbnail {
                bytes: bytes.iter().rev().copied().collect(),
                mime_type: MimeType::from("image/png"),
            })
        }
    }

    fn store_with(thumbnailer: Arc<dyn Thumbnailer>) -> ImageStore {
        ImageStore::new(&StoreContext::in_memory(), thumbnailer, 100).unwrap()
    }

    #[tokio::test]
    async fn thumbnail_is_memoized() {
        let counter = Arc::new(CountingThumbnailer::default());
        let store = store_with(counter.clone());
        let key = store.write("AAECAw==", &MimeType::from("image/png")).await.unwrap();

        let first = store.get_or_create_thumbnail(&key).await.unwrap();
        let second = store.get_or_create_thumbnail(&key).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "data:image/png;base64,AwIBAA==");
        assert_eq!(counter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.read_thumbnail(&key).await.unwrap(), "AwIBAA==");
    }

    #[tokio::test]
    async fn non_images_have_no_thumbnail() {
        let store = store_with(Arc::new(CountingThumbnailer::default()));
        let key = store.write("aGVsbG8=", &MimeType::from("text/plain")).await.unwrap();
        let err = store.get_or_create_thumbnail(&key).await.unwrap_err();
        assert!(matches!(err, StoreError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn thumbnail_of_absent_image_is_not_found() {
        let store = store_with(Arc::new(CountingThumbnailer::default()));
        let key = ContentHash::new("abc").unwrap();
        // No MIME record: treated as octet-stream, not an image.
        assert!(store.get_or_create_thumbnail(&key).await.is_err());
    }

    #[tokio::test]
    async fn delete_cascades_to_thumbnail() {
        let store = store_with(Arc::new(CountingThumbnailer::default()));
        let key = store.write("AAECAw==", &MimeType::from("image/png")).await.unwrap();
        store.get_or_create_thumbnail(&key).await.unwrap();
        let thumb_key = store.thumbnail_refs.get(&key).await.unwrap().unwrap().thumbnail_index;
        assert!(store.cache().exists(&thumb_key).await.unwrap());

        store.delete(&key).await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        assert!(!store.cache().exists(&thumb_key).await.unwrap());
        assert!(store.thumbnail_refs.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn wiped_cache_regenerates() {
        let counter = Arc::new(CountingThumbnailer::default());
        let store = store_with(counter.clone());
        let key = store.write("AAECAw==", &MimeType::from("image/png")).await.unwrap();
        store.get_or_create_thumbnail(&key).await.unwrap();
        store.cache().clear().await.unwrap();
        store.get_or_create_thumbnail(&key).await.unwrap();
        assert_eq!(counter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn drop_cascades() {
        let store = store_with(Arc::new(CountingThumbnailer::default()));
        let key = store.write("AAECAw==", &MimeType::from("image/png")).await.unwrap();
        store.get_or_create_thumbnail(&key).await.unwrap();
        store.drop_store().await.unwrap();
        assert!(!store.exists(&key).await.unwrap());
        assert!(store.thumbnail_refs.query_all().await.unwrap().is_empty());
    }
}
