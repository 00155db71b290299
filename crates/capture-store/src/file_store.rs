//! # Content-Addressed File Store
//!
//! [`FileStoreBase`] keeps each payload in one file named by the hash of
//! its bytes, under `FileStoreBase/<id>/` in its [`Directory`]. A side
//! table `<id>_extension` remembers the MIME type of each key so the file
//! can carry a meaningful extension (`<hash>.<ext>`); a key without a MIME
//! record maps to the bare `<hash>`.
//!
//! ## Invariants
//!
//! - `write` is idempotent: the same bytes always land at the same key.
//! - The MIME record is last-write-wins.
//! - Write, delete, clear, drop, and lazy root creation serialize through
//!   one `tokio::sync::Mutex`. `read` and `exists` take no lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use capture_core::{ContentHash, MimeType};
use capture_crypto::ContentHasher;
use serde::{Deserialize, Serialize};

use crate::context::StoreContext;
use crate::error::StoreError;
use crate::filesystem::{Directory, Filesystem};
use crate::table::{OnConflictStrategy, Table, Tuple};

const ROOT_DIR: &str = "FileStoreBase";

/// Operations shared by every content-addressed store.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store a base64 payload, returning its key.
    async fn write(&self, base64: &str, mime_type: &MimeType) -> Result<ContentHash, StoreError>;

    /// Read a payload back as base64. `NotFound` if absent.
    async fn read(&self, key: &ContentHash) -> Result<String, StoreError>;

    /// Delete a payload, returning its key.
    async fn delete(&self, key: &ContentHash) -> Result<ContentHash, StoreError>;

    async fn exists(&self, key: &ContentHash) -> Result<bool, StoreError>;

    /// Remove every entry. The store stays usable.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Remove every entry and the persistent side index.
    async fn drop_store(&self) -> Result<(), StoreError>;

    /// MIME type recorded for `key`, if any.
    async fn mime_type(&self, key: &ContentHash) -> Result<Option<MimeType>, StoreError>;
}

/// Row of the `<id>_extension` side table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionRecord {
    pub index: ContentHash,
    pub mime_type: MimeType,
}

impl Tuple for ExtensionRecord {
    type Key = ContentHash;

    fn key(&self) -> ContentHash {
        self.index.clone()
    }
}

/// Content-addressed store rooted at `FileStoreBase/<id>`.
pub struct FileStoreBase {
    id: String,
    directory: Directory,
    fs: Arc<dyn Filesystem>,
    hasher: Arc<dyn ContentHasher>,
    extensions: Arc<Table<ExtensionRecord>>,
    lock: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
}

impl FileStoreBase {
    pub fn new(
        id: impl Into<String>,
        directory: Directory,
        context: &StoreContext,
    ) -> Result<Self, StoreError> {
        let id = id.into();
        let extensions = context.database.table(&format!("{id}_extension"))?;
        Ok(Self {
            id,
            directory,
            fs: context.fs.clone(),
            hasher: context.hasher.clone(),
            extensions,
            lock: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn directory(&self) -> Directory {
        self.directory
    }

    /// The hasher that produces this store's keys.
    pub fn hasher(&self) -> &Arc<dyn ContentHasher> {
        &self.hasher
    }

    fn root(&self) -> String {
        format!("{ROOT_DIR}/{}", self.id)
    }

    fn file_path(&self, key: &ContentHash, mime_type: Option<&MimeType>) -> String {
        match mime_type {
            Some(mime) => format!("{}/{key}.{}", self.root(), mime.extension()),
            None => format!("{}/{key}", self.root()),
        }
    }

    async fn path_for(&self, key: &ContentHash) -> Result<String, StoreError> {
        let mime = self.extensions.get(key).await?.map(|r| r.mime_type);
        Ok(self.file_path(key, mime.as_ref()))
    }

    /// Create the root directory once. Caller holds `self.lock`.
    async fn initialize_locked(&self) -> Result<(), StoreError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.fs
            .mkdir(self.directory, &self.root())
            .await
            .map_err(|source| StoreError::Initialization {
                store: self.id.clone(),
                source,
            })?;
        self.initialized.store(true, Ordering::Release);
        tracing::debug!(store = %self.id, "store initialized");
        Ok(())
    }

    /// Remove the root directory and every index row. Caller holds
    /// `self.lock`.
    async fn clear_locked(&self) -> Result<(), StoreError> {
        match self.fs.rmdir(self.directory, &self.root()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(self.root(), e)),
        }
        self.extensions.clear().await?;
        self.initialized.store(false, Ordering::Release);
        Ok(())
    }

    /// Store raw bytes, returning their key.
    pub async fn write_bytes(
        &self,
        bytes: &[u8],
        mime_type: &MimeType,
    ) -> Result<ContentHash, StoreError> {
        let key = self.hasher.hash(bytes);

        let _guard = self.lock.lock().await;
        self.initialize_locked().await?;

        // File first, then the index row: until the row is replaced the
        // previous file stays reachable.
        let previous = self.extensions.get(&key).await?;
        let path = self.file_path(&key, Some(mime_type));
        self.fs
            .write_file(self.directory, &path, bytes)
            .await
            .map_err(|e| StoreError::io(&path, e))?;

        self.extensions
            .insert(
                vec![ExtensionRecord {
                    index: key.clone(),
                    mime_type: mime_type.clone(),
                }],
                OnConflictStrategy::Replace,
            )
            .await?;

        // A MIME change moves the file; remove the copy under the old name.
        if let Some(old) = previous.filter(|old| old.mime_type.extension() != mime_type.extension()) {
            let old_path = self.file_path(&key, Some(&old.mime_type));
            if let Err(e) = self.fs.delete_file(self.directory, &old_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(StoreError::io(old_path, e));
                }
            }
        }

        tracing::debug!(store = %self.id, key = %key, mime = %mime_type, size = bytes.len(), "payload written");
        Ok(key)
    }

    /// Read raw bytes. `NotFound` if absent.
    pub async fn read_bytes(&self, key: &ContentHash) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key).await?;
        match self.fs.read_file(self.directory, &path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.clone()))
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl FileStore for FileStoreBase {
    async fn write(&self, base64: &str, mime_type: &MimeType) -> Result<ContentHash, StoreError> {
        let bytes = BASE64_STANDARD
            .decode(base64)
            .map_err(|e| StoreError::InvalidPayload(e.to_string()))?;
        self.write_bytes(&bytes, mime_type).await
    }

    async fn read(&self, key: &ContentHash) -> Result<String, StoreError> {
        Ok(BASE64_STANDARD.encode(self.read_bytes(key).await?))
    }

    async fn delete(&self, key: &ContentHash) -> Result<ContentHash, StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(key).await?;
        let removed = self.fs.delete_file(self.directory, &path).await;
        // The index row goes either way; a row without a file is stale.
        self.extensions.delete(key).await?;
        match removed {
            Ok(()) => {
                tracing::debug!(store = %self.id, key = %key, "payload deleted");
                Ok(key.clone())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.clone()))
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn exists(&self, key: &ContentHash) -> Result<bool, StoreError> {
        let names = match self.fs.readdir(self.directory, &self.root()).await {
            Ok(names) => names,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(self.root(), e)),
        };
        let key = key.as_str();
        Ok(names.iter().any(|name| {
            name == key
                || name
                    .strip_prefix(key)
                    .is_some_and(|rest| rest.starts_with('.'))
        }))
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.clear_locked().await?;
        tracing::debug!(store = %self.id, "store cleared");
        Ok(())
    }

    async fn drop_store(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.clear_locked().await?;
        self.extensions.drop_table().await?;
        tracing::debug!(store = %self.id, "store dropped");
        Ok(())
    }

    async fn mime_type(&self, key: &ContentHash) -> Result<Option<MimeType>, StoreError> {
        Ok(self.extensions.get(key).await?.map(|r| r.mime_type))
    }
}

impl std::fmt::Debug for FileStoreBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStoreBase")
            .field("id", &self.id)
            .field("directory", &self.directory)
            .field("initialized", &self.initialized.load(Ordering::Relaxed))
            .finish()
    }
}
