//! Shared capabilities handed to every store.

use std::sync::Arc;

use capture_core::CaptureConfig;
use capture_crypto::{ContentHasher, Sha256Hasher};

use crate::filesystem::{Directory, Filesystem, LocalFilesystem, MemoryFilesystem};
use crate::table::Database;

/// Filesystem, table database, and hasher a store is built on.
#[derive(Clone)]
pub struct StoreContext {
    pub fs: Arc<dyn Filesystem>,
    pub database: Database,
    pub hasher: Arc<dyn ContentHasher>,
}

impl StoreContext {
    /// Tables persisted in the data directory of `fs`; SHA-256 keys.
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self {
            database: Database::new(fs.clone(), Directory::Data),
            fs,
            hasher: Arc::new(Sha256Hasher),
        }
    }

    /// Local directories from `config`.
    pub fn local(config: &CaptureConfig) -> Self {
        Self::new(Arc::new(LocalFilesystem::new(
            &config.data_dir,
            &config.cache_dir,
        )))
    }

    /// Everything in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryFilesystem::new()))
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }
}

impl std::fmt::Debug for StoreContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreContext")
            .field("database", &self.database)
            .field("hasher", &self.hasher.algorithm())
            .finish()
    }
}
