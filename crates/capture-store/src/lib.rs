//! # capture-store: Content-Addressed Media Storage
//!
//! Stores captured media by the hash of its bytes, so identical content is
//! stored once and a record can refer to its payloads by key alone.
//!
//! ## Layers
//!
//! - [`filesystem`]: the injectable filesystem capability, addressed by
//!   relative path within a [`Directory`]. [`LocalFilesystem`] maps onto
//!   real directories; [`MemoryFilesystem`] is the test double.
//! - [`table`]: a tiny tuple database: named tables of serde rows with
//!   conflict strategies, persisted as JSON files through the filesystem.
//! - [`file_store`]: [`FileStoreBase`], the content-addressed store with
//!   its MIME side index, and the [`FileStore`] operations trait.
//! - [`cache`]: [`CacheStore`], a base store in the cache directory whose
//!   delete is idempotent.
//! - [`image_store`]: [`ImageStore`], a base store that also derives and
//!   memoizes thumbnails into a [`CacheStore`].
//!
//! ## Concurrency
//!
//! Each store serializes its mutations (write, delete, clear, drop and
//! lazy initialization) through one `tokio::sync::Mutex`. Reads take no
//! store lock.

pub mod cache;
pub mod context;
pub mod error;
pub mod file_store;
pub mod filesystem;
pub mod image_store;
pub mod table;
pub mod thumbnail;

pub use cache::CacheStore;
pub use context::StoreContext;
pub use error::{StoreError, TableError, ThumbnailError};
pub use file_store::{FileStore, FileStoreBase};
pub use filesystem::{Directory, Filesystem, LocalFilesystem, MemoryFilesystem};
pub use image_store::{ImageStore, ThumbnailRef};
pub use table::{Database, OnConflictStrategy, Table, Tuple};
pub use thumbnail::{ImageThumbnailer, Thumbnail, Thumbnailer};
