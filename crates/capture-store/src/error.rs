//! Errors raised by stores, tables, and the thumbnailer.

use std::path::PathBuf;

use capture_core::{ContentHash, MimeType};
use thiserror::Error;

/// Error from a content-addressed store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No entry exists for the key.
    #[error("no entry for key {0}")]
    NotFound(ContentHash),

    /// The payload was not standard padded base64.
    #[error("payload is not valid base64: {0}")]
    InvalidPayload(String),

    /// The store root could not be prepared. Fatal for the operation that
    /// triggered initialization.
    #[error("failed to initialize store {store}: {source}")]
    Initialization {
        store: String,
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A thumbnail was requested for a payload that is not an image.
    #[error("payload {hash} has MIME type {mime_type}, not an image")]
    NotAnImage { hash: ContentHash, mime_type: MimeType },

    /// Side table failure.
    #[error(transparent)]
    Table(#[from] TableError),

    /// Thumbnail derivation failure.
    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the key was absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Error from a [`Table`](crate::table::Table).
#[derive(Error, Debug)]
pub enum TableError {
    /// Insert with `Abort` hit an existing key.
    #[error("table {table}: row with key {key} already exists")]
    Conflict { table: String, key: String },

    /// The backing file could not be read or written.
    #[error("table {table}: I/O error: {source}")]
    Io {
        table: String,
        #[source]
        source: std::io::Error,
    },

    /// The backing file did not contain valid rows.
    #[error("table {table}: corrupt contents: {source}")]
    Corrupt {
        table: String,
        #[source]
        source: serde_json::Error,
    },

    /// The table name is already open with a different row type.
    #[error("table {table} is already open with a different row type")]
    TypeMismatch { table: String },
}

/// Error while deriving a thumbnail.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    /// The bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The scaled image could not be encoded.
    #[error("failed to encode thumbnail: {0}")]
    Encode(String),

    /// The blocking worker panicked or was cancelled.
    #[error("thumbnail worker did not complete: {0}")]
    Worker(String),
}
