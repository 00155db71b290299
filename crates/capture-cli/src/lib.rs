//! # capture-cli: Capture Core Command-Line Interface
//!
//! ## Subcommands
//!
//! - `put`, `get`, `rm`, `thumbnail`: payload store operations
//! - `seal`: assemble, sign, and persist a record for a file
//! - `verify`: check every signature of a record file
//! - `list`: records in the local repository
//!
//! Argument parsing lives in `main.rs`; handlers here delegate to the
//! domain crates and print one `OK:`/`FAIL:` summary line per command.

pub mod host;
pub mod payload;
pub mod record;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use capture_core::{CaptureConfig, ContentHash};
use capture_store::{ImageStore, StoreContext};

/// Stores and configuration opened for one command.
pub struct Workspace {
    pub config: CaptureConfig,
    pub context: StoreContext,
    pub store: Arc<ImageStore>,
}

impl Workspace {
    pub fn open(config: CaptureConfig) -> Result<Self> {
        let context = StoreContext::local(&config);
        let store = ImageStore::with_config(&context, &config).context("failed to open image store")?;
        tracing::debug!(data_dir = %config.data_dir.display(), cache_dir = %config.cache_dir.display(), "workspace opened");
        Ok(Self {
            config,
            context,
            store: Arc::new(store),
        })
    }
}

pub(crate) fn parse_hash(raw: &str) -> Result<ContentHash> {
    ContentHash::new(raw.trim()).with_context(|| format!("invalid content hash: {raw}"))
}

pub(crate) async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read file: {}", path.display()))
}

pub(crate) async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write file: {}", path.display()))
}
