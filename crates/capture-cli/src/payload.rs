//! # Payload Subcommands
//!
//! `put`, `get`, `rm`, and `thumbnail` against the local image store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use capture_core::MimeType;
use capture_store::FileStore;

use crate::{parse_hash, read_file, write_file, Workspace};

/// Store a file, printing its key.
pub async fn run_put(ws: &Workspace, file: &Path, mime: &str) -> Result<u8> {
    let bytes = read_file(file).await?;
    let key = ws
        .store
        .write(&BASE64_STANDARD.encode(&bytes), &MimeType::new(mime))
        .await
        .context("store write failed")?;
    println!("OK: stored key={key} mime={mime} bytes={}", bytes.len());
    Ok(0)
}

/// Read a payload to `out`, or print it as base64.
pub async fn run_get(ws: &Workspace, hash: &str, out: Option<&PathBuf>) -> Result<u8> {
    let key = parse_hash(hash)?;
    match out {
        Some(path) => {
            let bytes = ws.store.read_bytes(&key).await.context("store read failed")?;
            write_file(path, &bytes).await?;
            println!("OK: wrote key={key} to {}", path.display());
        }
        None => println!("{}", ws.store.read(&key).await.context("store read failed")?),
    }
    Ok(0)
}

pub async fn run_rm(ws: &Workspace, hash: &str) -> Result<u8> {
    let key = parse_hash(hash)?;
    ws.store.delete(&key).await.context("store delete failed")?;
    println!("OK: removed key={key}");
    Ok(0)
}

/// Derive (or reuse) the thumbnail of an image payload.
pub async fn run_thumbnail(ws: &Workspace, hash: &str, out: Option<&PathBuf>) -> Result<u8> {
    let key = parse_hash(hash)?;
    match out {
        Some(path) => {
            let base64 = ws.store.read_thumbnail(&key).await.context("thumbnail failed")?;
            let bytes = BASE64_STANDARD
                .decode(base64)
                .context("cached thumbnail is not valid base64")?;
            write_file(path, &bytes).await?;
            println!("OK: wrote thumbnail of key={key} to {}", path.display());
        }
        None => println!(
            "{}",
            ws.store.get_or_create_thumbnail(&key).await.context("thumbnail failed")?
        ),
    }
    Ok(0)
}
