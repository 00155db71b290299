//! Runtime configuration for the capture core.
//!
//! Defaults suit a local development checkout. Override via environment
//! variables or explicit construction for tests.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default maximum thumbnail edge, in pixels.
pub const DEFAULT_THUMBNAIL_MAX: u32 = 100;

/// Default per-provider timeout during record assembly.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default number of items requested per remote page.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Configuration shared by the stores, the collector, and the paging layer.
///
/// Custom `Debug` implementation redacts the signing seed to prevent key
/// material leaking into log output.
#[derive(Clone)]
pub struct CaptureConfig {
    /// Root of the persistent data directory (images, tables).
    pub data_dir: PathBuf,
    /// Root of the cache directory (thumbnails). Safe to wipe.
    pub cache_dir: PathBuf,
    /// Maximum thumbnail width/height in pixels.
    pub thumbnail_max: u32,
    /// Upper bound on a single facts or signature provider call.
    pub provider_timeout: Duration,
    /// Items requested per page by paging sources.
    pub page_size: usize,
    /// Optional 32-byte Ed25519 seed used by the command-line signer.
    pub signing_seed: Option<[u8; 32]>,
}

impl std::fmt::Debug for CaptureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureConfig")
            .field("data_dir", &self.data_dir)
            .field("cache_dir", &self.cache_dir)
            .field("thumbnail_max", &self.thumbnail_max)
            .field("provider_timeout", &self.provider_timeout)
            .field("page_size", &self.page_size)
            .field(
                "signing_seed",
                &self.signing_seed.map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("capture-data"),
            cache_dir: PathBuf::from("capture-cache"),
            thumbnail_max: DEFAULT_THUMBNAIL_MAX,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            page_size: DEFAULT_PAGE_SIZE,
            signing_seed: None,
        }
    }
}

impl CaptureConfig {
    /// Load configuration from environment variables.
    ///
    /// Variables:
    /// - `CAPTURE_DATA_DIR` (default: `capture-data`)
    /// - `CAPTURE_CACHE_DIR` (default: `capture-cache`)
    /// - `CAPTURE_THUMBNAIL_MAX` (default: 100)
    /// - `CAPTURE_PROVIDER_TIMEOUT_MS` (default: 30000)
    /// - `CAPTURE_PAGE_SIZE` (default: 20)
    /// - `CAPTURE_SIGNING_KEY` (optional, 64 hex chars)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            data_dir: std::env::var("CAPTURE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_dir: std::env::var("CAPTURE_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            thumbnail_max: env_number("CAPTURE_THUMBNAIL_MAX", defaults.thumbnail_max)?,
            provider_timeout: Duration::from_millis(env_number(
                "CAPTURE_PROVIDER_TIMEOUT_MS",
                defaults.provider_timeout.as_millis() as u64,
            )?),
            page_size: env_number("CAPTURE_PAGE_SIZE", defaults.page_size)?,
            signing_seed: match std::env::var("CAPTURE_SIGNING_KEY") {
                Ok(hex) => Some(parse_seed("CAPTURE_SIGNING_KEY", &hex)?),
                Err(_) => None,
            },
        })
    }

    /// Configuration rooted at a single directory (for tests and tooling).
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
            ..Self::default()
        }
    }
}

fn env_number<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_seed(var: &str, hex: &str) -> Result<[u8; 32], ConfigError> {
    let hex = hex.trim();
    let invalid = || ConfigError::InvalidSigningKey {
        var: var.to_string(),
    };
    if hex.len() != 64 || !hex.is_ascii() {
        return Err(invalid());
    }
    let mut seed = [0u8; 32];
    for (i, byte) in seed.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
    }
    Ok(seed)
}
