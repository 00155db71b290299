//! # Filesystem Capability
//!
//! Stores never touch `std::fs` directly. They go through [`Filesystem`],
//! addressing files by a relative `/`-separated path inside one of two
//! well-known [`Directory`] roots.
//!
//! Errors are plain `std::io::Error`; `ErrorKind::NotFound` is the one
//! kind callers branch on.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

/// Well-known storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Directory {
    /// Persistent application data.
    Data,
    /// Disposable cache; may be wiped by the platform at any time.
    Cache,
}

/// Injectable filesystem.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read_file(&self, dir: Directory, path: &str) -> io::Result<Vec<u8>>;

    /// Write `bytes` to `path`, replacing any existing file. The parent
    /// directory must exist.
    async fn write_file(&self, dir: Directory, path: &str, bytes: &[u8]) -> io::Result<()>;

    async fn delete_file(&self, dir: Directory, path: &str) -> io::Result<()>;

    /// Create `path` and any missing ancestors. Succeeds if it exists.
    async fn mkdir(&self, dir: Directory, path: &str) -> io::Result<()>;

    /// Names of the direct children of `path`.
    async fn readdir(&self, dir: Directory, path: &str) -> io::Result<Vec<String>>;

    /// Remove `path` and everything below it.
    async fn rmdir(&self, dir: Directory, path: &str) -> io::Result<()>;
}

fn invalid_path(path: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("path {path:?} must be relative and must not contain `..`"),
    )
}

// ---------------------------------------------------------------------------
// Local filesystem
// ---------------------------------------------------------------------------

/// [`Filesystem`] over two local directory roots, via `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalFilesystem {
    data_root: PathBuf,
    cache_root: PathBuf,
}

impl LocalFilesystem {
    pub fn new(data_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            cache_root: cache_root.into(),
        }
    }

    fn root(&self, dir: Directory) -> &Path {
        match dir {
            Directory::Data => &self.data_root,
            Directory::Cache => &self.cache_root,
        }
    }

    /// Resolve `path` under the root of `dir`, refusing escapes.
    pub fn resolve(&self, dir: Directory, path: &str) -> io::Result<PathBuf> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(invalid_path(path));
        }
        Ok(self.root(dir).join(relative))
    }
}

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn read_file(&self, dir: Directory, path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.resolve(dir, path)?).await
    }

    async fn write_file(&self, dir: Directory, path: &str, bytes: &[u8]) -> io::Result<()> {
        tokio::fs::write(self.resolve(dir, path)?, bytes).await
    }

    async fn delete_file(&self, dir: Directory, path: &str) -> io::Result<()> {
        tokio::fs::remove_file(self.resolve(dir, path)?).await
    }

    async fn mkdir(&self, dir: Directory, path: &str) -> io::Result<()> {
        tokio::fs::create_dir_all(self.resolve(dir, path)?).await
    }

    async fn readdir(&self, dir: Directory, path: &str) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(self.resolve(dir, path)?).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn rmdir(&self, dir: Directory, path: &str) -> io::Result<()> {
        tokio::fs::remove_dir_all(self.resolve(dir, path)?).await
    }
}

// ---------------------------------------------------------------------------
// In-memory filesystem
// ---------------------------------------------------------------------------

/// In-memory [`Filesystem`] for tests.
///
/// Enforces the same rules as a real filesystem where stores depend on
/// them: writes need an existing parent, reads and deletes of missing
/// files fail with `NotFound`.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    inner: RwLock<MemoryTree>,
}

#[derive(Debug, Default)]
struct MemoryTree {
    files: BTreeMap<(Directory, String), Vec<u8>>,
    dirs: BTreeSet<(Directory, String)>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files stored under `dir`.
    pub fn file_count(&self, dir: Directory) -> usize {
        self.inner.read().files.keys().filter(|(d, _)| *d == dir).count()
    }
}

fn normalize(path: &str) -> io::Result<String> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return Err(invalid_path(path)),
            p => parts.push(p),
        }
    }
    if path.starts_with('/') {
        return Err(invalid_path(path));
    }
    Ok(parts.join("/"))
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("")
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file or directory"))
}

impl MemoryTree {
    fn dir_exists(&self, dir: Directory, path: &str) -> bool {
        path.is_empty() || self.dirs.contains(&(dir, path.to_string()))
    }
}

#[async_trait]
impl Filesystem for MemoryFilesystem {
    async fn read_file(&self, dir: Directory, path: &str) -> io::Result<Vec<u8>> {
        let path = normalize(path)?;
        self.inner
            .read()
            .files
            .get(&(dir, path.clone()))
            .cloned()
            .ok_or_else(|| not_found(&path))
    }

    async fn write_file(&self, dir: Directory, path: &str, bytes: &[u8]) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.inner.write();
        if !tree.dir_exists(dir, parent_of(&path)) {
            return Err(not_found(parent_of(&path)));
        }
        tree.files.insert((dir, path), bytes.to_vec());
        Ok(())
    }

    async fn delete_file(&self, dir: Directory, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        self.inner
            .write()
            .files
            .remove(&(dir, path.clone()))
            .map(|_| ())
            .ok_or_else(|| not_found(&path))
    }

    async fn mkdir(&self, dir: Directory, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.inner.write();
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            tree.dirs.insert((dir, current.clone()));
        }
        Ok(())
    }

    async fn readdir(&self, dir: Directory, path: &str) -> io::Result<Vec<String>> {
        let path = normalize(path)?;
        let tree = self.inner.read();
        if !tree.dir_exists(dir, &path) {
            return Err(not_found(&path));
        }
        let children = tree
            .files
            .keys()
            .chain(tree.dirs.iter())
            .filter(|(d, p)| *d == dir && parent_of(p) == path && !p.is_empty())
            .map(|(_, p)| p.rsplit('/').next().unwrap_or(p.as_str()).to_string())
            .collect::<BTreeSet<_>>();
        Ok(children.into_iter().collect())
    }

    async fn rmdir(&self, dir: Directory, path: &str) -> io::Result<()> {
        let path = normalize(path)?;
        let mut tree = self.inner.write();
        if path.is_empty() || !tree.dirs.contains(&(dir, path.clone())) {
            return Err(not_found(&path));
        }
        let prefix = format!("{path}/");
        tree.files
            .retain(|(d, p), _| !(*d == dir && p.starts_with(&prefix)));
        tree.dirs
            .retain(|(d, p)| !(*d == dir && (p == &path || p.starts_with(&prefix))));
        Ok(())
    }
}
