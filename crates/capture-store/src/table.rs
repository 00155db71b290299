//! # Tuple Tables
//!
//! A minimal persistent table: an ordered list of serde rows, each with a
//! primary key, stored as one JSON array file per table under `Database/`
//! in a [`Directory`]. An in-memory database keeps rows only in process.
//!
//! Rows are loaded lazily on first use. Mutations run under a per-table
//! `tokio::sync::Mutex`, build the new row list, persist it, and only then
//! publish it to readers; a failed write leaves the table unchanged.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::error::TableError;
use crate::filesystem::{Directory, Filesystem};

const TABLE_DIR: &str = "Database";

/// A row type with a primary key.
pub trait Tuple: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Key: Ord + Clone + Debug + Send + Sync;

    fn key(&self) -> Self::Key;
}

/// What `insert` does when a row's key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflictStrategy {
    /// Fail the whole batch; nothing is written.
    Abort,
    /// Keep the existing row; skip the new one.
    Ignore,
    /// Overwrite the existing row in place.
    Replace,
}

/// Factory and registry for tables sharing one storage backend.
///
/// Opening the same table name twice returns the same [`Table`] instance.
#[derive(Clone)]
pub struct Database {
    backend: Option<(Arc<dyn Filesystem>, Directory)>,
    tables: Arc<Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>>,
}

impl Database {
    /// Tables persisted through `fs` under `dir`.
    pub fn new(fs: Arc<dyn Filesystem>, dir: Directory) -> Self {
        Self {
            backend: Some((fs, dir)),
            tables: Arc::default(),
        }
    }

    /// Tables that live only in memory.
    pub fn in_memory() -> Self {
        Self {
            backend: None,
            tables: Arc::default(),
        }
    }

    /// Open (or return the already open) table `name` with row type `T`.
    pub fn table<T: Tuple>(&self, name: &str) -> Result<Arc<Table<T>>, TableError> {
        let mut tables = self.tables.lock();
        if let Some(existing) = tables.get(name) {
            return Arc::clone(existing)
                .downcast::<Table<T>>()
                .map_err(|_| TableError::TypeMismatch {
                    table: name.to_string(),
                });
        }
        let table = Arc::new(Table::new(name, self.backend.clone()));
        tables.insert(name.to_string(), table.clone() as Arc<dyn Any + Send + Sync>);
        Ok(table)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("directory", &self.backend.as_ref().map(|(_, dir)| *dir))
            .field("open_tables", &self.tables.lock().len())
            .finish()
    }
}

/// A named table of `T` rows.
pub struct Table<T: Tuple> {
    name: String,
    backend: Option<(Arc<dyn Filesystem>, Directory)>,
    rows: RwLock<Vec<T>>,
    loaded: OnceCell<()>,
    write_lock: tokio::sync::Mutex<()>,
}

impl<T: Tuple> Table<T> {
    fn new(name: &str, backend: Option<(Arc<dyn Filesystem>, Directory)>) -> Self {
        Self {
            name: name.to_string(),
            backend,
            rows: RwLock::new(Vec::new()),
            loaded: OnceCell::new(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn file_path(&self) -> String {
        format!("{TABLE_DIR}/{}.json", self.name)
    }

    fn io_error(&self, source: std::io::Error) -> TableError {
        TableError::Io {
            table: self.name.clone(),
            source,
        }
    }

    async fn ensure_loaded(&self) -> Result<(), TableError> {
        self.loaded
            .get_or_try_init(|| async {
                let Some((fs, dir)) = &self.backend else {
                    return Ok(());
                };
                let rows: Vec<T> = match fs.read_file(*dir, &self.file_path()).await {
                    Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
                        TableError::Corrupt {
                            table: self.name.clone(),
                            source,
                        }
                    })?,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
                    Err(e) => return Err(self.io_error(e)),
                };
                tracing::debug!(table = %self.name, rows = rows.len(), "table loaded");
                *self.rows.write() = rows;
                Ok(())
            })
            .await
            .map(|_| ())
    }

    async fn persist(&self, rows: &[T]) -> Result<(), TableError> {
        let Some((fs, dir)) = &self.backend else {
            return Ok(());
        };
        let bytes = serde_json::to_vec(rows).map_err(|source| TableError::Corrupt {
            table: self.name.clone(),
            source,
        })?;
        fs.mkdir(*dir, TABLE_DIR).await.map_err(|e| self.io_error(e))?;
        fs.write_file(*dir, &self.file_path(), &bytes)
            .await
            .map_err(|e| self.io_error(e))
    }

    /// Snapshot of every row, in insertion order.
    pub async fn query_all(&self) -> Result<Vec<T>, TableError> {
        self.ensure_loaded().await?;
        Ok(self.rows.read().clone())
    }

    /// Rows matching `predicate`, in insertion order.
    pub async fn query_where(
        &self,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>, TableError> {
        self.ensure_loaded().await?;
        Ok(self.rows.read().iter().filter(|row| predicate(row)).cloned().collect())
    }

    /// The row with primary key `key`, if any.
    pub async fn get(&self, key: &T::Key) -> Result<Option<T>, TableError> {
        self.ensure_loaded().await?;
        Ok(self.rows.read().iter().find(|row| row.key() == *key).cloned())
    }

    /// Insert `rows` under `strategy`, returning the rows actually written.
    pub async fn insert(
        &self,
        rows: Vec<T>,
        strategy: OnConflictStrategy,
    ) -> Result<Vec<T>, TableError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_loaded().await?;

        let mut next = self.rows.read().clone();
        let mut written = Vec::with_capacity(rows.len());
        let mut batch_keys = BTreeSet::new();
        for row in rows {
            let key = row.key();
            let position = next.iter().position(|existing| existing.key() == key);
            match (position, strategy) {
                (None, _) => {
                    batch_keys.insert(key);
                    next.push(row.clone());
                    written.push(row);
                }
                (Some(_), OnConflictStrategy::Abort) => {
                    return Err(TableError::Conflict {
                        table: self.name.clone(),
                        key: format!("{key:?}"),
                    });
                }
                (Some(_), OnConflictStrategy::Ignore) => {}
                (Some(i), OnConflictStrategy::Replace) => {
                    next[i] = row.clone();
                    written.push(row);
                }
            }
        }
        if written.is_empty() {
            return Ok(written);
        }
        self.persist(&next).await?;
        *self.rows.write() = next;
        tracing::debug!(
            table = %self.name,
            written = written.len(),
            new_keys = batch_keys.len(),
            "rows inserted"
        );
        Ok(written)
    }

    /// Delete the row with primary key `key`, returning it.
    pub async fn delete(&self, key: &T::Key) -> Result<Option<T>, TableError> {
        let removed = self.delete_where(|row| row.key() == *key).await?;
        Ok(removed.into_iter().next())
    }

    /// Delete every row matching `predicate`, returning them.
    pub async fn delete_where(
        &self,
        predicate: impl Fn(&T) -> bool,
    ) -> Result<Vec<T>, TableError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_loaded().await?;

        let (removed, kept): (Vec<T>, Vec<T>) =
            self.rows.read().iter().cloned().partition(|row| predicate(row));
        if removed.is_empty() {
            return Ok(removed);
        }
        self.persist(&kept).await?;
        *self.rows.write() = kept;
        Ok(removed)
    }

    /// Remove every row; the table stays usable.
    pub async fn clear(&self) -> Result<(), TableError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_loaded().await?;
        self.persist(&[]).await?;
        self.rows.write().clear();
        Ok(())
    }

    /// Remove every row and delete the backing file.
    pub async fn drop_table(&self) -> Result<(), TableError> {
        let _guard = self.write_lock.lock().await;
        self.ensure_loaded().await?;
        if let Some((fs, dir)) = &self.backend {
            match fs.delete_file(*dir, &self.file_path()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(self.io_error(e)),
            }
        }
        self.rows.write().clear();
        tracing::debug!(table = %self.name, "table dropped");
        Ok(())
    }
}

impl<T: Tuple> std::fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("rows", &self.rows.read().len())
            .finish()
    }
}
