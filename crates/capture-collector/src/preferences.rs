//! Boolean preferences that gate what providers collect.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use capture_store::{OnConflictStrategy, StoreContext, Table, Tuple};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::PreferenceError;

#[async_trait]
pub trait Preferences: Send + Sync {
    /// Stored value for `key`, or `default` when nothing was stored.
    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, PreferenceError>;

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError>;

    /// Forget every stored value.
    async fn clear(&self) -> Result<(), PreferenceError>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: RwLock<HashMap<String, bool>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Preferences for MemoryPreferences {
    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, PreferenceError> {
        Ok(self.values.read().get(key).copied().unwrap_or(default))
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PreferenceError> {
        self.values.write().clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferenceRow {
    key: String,
    value: String,
}

impl Tuple for PreferenceRow {
    type Key = String;

    fn key(&self) -> String {
        self.key.clone()
    }
}

/// Preferences persisted in the data database, one table per owner.
///
/// Values are stored as their text form; a stored value that is not
/// `"true"` reads as `false`.
#[derive(Debug)]
pub struct TablePreferences {
    table: Arc<Table<PreferenceRow>>,
}

impl TablePreferences {
    /// Preferences for `owner`, kept in table `Preferences_<owner>`.
    pub fn new(context: &StoreContext, owner: &str) -> Result<Self, PreferenceError> {
        Ok(Self {
            table: context.database.table(&format!("Preferences_{owner}"))?,
        })
    }
}

#[async_trait]
impl Preferences for TablePreferences {
    async fn get_bool(&self, key: &str, default: bool) -> Result<bool, PreferenceError> {
        Ok(match self.table.get(&key.to_string()).await? {
            Some(row) if !row.value.is_empty() => row.value == "true",
            _ => default,
        })
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<(), PreferenceError> {
        self.table
            .insert(
                vec![PreferenceRow {
                    key: key.to_string(),
                    value: value.to_string(),
                }],
                OnConflictStrategy::Replace,
            )
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), PreferenceError> {
        Ok(self.table.clear().await?)
    }
}
