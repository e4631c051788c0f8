//! In-memory storage implementation.

use super::{Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut records = self.records.write().map_err(lock_error)?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn read(&self, key: &str) -> StorageResult<String> {
        let records = self.records.read().map_err(lock_error)?;
        records
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut records = self.records.write().map_err(lock_error)?;
        records.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(records.contains_key(key))
    }
}
