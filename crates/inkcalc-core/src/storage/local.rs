//! Browser `localStorage` backend for WebAssembly.

use super::{Storage, StorageError, StorageResult};

/// Storage backed by `window.localStorage`.
///
/// The handle is looked up on every call so a page that blocks storage
/// degrades to [`StorageError::Unavailable`] instead of failing at startup.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }

    fn handle(&self) -> StorageResult<web_sys::Storage> {
        let window = web_sys::window()
            .ok_or_else(|| StorageError::Unavailable("No window object".to_string()))?;
        window
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("localStorage error: {:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage not available".to_string()))
    }
}

impl Storage for LocalStorage {
    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.handle()?
            .set_item(key, value)
            .map_err(|e| StorageError::Other(format!("Failed to write {}: {:?}", key, e)))
    }

    fn read(&self, key: &str) -> StorageResult<String> {
        self.handle()?
            .get_item(key)
            .map_err(|e| StorageError::Other(format!("Failed to read {}: {:?}", key, e)))?
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.handle()?
            .remove_item(key)
            .map_err(|e| StorageError::Other(format!("Failed to delete {}: {:?}", key, e)))
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let item = self
            .handle()?
            .get_item(key)
            .map_err(|e| StorageError::Other(format!("Failed to read {}: {:?}", key, e)))?;
        Ok(item.is_some())
    }
}
