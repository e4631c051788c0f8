//! Storage abstraction for persistence.
//!
//! Backends are plain string key-value stores, like the browser's
//! `localStorage`. What gets stored, and when, is decided by the
//! [`PersistenceBridge`].

mod autosave;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

#[cfg(target_arch = "wasm32")]
mod local;

pub use autosave::{
    DEFAULT_OVERLAY_POSITION, DEFAULT_STORAGE_KEY, PersistedRecord, PersistedState,
    PersistenceBridge, create_default_storage,
};
pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(target_arch = "wasm32")]
pub use local::LocalStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable string key-value store.
///
/// Calls are synchronous: the session persists from inside event handlers
/// and every supported backend answers immediately.
pub trait Storage {
    /// Store `value` under `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Read the value under `key`. Missing keys yield [`StorageError::NotFound`].
    fn read(&self, key: &str) -> StorageResult<String>;

    /// Remove `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if `key` holds a value.
    fn exists(&self, key: &str) -> StorageResult<bool>;
}
