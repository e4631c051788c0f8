//! Persistence bridge between a session and its storage backend.
//!
//! Only a subset of the session survives a reload: tool, color, the latest
//! result, variable bindings, overlay state and the visible raster. Undo
//! history is never persisted.

use crate::recognition::GeneratedResult;
use crate::storage::{Storage, StorageError, StorageResult};
use crate::tools::{DEFAULT_COLOR, ToolKind};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Name of the single record holding the persisted state.
pub const DEFAULT_STORAGE_KEY: &str = "calcillus-storage";

/// Default overlay position before any recognition ran.
pub const DEFAULT_OVERLAY_POSITION: Point = Point::new(10.0, 200.0);

/// The persisted subset of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    pub color: String,
    pub tool: ToolKind,
    pub result: Option<GeneratedResult>,
    pub dict_of_vars: BTreeMap<String, String>,
    pub latex_position: Point,
    pub latex_expression: Vec<String>,
    /// PNG data URI of the visible canvas.
    pub canvas_data: Option<String>,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_string(),
            tool: ToolKind::default(),
            result: None,
            dict_of_vars: BTreeMap::new(),
            latex_position: DEFAULT_OVERLAY_POSITION,
            latex_expression: Vec::new(),
            canvas_data: None,
        }
    }
}

/// On-disk envelope: `{ "state": {...}, "version": 0 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    pub state: PersistedState,
    #[serde(default)]
    pub version: u32,
}

impl PersistedRecord {
    pub const VERSION: u32 = 0;

    pub fn new(state: PersistedState) -> Self {
        Self {
            state,
            version: Self::VERSION,
        }
    }
}

/// Writes persisted state to storage on commit, optionally debounced.
pub struct PersistenceBridge {
    storage: Arc<dyn Storage>,
    key: String,
    /// Minimum time between writes. `None` writes on every save.
    interval: Option<Duration>,
    last_save: Option<Instant>,
    /// Latest state not yet written because of the interval.
    pending: Option<PersistedState>,
}

impl PersistenceBridge {
    /// Create a bridge writing under `key`.
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
            interval: None,
            last_save: None,
            pending: None,
        }
    }

    /// Set the debounce interval.
    pub fn set_interval(&mut self, interval: Option<Duration>) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a state is waiting for the interval to elapse.
    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    fn interval_elapsed(&self) -> bool {
        match (self.interval, self.last_save) {
            (Some(interval), Some(last)) => last.elapsed() >= interval,
            _ => true,
        }
    }

    /// Save `state`, or hold it until the debounce interval has elapsed.
    /// Returns true if the state was written.
    pub fn save(&mut self, state: PersistedState) -> StorageResult<bool> {
        self.pending = Some(state);
        self.maybe_flush()
    }

    /// Write the held state if the interval has elapsed.
    pub fn maybe_flush(&mut self) -> StorageResult<bool> {
        if self.pending.is_none() || !self.interval_elapsed() {
            return Ok(false);
        }
        self.flush()
    }

    /// Write the held state immediately.
    pub fn flush(&mut self) -> StorageResult<bool> {
        let Some(state) = self.pending.take() else {
            return Ok(false);
        };
        let json = serde_json::to_string(&PersistedRecord::new(state))
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.write(&self.key, &json)?;
        self.last_save = Some(Instant::now());
        log::debug!("Persisted session state under {:?}", self.key);
        Ok(true)
    }

    /// Read the persisted state. A missing record is `Ok(None)`.
    pub fn load(&self) -> StorageResult<Option<PersistedState>> {
        let json = match self.storage.read(&self.key) {
            Ok(json) => json,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let record: PersistedRecord = serde_json::from_str(&json)
            .map_err(|e| StorageError::Serialization(format!("{}: {}", self.key, e)))?;
        Ok(Some(record.state))
    }

    /// Delete the persisted record and drop any held state.
    pub fn clear(&mut self) -> StorageResult<()> {
        self.pending = None;
        self.storage.remove(&self.key)
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }
}

/// Create a platform-appropriate storage backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<Arc<dyn Storage>> {
    Ok(Arc::new(crate::storage::FileStorage::default_location()?))
}

#[cfg(target_arch = "wasm32")]
pub fn create_default_storage() -> StorageResult<Arc<dyn Storage>> {
    Ok(Arc::new(crate::storage::LocalStorage::new()))
}
