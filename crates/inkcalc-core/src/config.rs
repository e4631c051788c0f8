//! Session configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! changes. A few fields can also be overridden from the environment.

use crate::recognition::{DEFAULT_RECOGNIZER_URL, DEFAULT_RESULT_DELAY};
use crate::storage::{DEFAULT_OVERLAY_POSITION, DEFAULT_STORAGE_KEY};
use crate::surface::parse_css_color;
use crate::tools::{DEFAULT_BRUSH_SIZE, DEFAULT_COLOR, DEFAULT_FONT_SIZE};
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Overrides `recognizer_url`.
pub const ENV_RECOGNIZER_URL: &str = "INKCALC_RECOGNIZER_URL";
/// Overrides `storage_dir`.
pub const ENV_STORAGE_DIR: &str = "INKCALC_STORAGE_DIR";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub recognizer_url: String,
    /// Request timeout. `None` leaves limits to the recognizer.
    pub request_timeout_ms: Option<u64>,
    pub storage_key: String,
    /// Directory for file storage. `None` uses the platform data directory.
    pub storage_dir: Option<PathBuf>,
    pub result_delay_ms: u64,
    pub default_color: String,
    pub brush_size: f64,
    pub font_size: f64,
    /// Overlay position before any recognition has run.
    pub overlay_origin: Point,
    /// Clear the canvas when a recognized result is shown.
    pub clear_on_result: bool,
    /// Oldest snapshots are dropped beyond this many.
    pub max_history: Option<usize>,
    /// Minimum time between storage writes.
    pub save_interval_ms: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recognizer_url: DEFAULT_RECOGNIZER_URL.to_string(),
            request_timeout_ms: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            storage_dir: None,
            result_delay_ms: DEFAULT_RESULT_DELAY.as_millis() as u64,
            default_color: DEFAULT_COLOR.to_string(),
            brush_size: DEFAULT_BRUSH_SIZE,
            font_size: DEFAULT_FONT_SIZE,
            overlay_origin: DEFAULT_OVERLAY_POSITION,
            clear_on_result: true,
            max_history: None,
            save_interval_ms: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Apply overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RECOGNIZER_URL).filter(|v| !v.is_empty()) {
            log::info!("Recognizer URL overridden to {}", url);
            self.recognizer_url = url;
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.is_empty()) {
            log::info!("Storage directory overridden to {}", dir);
            self.storage_dir = Some(PathBuf::from(dir));
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recognizer_url.trim().is_empty() {
            return Err(ConfigError::Invalid("recognizer_url is empty".to_string()));
        }
        if self.storage_key.is_empty() {
            return Err(ConfigError::Invalid("storage_key is empty".to_string()));
        }
        if !(self.brush_size.is_finite() && self.brush_size >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "brush_size must be a non-negative number, got {}",
                self.brush_size
            )));
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "font_size must be positive, got {}",
                self.font_size
            )));
        }
        if parse_css_color(&self.default_color).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default_color {:?} is not a color",
                self.default_color
            )));
        }
        if self.max_history == Some(0) {
            return Err(ConfigError::Invalid("max_history must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn result_delay(&self) -> Duration {
        Duration::from_millis(self.result_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn save_interval(&self) -> Option<Duration> {
        self.save_interval_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.recognizer_url, "https://calc-be.vercel.app/calculate");
        assert_eq!(config.storage_key, "calcillus-storage");
        assert_eq!(config.result_delay(), Duration::from_millis(1000));
        assert_eq!(config.default_color, "#ffffff");
        assert_eq!(config.overlay_origin, Point::new(10.0, 200.0));
        assert!(config.clear_on_result);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            SessionConfig::from_json_str(r#"{"brush_size": 8, "clear_on_result": false}"#).unwrap();
        assert_eq!(config.brush_size, 8.0);
        assert!(!config.clear_on_result);
        assert_eq!(config.font_size, DEFAULT_FONT_SIZE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"default_color": "not-a-color"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"max_history": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_RECOGNIZER_URL, "http://localhost:8900/calculate"),
            (ENV_STORAGE_DIR, "/tmp/inkcalc"),
        ]
        .into_iter()
        .collect();

        let mut config = SessionConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));
        assert_eq!(config.recognizer_url, "http://localhost:8900/calculate");
        assert_eq!(config.storage_dir, Some(PathBuf::from("/tmp/inkcalc")));
    }

    #[test]
    fn test_missing_file() {
        let err = SessionConfig::from_json_file("/nonexistent/inkcalc.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
