//! Command-line arguments.

use crate::app::AppConfig;
use crate::error::AppError;
use clap::Parser;
use inkcalc_core::SessionConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "inkcalc",
    version,
    about = "Replay whiteboard scripts and recognize handwritten math"
)]
pub struct Cli {
    /// JSON session config. Missing fields use defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory for persisted state. Overrides the config and INKCALC_STORAGE_DIR.
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,

    /// Viewport width in pixels.
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 800)]
    pub height: u32,

    /// Space above the canvas, subtracted from the viewport height.
    #[arg(long, default_value_t = 0)]
    pub top_offset: u32,

    /// Replay script to run after startup.
    #[arg(long, value_name = "PATH")]
    pub script: Option<PathBuf>,

    /// Send the final canvas to the recognizer.
    #[arg(long)]
    pub calculate: bool,

    /// Write the final canvas to this PNG file.
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Resolve the app configuration: file, then environment, then flags.
    pub fn app_config(&self) -> Result<AppConfig, AppError> {
        let mut session = match &self.config {
            Some(path) => SessionConfig::from_json_file(path)?,
            None => SessionConfig::default(),
        };
        session.apply_env();
        if let Some(dir) = &self.storage_dir {
            session.storage_dir = Some(dir.clone());
        }
        session.validate()?;

        Ok(AppConfig {
            session,
            width: self.width,
            height: self.height,
            top_offset: self.top_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["inkcalc"]).unwrap();
        assert_eq!((cli.width, cli.height, cli.top_offset), (1280, 800, 0));
        assert!(!cli.calculate);
        assert!(cli.script.is_none());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("inkcalc.json");
        let json = r#"{"brush_size": 9, "storage_dir": "/tmp/ignored"}"#;
        std::fs::write(&config_path, json).unwrap();

        let cli = Cli::try_parse_from([
            "inkcalc",
            "--config",
            config_path.to_str().unwrap(),
            "--storage-dir",
            "/tmp/inkcalc-state",
            "--width",
            "640",
            "--calculate",
        ])
        .unwrap();
        let config = cli.app_config().unwrap();

        assert_eq!(config.width, 640);
        assert_eq!(config.session.brush_size, 9.0);
        assert_eq!(config.session.storage_dir, Some(PathBuf::from("/tmp/inkcalc-state")));
        assert!(cli.calculate);
    }

    #[test]
    fn test_missing_config_file() {
        let cli =
            Cli::try_parse_from(["inkcalc", "--config", "/nonexistent/inkcalc.json"]).unwrap();
        assert!(matches!(cli.app_config(), Err(AppError::Config(_))));
    }
}
