//! InkCalc Application
//!
//! Headless host for an InkCalc session: replays pointer scripts on a raster
//! surface, runs recognition and exports the canvas.

mod app;
mod cli;
mod error;
mod script;

pub use app::{App, AppConfig};
pub use cli::Cli;
pub use error::AppError;
pub use script::{Script, Step, stroke_events};
