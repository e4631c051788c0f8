//! Replay scripts: a JSON list of steps plus canned prompt answers.
//!
//! ```json
//! {
//!   "answers": ["x = 5"],
//!   "steps": [
//!     { "op": "tool", "tool": "text" },
//!     { "op": "pointer", "event": { "type": "down", "x": 40, "y": 80 } },
//!     { "op": "pointer", "event": { "type": "up", "x": 40, "y": 80 } },
//!     { "op": "calculate" },
//!     { "op": "wait", "ms": 1000 }
//!   ]
//! }
//! ```

use crate::error::AppError;
use inkcalc_core::{MouseButton, PointerEvent, ToolKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Pointer { event: PointerEvent },
    /// Shorthand for down, one move per point, up.
    Stroke { points: Vec<[f64; 2]> },
    Tool { tool: ToolKind },
    Color { color: String },
    BrushSize { size: f64 },
    OverlayPosition { x: f64, y: f64 },
    Undo,
    Redo,
    ResetCanvas,
    Reset,
    Calculate,
    /// Sleep, then show any results that became due.
    Wait { ms: u64 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    /// Answers handed out, in order, to text and image prompts.
    #[serde(default)]
    pub answers: Vec<String>,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_json_str(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let json = std::fs::read_to_string(path).map_err(|source| AppError::ScriptRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

/// Pointer events for a stroke: down at the first point, a move to each
/// following point, up at the last one.
pub fn stroke_events(points: &[[f64; 2]]) -> Vec<PointerEvent> {
    let Some((first, rest)) = points.split_first() else {
        return Vec::new();
    };
    let last = rest.last().unwrap_or(first);

    let mut events = Vec::with_capacity(points.len() + 1);
    events.push(PointerEvent::Down {
        x: first[0],
        y: first[1],
        button: MouseButton::Left,
    });
    events.extend(rest.iter().map(|p| PointerEvent::Move { x: p[0], y: p[1] }));
    events.push(PointerEvent::Up {
        x: last[0],
        y: last[1],
        button: MouseButton::Left,
    });
    events
}
