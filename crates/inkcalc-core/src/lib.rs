//! InkCalc Core Library
//!
//! Platform-agnostic canvas state, undo history, persistence and math
//! recognition for the InkCalc whiteboard.

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod history;
pub mod input;
pub mod loader;
pub mod recognition;
pub mod session;
pub mod storage;
pub mod surface;
pub mod tools;

/// Boxed future returned by the async collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

pub use config::{ConfigError, SessionConfig};
pub use history::{EMPTY_STEP, HistoryStack};
pub use input::{MouseButton, PointerEvent};
pub use loader::{ImageLoader, ImagePurpose, ImageSource, LoadError, PendingImage};
pub use recognition::{
    ContentBounds, GeneratedResult, HttpRecognizer, OverlayBoard, RecognitionError,
    RecognitionRequest, RecognizedExpression, Recognizer,
};
pub use session::{RecognitionTicket, Session};
pub use storage::{MemoryStorage, PersistedState, PersistenceBridge, Storage, StorageError};
pub use surface::{
    CompositeMode, DrawingSurface, Pen, RasterImage, Snapshot, SurfaceError, SurfaceResult,
};
pub use tools::{InteractionController, NoPrompt, Prompt, QueuedPrompt, Release, ToolKind};
