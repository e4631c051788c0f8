//! Headless application: a session on a raster surface, driven by scripts.

use crate::error::AppError;
use crate::script::{Script, Step, stroke_events};
use inkcalc_core::storage::{FileStorage, Storage, create_default_storage};
use inkcalc_core::{
    HttpRecognizer, ImageLoader, PendingImage, PointerEvent, QueuedPrompt, Recognizer, Session,
    SessionConfig,
};
use inkcalc_render::{DecodingImageLoader, RasterSurface};
use kurbo::Point;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Startup settings for [`App`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub session: SessionConfig,
    /// Viewport size the surface is fitted to.
    pub width: u32,
    pub height: u32,
    /// Space taken above the surface.
    pub top_offset: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            width: 1280,
            height: 800,
            top_offset: 0,
        }
    }
}

/// Owns the session and the collaborators it needs for async work.
pub struct App {
    session: Session,
    recognizer: Box<dyn Recognizer>,
    loader: Box<dyn ImageLoader>,
    viewport: (u32, u32, u32),
}

impl App {
    /// Create an app with file storage, the HTTP recognizer and the decoding
    /// image loader.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let storage: Arc<dyn Storage> = match &config.session.storage_dir {
            Some(dir) => Arc::new(FileStorage::new(dir.clone())?),
            None => create_default_storage()?,
        };
        let recognizer = HttpRecognizer::new(
            config.session.recognizer_url.clone(),
            config.session.request_timeout(),
        )?;
        Self::with_parts(
            config,
            storage,
            Box::new(recognizer),
            Box::new(DecodingImageLoader::new()),
        )
    }

    pub fn with_parts(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        recognizer: Box<dyn Recognizer>,
        loader: Box<dyn ImageLoader>,
    ) -> Result<Self, AppError> {
        let mut session = Session::new(config.session, storage);
        session.bind_surface(Box::new(RasterSurface::new(1, 1)?));
        Ok(Self {
            session,
            recognizer,
            loader,
            viewport: (config.width, config.height, config.top_offset),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fit the surface to the viewport and redraw the persisted raster.
    pub async fn start(&mut self) {
        let (width, height, top_offset) = self.viewport;
        if let Some(pending) = self.session.initialize(width, height, top_offset) {
            self.load(pending).await;
        }
    }

    async fn load(&mut self, pending: PendingImage) {
        let source = pending.source.chars().take(48).collect::<String>();
        if !self.session.load_image(self.loader.as_ref(), pending).await {
            log::debug!("Image {} was not drawn", source);
        }
    }

    async fn pointer(&mut self, event: PointerEvent) {
        if let Some(pending) = self.session.handle_pointer(event) {
            self.load(pending).await;
        }
    }

    /// Run every step of `script`, answering prompts from its answers.
    pub async fn run_script(&mut self, script: &Script) {
        self.session
            .set_prompt(Box::new(QueuedPrompt::new(script.answers.iter().cloned())));
        log::info!("Replaying {} step(s)", script.steps.len());
        for step in &script.steps {
            self.run_step(step).await;
        }
    }

    pub async fn run_step(&mut self, step: &Step) {
        log::debug!("Step {:?}", step);
        match step {
            Step::Pointer { event } => self.pointer(*event).await,
            Step::Stroke { points } => {
                for event in stroke_events(points) {
                    self.pointer(event).await;
                }
            }
            Step::Tool { tool } => self.session.set_tool(*tool),
            Step::Color { color } => self.session.set_color(color.clone()),
            Step::BrushSize { size } => self.session.set_brush_size(*size),
            Step::OverlayPosition { x, y } => self.session.set_overlay_position(Point::new(*x, *y)),
            Step::Undo => {
                self.session.undo();
            }
            Step::Redo => {
                self.session.redo();
            }
            Step::ResetCanvas => self.session.reset_canvas(),
            Step::Reset => self.session.reset(),
            Step::Calculate => {
                self.calculate().await;
            }
            Step::Wait { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                self.show_due(Instant::now());
            }
        }
    }

    /// Send the canvas to the recognizer and wait until every result is shown.
    pub async fn calculate(&mut self) -> bool {
        if !self.session.run_calculation(self.recognizer.as_ref()).await {
            return false;
        }
        while let Some(due) = self.session.next_overlay_due() {
            tokio::time::sleep_until(tokio::time::Instant::from_std(due)).await;
            self.show_due(Instant::now());
        }
        true
    }

    fn show_due(&mut self, now: Instant) {
        for result in self.session.poll_overlays(now) {
            log::info!("Result: {} = {}", result.expression, result.answer);
        }
    }

    /// Write pending state to storage.
    pub fn finish(&mut self) {
        self.session.flush();
    }

    /// Write the current surface as a PNG file.
    pub fn write_png(&self, path: &Path) -> Result<(), AppError> {
        let surface = self.session.surface().ok_or(AppError::NoSurface)?;
        let png = surface.encode_png()?;
        std::fs::write(path, png).map_err(|source| AppError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Wrote {}", path.display());
        Ok(())
    }

    /// Human-readable summary of the session.
    pub fn summary(&self) -> String {
        let session = &self.session;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "tool: {:?}, color: {}, step: {} of {}",
            session.tool(),
            session.color(),
            session.current_step(),
            session.history().len()
        );
        for (name, value) in session.bindings() {
            let _ = writeln!(out, "{} := {}", name, value);
        }
        let position = session.overlays().position();
        for latex in session.overlays().expressions() {
            let _ = writeln!(out, "{} @ ({}, {})", latex, position.x, position.y);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkcalc_core::recognition::{RecognitionRequest, RecognitionResult, RecognizedExpression};
    use inkcalc_core::{BoxFuture, MemoryStorage, Snapshot, ToolKind};
    use std::cell::RefCell;

    /// Always answers with the same records and keeps the requests.
    struct FixedRecognizer {
        records: Vec<RecognizedExpression>,
        requests: RefCell<Vec<RecognitionRequest>>,
    }

    impl Recognizer for FixedRecognizer {
        fn recognize<'a>(
            &'a self,
            request: &'a RecognitionRequest,
        ) -> BoxFuture<'a, RecognitionResult<Vec<RecognizedExpression>>> {
            self.requests.borrow_mut().push(request.clone());
            let records = self.records.clone();
            Box::pin(async move { Ok(records) })
        }
    }

    fn app_with(storage: Arc<dyn Storage>, records: Vec<RecognizedExpression>) -> App {
        let config = AppConfig {
            session: SessionConfig {
                result_delay_ms: 5,
                ..SessionConfig::default()
            },
            width: 80,
            height: 60,
            top_offset: 10,
        };
        let recognizer = FixedRecognizer {
            records,
            requests: RefCell::new(Vec::new()),
        };
        App::with_parts(
            config,
            storage,
            Box::new(recognizer),
            Box::new(DecodingImageLoader::new()),
        )
        .unwrap()
    }

    fn line_script() -> Script {
        Script::from_json_str(
            r#"{"steps": [
                {"op": "stroke", "points": [[10, 10], [60, 10]]},
                {"op": "tool", "tool": "rectangle"},
                {"op": "stroke", "points": [[20, 20], [40, 40]]}
            ]}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_replay_and_undo() {
        let mut app = app_with(Arc::new(MemoryStorage::new()), Vec::new());
        app.start().await;
        app.run_script(&line_script()).await;

        let session = app.session();
        assert_eq!(session.tool(), ToolKind::Rectangle);
        assert_eq!(session.history().len(), 3);
        let drawn = session.surface().unwrap().snapshot();
        assert_eq!(drawn.alpha_at(30, 20), 255);

        app.run_step(&Step::Undo).await;
        let undone = app.session().surface().unwrap().snapshot();
        assert_eq!(undone.alpha_at(30, 20), 0);
        assert_eq!(undone.alpha_at(30, 10), 255);
    }

    #[tokio::test]
    async fn test_calculate_shows_results() {
        let records = vec![RecognizedExpression {
            expr: "x".to_string(),
            result: "5".to_string(),
            assign: true,
        }];
        let mut app = app_with(Arc::new(MemoryStorage::new()), records);
        app.start().await;
        app.run_script(&line_script()).await;

        assert!(app.calculate().await);
        let session = app.session();
        assert_eq!(session.bindings().get("x").map(String::as_str), Some("5"));
        assert_eq!(session.overlays().expressions(), &[r"\(\LARGE{x = 5}\)".to_string()]);
        assert_eq!(
            session.surface().unwrap().snapshot(),
            Snapshot::blank(80, 50)
        );
        assert!(app.summary().contains("x := 5"));
    }

    #[tokio::test]
    async fn test_restart_restores_raster() {
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn Storage> =
            Arc::new(FileStorage::new(dir.path().to_path_buf()).unwrap());

        let mut first = app_with(storage.clone(), Vec::new());
        first.start().await;
        first.run_script(&line_script()).await;
        first.finish();

        let mut second = app_with(storage, Vec::new());
        second.start().await;
        let restored = second.session().surface().unwrap().snapshot();
        assert_eq!(restored.alpha_at(30, 10), 255);
        assert_eq!(second.session().tool(), ToolKind::Rectangle);
    }

    #[tokio::test]
    async fn test_new_uses_configured_storage_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            session: SessionConfig {
                storage_dir: Some(dir.path().to_path_buf()),
                ..SessionConfig::default()
            },
            width: 40,
            height: 30,
            top_offset: 0,
        };
        let mut app = App::new(config).unwrap();
        app.start().await;
        app.run_script(&line_script()).await;
        app.finish();

        assert!(dir.path().join("calcillus-storage.json").exists());
    }

    #[tokio::test]
    async fn test_write_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.png");
        let mut app = app_with(Arc::new(MemoryStorage::new()), Vec::new());
        app.start().await;

        app.write_png(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
