//! The whiteboard session: one explicit owner for every piece of canvas state.
//!
//! A [`Session`] holds the bound drawing surface, the interaction controller,
//! the undo history, variable bindings, result overlays and the persistence
//! bridge. Hosts feed it pointer events and drive its asynchronous parts
//! (image loads and recognition calls) themselves, handing the outcome back.
//!
//! Asynchronous outcomes carry the surface epoch they were requested in. The
//! epoch advances whenever the surface contents are replaced wholesale, and
//! outcomes from an older epoch are dropped.

use crate::config::SessionConfig;
use crate::history::HistoryStack;
use crate::input::PointerEvent;
use crate::loader::{ImageLoader, ImagePurpose, ImageSource, LoadError, PendingImage};
use crate::recognition::{
    ContentBounds, GeneratedResult, OverlayBoard, RecognitionRequest, RecognitionResult,
    RecognizedExpression, Recognizer, apply_assignments,
};
use crate::storage::{PersistedState, PersistenceBridge, Storage};
use crate::surface::{DrawingSurface, RasterImage, Snapshot, to_png_data_uri};
use crate::tools::{InteractionController, NoPrompt, Prompt, Release, ToolKind};
use kurbo::Point;
use std::collections::BTreeMap;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

/// A recognition request waiting for its response.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionTicket {
    pub request: RecognitionRequest,
    epoch: u64,
}

impl RecognitionTicket {
    /// Surface epoch the request was made in.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Borrow the bound surface with a lifetime the controller accepts.
fn bound(surface: &mut Option<Box<dyn DrawingSurface>>) -> Option<&mut dyn DrawingSurface> {
    match surface {
        Some(surface) => {
            let surface: &mut dyn DrawingSurface = surface.as_mut();
            Some(surface)
        }
        None => None,
    }
}

/// Canvas, history, bindings and overlays of one whiteboard.
pub struct Session {
    config: SessionConfig,
    surface: Option<Box<dyn DrawingSurface>>,
    controller: InteractionController,
    history: HistoryStack,
    bindings: BTreeMap<String, String>,
    overlays: OverlayBoard,
    persistence: PersistenceBridge,
    prompt: Box<dyn Prompt>,
    /// PNG data URI of the last persisted raster.
    canvas_data: Option<String>,
    epoch: u64,
}

impl Session {
    /// Create a session and restore whatever `storage` holds for it.
    ///
    /// No surface is bound yet; every drawing operation is a no-op until
    /// [`bind_surface`](Self::bind_surface) is called.
    pub fn new(config: SessionConfig, storage: Arc<dyn Storage>) -> Self {
        let mut persistence = PersistenceBridge::new(storage, config.storage_key.clone());
        persistence.set_interval(config.save_interval());

        let mut controller = InteractionController::new();
        controller.set_color(config.default_color.clone());
        controller.set_brush_size(config.brush_size);
        controller.set_font_size(config.font_size);

        let mut session = Self {
            history: HistoryStack::with_capacity_limit(config.max_history),
            overlays: OverlayBoard::new(config.overlay_origin, config.result_delay()),
            config,
            surface: None,
            controller,
            bindings: BTreeMap::new(),
            persistence,
            prompt: Box::new(NoPrompt),
            canvas_data: None,
            epoch: 0,
        };

        match session.persistence.load() {
            Ok(Some(state)) => {
                log::info!("Restored session state from {:?}", session.persistence.key());
                session.restore_state(state);
            }
            Ok(None) => log::debug!("No persisted state, starting fresh"),
            Err(e) => log::warn!("Could not load persisted state: {}", e),
        }
        session
    }

    /// Use `prompt` to answer text and image requests.
    pub fn with_prompt(mut self, prompt: impl Prompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    pub fn set_prompt(&mut self, prompt: Box<dyn Prompt>) {
        self.prompt = prompt;
    }

    fn restore_state(&mut self, state: PersistedState) {
        self.controller.set_tool(state.tool);
        self.controller.set_color(state.color);
        self.bindings = state.dict_of_vars;
        self.overlays.restore(state.result, state.latex_expression, state.latex_position);
        self.canvas_data = state.canvas_data;
    }

    // --- Surface lifecycle ---

    /// Bind a drawing surface, replacing any previous one.
    ///
    /// History belongs to the previous surface and is dropped.
    pub fn bind_surface(
        &mut self,
        surface: Box<dyn DrawingSurface>,
    ) -> Option<Box<dyn DrawingSurface>> {
        self.advance_epoch();
        self.history.reset();
        self.controller.pointer_leave();
        self.surface.replace(surface)
    }

    /// Unbind the surface. Pending loads and requests become stale.
    pub fn unbind_surface(&mut self) -> Option<Box<dyn DrawingSurface>> {
        self.advance_epoch();
        self.history.reset();
        self.controller.pointer_leave();
        self.surface.take()
    }

    pub fn surface(&self) -> Option<&dyn DrawingSurface> {
        self.surface.as_deref()
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Size the surface to the viewport below `top_offset`, then request the
    /// persisted raster, if any, to be drawn at the origin.
    ///
    /// Resizing discards the pixels, so snapshots of the old size are dropped
    /// from history. Resizing later does not request the raster again.
    pub fn initialize(
        &mut self,
        viewport_width: u32,
        viewport_height: u32,
        top_offset: u32,
    ) -> Option<PendingImage> {
        let surface = self.surface.as_mut()?;
        let height = viewport_height.saturating_sub(top_offset);
        if let Err(e) = surface.resize(viewport_width, height) {
            log::warn!("Could not size surface: {}", e);
            return None;
        }
        if !self.history.is_empty() {
            log::debug!("Dropping {} snapshot(s) of the old size", self.history.len());
            self.history.reset();
        }
        log::info!("Surface initialized at {}x{}", viewport_width, height);

        self.canvas_data.clone().map(|source| PendingImage {
            source,
            at: Point::ZERO,
            purpose: ImagePurpose::Restore,
            epoch: self.epoch,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    fn advance_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }

    // --- Pointer input ---

    /// Route one pointer event. Non-primary button presses and releases are
    /// ignored.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<PendingImage> {
        if !event.is_primary() {
            log::debug!("Ignoring non-primary {:?}", event);
            return None;
        }
        match event {
            PointerEvent::Down { x, y, .. } => {
                self.pointer_down(Point::new(x, y));
                None
            }
            PointerEvent::Move { x, y } => {
                self.pointer_move(Point::new(x, y));
                None
            }
            PointerEvent::Up { x, y, .. } => self.pointer_up(Point::new(x, y)),
            PointerEvent::Leave => {
                self.pointer_leave();
                None
            }
        }
    }

    pub fn pointer_down(&mut self, at: Point) {
        if self.surface.is_none() {
            return;
        }
        self.ensure_baseline();
        self.controller.pointer_down(bound(&mut self.surface), at);
    }

    pub fn pointer_move(&mut self, at: Point) {
        self.controller.pointer_move(bound(&mut self.surface), at);
    }

    pub fn pointer_leave(&mut self) {
        self.controller.pointer_leave();
    }

    /// Finish the interaction at `at`.
    ///
    /// Returns a pending image when the image tool needs a load; the image is
    /// recorded once [`finish_image`](Self::finish_image) draws it.
    pub fn pointer_up(&mut self, at: Point) -> Option<PendingImage> {
        let release = self
            .controller
            .pointer_up(bound(&mut self.surface), at, self.prompt.as_mut())?;
        match release {
            Release::Commit => {
                self.commit();
                None
            }
            Release::LoadImage { source, at } => Some(PendingImage {
                source,
                at,
                purpose: ImagePurpose::Place,
                epoch: self.epoch,
            }),
            Release::Skip => None,
        }
    }

    /// Record what is on the surface before the first change, so the first
    /// committed interaction can be undone.
    fn ensure_baseline(&mut self) {
        if !self.history.is_empty() {
            return;
        }
        if let Some(surface) = self.surface.as_ref() {
            self.history.record(surface.snapshot());
            log::debug!("Recorded baseline snapshot");
        }
    }

    /// Record the current surface and persist it.
    fn commit(&mut self) {
        let Some(surface) = self.surface.as_ref() else {
            return;
        };
        self.history.record(surface.snapshot());
        log::debug!(
            "Committed snapshot {} of {}",
            self.history.current_step(),
            self.history.len()
        );
        self.persist_canvas();
    }

    // --- History ---

    /// Step back one snapshot. Returns false when nothing changed.
    ///
    /// The cursor only moves once the snapshot is on the surface.
    pub fn undo(&mut self) -> bool {
        let target = self.history.peek_undo().cloned();
        if !self.show_snapshot(target) {
            return false;
        }
        self.history.undo();
        self.persist_canvas();
        true
    }

    /// Step forward one snapshot. Returns false when nothing changed.
    pub fn redo(&mut self) -> bool {
        let target = self.history.peek_redo().cloned();
        if !self.show_snapshot(target) {
            return false;
        }
        self.history.redo();
        self.persist_canvas();
        true
    }

    fn show_snapshot(&mut self, snapshot: Option<Snapshot>) -> bool {
        let (Some(surface), Some(snapshot)) = (self.surface.as_mut(), snapshot) else {
            return false;
        };
        match surface.restore(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not restore snapshot: {}", e);
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.surface.is_some() && self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.surface.is_some() && self.history.can_redo()
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn current_step(&self) -> isize {
        self.history.current_step()
    }

    // --- Resets ---

    /// Clear the surface, record the blank canvas and persist it.
    pub fn reset_canvas(&mut self) {
        if self.surface.is_none() {
            return;
        }
        self.ensure_baseline();
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
        self.advance_epoch();
        self.commit();
    }

    /// Forget history, bindings, overlays and the persisted raster.
    ///
    /// The surface itself is left alone and the overlay position is kept.
    pub fn reset_state(&mut self) {
        self.controller.pointer_leave();
        self.history.reset();
        self.bindings.clear();
        self.overlays.reset();
        self.canvas_data = None;
        self.advance_epoch();
        log::info!("Session state reset");
        self.save();
    }

    /// Reset state and wipe the surface without recording it.
    pub fn reset(&mut self) {
        self.reset_state();
        if let Some(surface) = self.surface.as_mut() {
            surface.clear();
        }
    }

    // --- Settings ---

    pub fn tool(&self) -> ToolKind {
        self.controller.tool()
    }

    pub fn set_tool(&mut self, tool: ToolKind) {
        self.controller.set_tool(tool);
        self.save();
    }

    pub fn color(&self) -> &str {
        self.controller.color()
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.controller.set_color(color);
        self.save();
    }

    pub fn brush_size(&self) -> f64 {
        self.controller.brush_size()
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.controller.set_brush_size(size);
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.controller.set_font_size(size);
    }

    /// Move every overlay, e.g. after the user dragged one.
    pub fn set_overlay_position(&mut self, position: Point) {
        self.overlays.set_position(position);
        self.save();
    }

    pub fn controller(&self) -> &InteractionController {
        &self.controller
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // --- Images ---

    /// Draw a loaded image for `pending`.
    ///
    /// Placed images are recorded and persisted; restored rasters are only
    /// drawn. Stale or failed loads change nothing.
    pub fn finish_image(
        &mut self,
        pending: PendingImage,
        result: Result<RasterImage, LoadError>,
    ) -> bool {
        if pending.epoch != self.epoch {
            log::debug!("Dropping stale image load for {:?}", pending.purpose);
            return false;
        }
        let image = match result {
            Ok(image) => image,
            Err(e) => {
                match pending.purpose {
                    ImagePurpose::Place => log::warn!("Failed to load image: {}", e),
                    ImagePurpose::Restore => log::warn!("Nothing restored: {}", e),
                }
                return false;
            }
        };
        let Some(surface) = self.surface.as_mut() else {
            return false;
        };

        surface.draw_image(&image, pending.at);
        if pending.purpose == ImagePurpose::Place {
            self.commit();
        }
        true
    }

    /// Load `pending` with `loader` and draw it.
    pub async fn load_image(&mut self, loader: &dyn ImageLoader, pending: PendingImage) -> bool {
        let result = match ImageSource::parse(&pending.source) {
            Ok(source) => loader.load(&source).await,
            Err(e) => Err(e),
        };
        self.finish_image(pending, result)
    }

    // --- Recognition ---

    /// Encode the canvas and the current bindings into a request.
    pub fn prepare_recognition(&self) -> Option<RecognitionTicket> {
        let surface = self.surface.as_ref()?;
        let png = match surface.encode_png() {
            Ok(png) => png,
            Err(e) => {
                log::error!("Could not encode canvas for recognition: {}", e);
                return None;
            }
        };
        Some(RecognitionTicket {
            request: RecognitionRequest {
                image: to_png_data_uri(&png),
                dict_of_vars: self.bindings.clone(),
            },
            epoch: self.epoch,
        })
    }

    /// Apply a recognizer outcome: fold assignments into the bindings, move
    /// the overlays to the centre of the drawn content and stage each result.
    ///
    /// Failures are logged and change nothing.
    pub fn apply_recognition(
        &mut self,
        ticket: RecognitionTicket,
        outcome: RecognitionResult<Vec<RecognizedExpression>>,
        now: Instant,
    ) -> bool {
        if ticket.epoch != self.epoch {
            log::debug!("Dropping stale recognition result");
            return false;
        }
        let records = match outcome {
            Ok(records) => records,
            Err(e) => {
                log::error!("Error in calculation: {}", e);
                return false;
            }
        };
        let Some(surface) = self.surface.as_ref() else {
            return false;
        };

        let assigned = apply_assignments(&mut self.bindings, &records);
        let bounds = ContentBounds::of(&surface.snapshot());
        self.overlays.set_position(bounds.center());
        self.overlays.stage(&records, now);
        log::info!(
            "Recognized {} expression(s), {} assignment(s)",
            records.len(),
            assigned
        );
        self.save();
        true
    }

    /// Show every staged result that is due.
    pub fn poll_overlays(&mut self, now: Instant) -> Vec<GeneratedResult> {
        let shown = self.overlays.promote_due(now);
        if shown.is_empty() {
            return shown;
        }
        if self.config.clear_on_result {
            if let Some(surface) = self.surface.as_mut() {
                surface.clear();
            }
        }
        self.save();
        shown
    }

    /// When the next staged result becomes due.
    pub fn next_overlay_due(&self) -> Option<Instant> {
        self.overlays.next_due()
    }

    /// Prepare, send and apply one recognition request.
    pub async fn run_calculation(&mut self, recognizer: &dyn Recognizer) -> bool {
        let Some(ticket) = self.prepare_recognition() else {
            return false;
        };
        let outcome = recognizer.recognize(&ticket.request).await;
        self.apply_recognition(ticket, outcome, Instant::now())
    }

    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    pub fn overlays(&self) -> &OverlayBoard {
        &self.overlays
    }

    pub fn result(&self) -> Option<&GeneratedResult> {
        self.overlays.result()
    }

    // --- Persistence ---

    pub fn canvas_data(&self) -> Option<&str> {
        self.canvas_data.as_deref()
    }

    /// The subset of the session that survives a reload.
    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            color: self.controller.color().to_string(),
            tool: self.controller.tool(),
            result: self.overlays.result().cloned(),
            dict_of_vars: self.bindings.clone(),
            latex_position: self.overlays.position(),
            latex_expression: self.overlays.expressions().to_vec(),
            canvas_data: self.canvas_data.clone(),
        }
    }

    fn persist_canvas(&mut self) {
        if let Some(surface) = self.surface.as_ref() {
            match surface.encode_png() {
                Ok(png) => self.canvas_data = Some(to_png_data_uri(&png)),
                Err(e) => log::warn!("Could not encode canvas: {}", e),
            }
        }
        self.save();
    }

    fn save(&mut self) {
        if let Err(e) = self.persistence.save(self.persisted_state()) {
            log::warn!("Could not persist session state: {}", e);
        }
    }

    /// Write any state held back by the save interval.
    pub fn flush(&mut self) {
        if let Err(e) = self.persistence.flush() {
            log::warn!("Could not persist session state: {}", e);
        }
    }
}
