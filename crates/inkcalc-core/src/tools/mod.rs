//! Tool selection and pointer interaction handling.
//!
//! The [`InteractionController`] turns pointer events into drawing calls on a
//! [`DrawingSurface`]. It never records history itself; [`pointer_up`]
//! reports what the session should commit.
//!
//! [`pointer_up`]: InteractionController::pointer_up

use crate::surface::{CompositeMode, DrawingSurface, Pen, parse_css_color};
use kurbo::{BezPath, Circle, Point, Rect, Shape as _, Vec2};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default stroke width in pixels.
pub const DEFAULT_BRUSH_SIZE: f64 = 4.0;
/// Default stroke color.
pub const DEFAULT_COLOR: &str = "#ffffff";
/// Default text size in pixels.
pub const DEFAULT_FONT_SIZE: f64 = 16.0;
/// Arrowhead length in pixels.
pub const ARROW_HEAD_SIZE: f64 = 15.0;

const TEXT_PROMPT: &str = "Enter text:";
const IMAGE_PROMPT: &str = "Enter image URL:";
const PATH_TOLERANCE: f64 = 0.1;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Brush,
    Eraser,
    Line,
    Arrow,
    Rectangle,
    Circle,
    Text,
    Image,
}

impl ToolKind {
    /// Tools that paint continuously while the pointer moves.
    pub fn is_freehand(self) -> bool {
        matches!(self, ToolKind::Brush | ToolKind::Eraser)
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ToolState {
    #[default]
    Idle,
    /// Brush or eraser held down; `last` is the end of the path so far.
    Drawing { last: Point },
    /// Anchor captured, geometry is produced on release.
    PendingShape,
}

/// Source of values requested from the user mid-interaction.
pub trait Prompt {
    /// Ask for a value. `None` means the request was cancelled.
    fn ask(&mut self, message: &str) -> Option<String>;
}

/// A prompt that is always cancelled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl Prompt for NoPrompt {
    fn ask(&mut self, _message: &str) -> Option<String> {
        None
    }
}

/// A prompt answered from a queue of prepared values.
#[derive(Debug, Default, Clone)]
pub struct QueuedPrompt {
    answers: VecDeque<String>,
}

impl QueuedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
        }
    }
}

impl Prompt for QueuedPrompt {
    fn ask(&mut self, message: &str) -> Option<String> {
        let answer = self.answers.pop_front();
        log::debug!("Prompt {:?} answered with {:?}", message, answer);
        answer
    }
}

/// What the session should do once a release has been handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// The surface holds the finished result; record and persist it.
    Commit,
    /// An image must be loaded and drawn at `at` before anything is recorded.
    LoadImage { source: String, at: Point },
    /// Nothing to load and nothing to commit.
    Skip,
}

/// Routes pointer events to drawing operations for the active tool.
#[derive(Debug, Clone)]
pub struct InteractionController {
    tool: ToolKind,
    state: ToolState,
    /// Position of the last pointer-down. Kept after release.
    anchor: Point,
    color: String,
    brush_size: f64,
    font_size: f64,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self {
            tool: ToolKind::default(),
            state: ToolState::default(),
            anchor: Point::ZERO,
            color: DEFAULT_COLOR.to_string(),
            brush_size: DEFAULT_BRUSH_SIZE,
            font_size: DEFAULT_FONT_SIZE,
        }
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tool(&self) -> ToolKind {
        self.tool
    }

    /// Switch tools. Any interaction in progress is abandoned.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tool = tool;
        self.state = ToolState::Idle;
    }

    pub fn state(&self) -> ToolState {
        self.state
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, ToolState::Drawing { .. })
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn set_color(&mut self, color: impl Into<String>) {
        self.color = color.into();
    }

    pub fn brush_size(&self) -> f64 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f64) {
        self.brush_size = size.max(0.0);
    }

    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.font_size = size.max(1.0);
    }

    /// The pen built from the current color and brush size.
    pub fn pen(&self) -> Pen {
        Pen::new(self.resolved_color(), self.brush_size)
    }

    fn resolved_color(&self) -> Color {
        parse_css_color(&self.color).unwrap_or_else(|| {
            log::warn!("Unparseable color {:?}, using white", self.color);
            Color::WHITE
        })
    }

    /// Primary button pressed at `at`.
    pub fn pointer_down(&mut self, surface: Option<&mut dyn DrawingSurface>, at: Point) {
        if surface.is_none() {
            return;
        }
        self.anchor = at;
        self.state = if self.tool.is_freehand() {
            ToolState::Drawing { last: at }
        } else {
            ToolState::PendingShape
        };
        log::debug!("{:?} interaction started at {:?}", self.tool, at);
    }

    /// Pointer moved to `at`. Only paints while a brush or eraser is held.
    pub fn pointer_move(&mut self, surface: Option<&mut dyn DrawingSurface>, at: Point) {
        let Some(surface) = surface else {
            return;
        };
        let ToolState::Drawing { last } = self.state else {
            return;
        };

        let mode = match self.tool {
            ToolKind::Eraser => CompositeMode::DestinationOut,
            _ => CompositeMode::SourceOver,
        };
        let mut segment = BezPath::new();
        segment.move_to(last);
        segment.line_to(at);
        surface.stroke_path(&segment, &self.pen(), mode);

        self.state = ToolState::Drawing { last: at };
    }

    /// Pointer left the surface. Ends any stroke without committing it.
    pub fn pointer_leave(&mut self) {
        self.state = ToolState::Idle;
    }

    /// Primary button released at `at`.
    ///
    /// Renders the tool's final geometry and reports what to commit. Returns
    /// `None` when there is no surface.
    pub fn pointer_up(
        &mut self,
        surface: Option<&mut dyn DrawingSurface>,
        at: Point,
        prompt: &mut dyn Prompt,
    ) -> Option<Release> {
        let surface = surface?;
        self.state = ToolState::Idle;
        let anchor = self.anchor;

        let release = match self.tool {
            ToolKind::Brush | ToolKind::Eraser => Release::Commit,
            ToolKind::Line | ToolKind::Arrow | ToolKind::Rectangle | ToolKind::Circle => {
                if let Some(path) = shape_path(self.tool, anchor, at) {
                    surface.stroke_path(&path, &self.pen(), CompositeMode::SourceOver);
                }
                Release::Commit
            }
            ToolKind::Text => {
                if let Some(text) = prompt.ask(TEXT_PROMPT).filter(|t| !t.is_empty()) {
                    surface.fill_text(&text, at, self.resolved_color(), self.font_size);
                }
                Release::Commit
            }
            ToolKind::Image => match prompt.ask(IMAGE_PROMPT).filter(|s| !s.trim().is_empty()) {
                Some(source) => Release::LoadImage {
                    source: source.trim().to_string(),
                    at,
                },
                None => Release::Skip,
            },
        };

        log::debug!("{:?} released at {:?}: {:?}", self.tool, at, release);
        Some(release)
    }
}

/// Outline geometry for the shape tools, from the anchor to the release point.
pub fn shape_path(tool: ToolKind, anchor: Point, end: Point) -> Option<BezPath> {
    match tool {
        ToolKind::Line => {
            let mut path = BezPath::new();
            path.move_to(anchor);
            path.line_to(end);
            Some(path)
        }
        ToolKind::Arrow => Some(arrow_path(anchor, end, ARROW_HEAD_SIZE)),
        ToolKind::Rectangle => Some(Rect::from_points(anchor, end).to_path(PATH_TOLERANCE)),
        ToolKind::Circle => {
            let radius = anchor.distance(end);
            Some(Circle::new(anchor, radius).to_path(PATH_TOLERANCE))
        }
        ToolKind::Brush | ToolKind::Eraser | ToolKind::Text | ToolKind::Image => None,
    }
}

/// Shaft plus an open two-stroke head at `end`.
fn arrow_path(start: Point, end: Point, head_size: f64) -> BezPath {
    let delta = end - start;
    let len = delta.hypot();
    let dir = if len < f64::EPSILON {
        Vec2::new(1.0, 0.0)
    } else {
        delta / len
    };
    let perp = Vec2::new(-dir.y, dir.x);

    let head_back = end - dir * head_size;
    let head_left = head_back + perp * head_size * 0.5;
    let head_right = head_back - perp * head_size * 0.5;

    let mut path = BezPath::new();
    path.move_to(start);
    path.line_to(end);
    path.move_to(head_left);
    path.line_to(end);
    path.line_to(head_right);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{RasterImage, Snapshot, SurfaceResult};
    use kurbo::Shape as _;

    /// Records every call instead of drawing.
    #[derive(Default)]
    struct CallLog {
        strokes: Vec<(BezPath, Pen, CompositeMode)>,
        texts: Vec<(String, Point, f64)>,
    }

    impl DrawingSurface for CallLog {
        fn width(&self) -> u32 {
            100
        }
        fn height(&self) -> u32 {
            100
        }
        fn resize(&mut self, _width: u32, _height: u32) -> SurfaceResult<()> {
            Ok(())
        }
        fn stroke_path(&mut self, path: &BezPath, pen: &Pen, mode: CompositeMode) {
            self.strokes.push((path.clone(), *pen, mode));
        }
        fn fill_text(&mut self, text: &str, baseline: Point, _color: Color, size: f64) {
            self.texts.push((text.to_string(), baseline, size));
        }
        fn draw_image(&mut self, _image: &RasterImage, _top_left: Point) {}
        fn clear_rect(&mut self, _rect: Rect) {}
        fn snapshot(&self) -> Snapshot {
            Snapshot::blank(100, 100)
        }
        fn restore(&mut self, _snapshot: &Snapshot) -> SurfaceResult<()> {
            Ok(())
        }
        fn encode_png(&self) -> SurfaceResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_tool_selection() {
        let mut ctl = InteractionController::new();
        assert_eq!(ctl.tool(), ToolKind::Brush);

        ctl.set_tool(ToolKind::Rectangle);
        assert_eq!(ctl.tool(), ToolKind::Rectangle);
    }

    #[test]
    fn test_tool_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ToolKind::Circle).unwrap(), "\"circle\"");
        let tool: ToolKind = serde_json::from_str("\"eraser\"").unwrap();
        assert_eq!(tool, ToolKind::Eraser);
    }

    #[test]
    fn test_brush_strokes_segments() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();

        ctl.pointer_down(Some(&mut surface), p(0.0, 0.0));
        assert!(ctl.is_drawing());
        ctl.pointer_move(Some(&mut surface), p(10.0, 0.0));
        ctl.pointer_move(Some(&mut surface), p(10.0, 10.0));

        assert_eq!(surface.strokes.len(), 2);
        assert!(surface.strokes.iter().all(|(_, _, m)| *m == CompositeMode::SourceOver));
        assert_eq!(surface.strokes[0].1.width, DEFAULT_BRUSH_SIZE);

        let release = ctl.pointer_up(Some(&mut surface), p(10.0, 10.0), &mut NoPrompt);
        assert_eq!(release, Some(Release::Commit));
        assert!(!ctl.is_drawing());
    }

    #[test]
    fn test_eraser_mode_is_per_segment() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();

        ctl.set_tool(ToolKind::Eraser);
        ctl.pointer_down(Some(&mut surface), p(0.0, 0.0));
        ctl.pointer_move(Some(&mut surface), p(5.0, 5.0));
        ctl.pointer_up(Some(&mut surface), p(5.0, 5.0), &mut NoPrompt);

        ctl.set_tool(ToolKind::Brush);
        ctl.pointer_down(Some(&mut surface), p(0.0, 0.0));
        ctl.pointer_move(Some(&mut surface), p(5.0, 5.0));

        assert_eq!(surface.strokes[0].2, CompositeMode::DestinationOut);
        assert_eq!(surface.strokes[1].2, CompositeMode::SourceOver);
    }

    #[test]
    fn test_move_without_press_draws_nothing() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();

        ctl.pointer_move(Some(&mut surface), p(3.0, 3.0));
        ctl.pointer_down(Some(&mut surface), p(0.0, 0.0));
        ctl.pointer_leave();
        ctl.pointer_move(Some(&mut surface), p(3.0, 3.0));

        assert!(surface.strokes.is_empty());
    }

    #[test]
    fn test_shapes_draw_on_release_only() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();
        ctl.set_tool(ToolKind::Rectangle);

        ctl.pointer_down(Some(&mut surface), p(10.0, 10.0));
        ctl.pointer_move(Some(&mut surface), p(20.0, 20.0));
        assert!(surface.strokes.is_empty());

        let release = ctl.pointer_up(Some(&mut surface), p(30.0, 40.0), &mut NoPrompt);
        assert_eq!(release, Some(Release::Commit));
        assert_eq!(surface.strokes.len(), 1);

        let bbox = surface.strokes[0].0.bounding_box();
        assert_eq!(bbox, Rect::new(10.0, 10.0, 30.0, 40.0));
    }

    #[test]
    fn test_circle_radius_is_distance() {
        let path = shape_path(ToolKind::Circle, p(50.0, 50.0), p(53.0, 54.0)).unwrap();
        let bbox = path.bounding_box();
        assert!((bbox.width() - 10.0).abs() < 0.01);
        assert!((bbox.center().x - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_arrow_has_head_at_end() {
        let path = shape_path(ToolKind::Arrow, p(0.0, 0.0), p(100.0, 0.0)).unwrap();
        let bbox = path.bounding_box();
        assert_eq!(bbox.x1, 100.0);
        assert!((bbox.y0 + ARROW_HEAD_SIZE * 0.5).abs() < 1e-9);
        assert!((bbox.y1 - ARROW_HEAD_SIZE * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_text_uses_prompt() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();
        ctl.set_tool(ToolKind::Text);

        let mut prompt = QueuedPrompt::new(["x = 2", ""]);
        ctl.pointer_down(Some(&mut surface), p(1.0, 1.0));
        let release = ctl.pointer_up(Some(&mut surface), p(40.0, 30.0), &mut prompt);
        assert_eq!(release, Some(Release::Commit));
        assert_eq!(surface.texts, vec![("x = 2".to_string(), p(40.0, 30.0), DEFAULT_FONT_SIZE)]);

        // Empty answer still commits but draws nothing.
        ctl.pointer_down(Some(&mut surface), p(1.0, 1.0));
        let release = ctl.pointer_up(Some(&mut surface), p(5.0, 5.0), &mut prompt);
        assert_eq!(release, Some(Release::Commit));
        assert_eq!(surface.texts.len(), 1);
    }

    #[test]
    fn test_image_defers_commit() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();
        ctl.set_tool(ToolKind::Image);

        let mut prompt = QueuedPrompt::new(["  https://example.com/cat.png "]);
        ctl.pointer_down(Some(&mut surface), p(0.0, 0.0));
        let release = ctl.pointer_up(Some(&mut surface), p(7.0, 8.0), &mut prompt);
        assert_eq!(
            release,
            Some(Release::LoadImage {
                source: "https://example.com/cat.png".to_string(),
                at: p(7.0, 8.0),
            })
        );

        let release = ctl.pointer_up(Some(&mut surface), p(7.0, 8.0), &mut NoPrompt);
        assert_eq!(release, Some(Release::Skip));
    }

    #[test]
    fn test_missing_surface_is_noop() {
        let mut ctl = InteractionController::new();
        ctl.pointer_down(None, p(1.0, 1.0));
        assert_eq!(ctl.state(), ToolState::Idle);
        assert_eq!(ctl.anchor(), Point::ZERO);
        ctl.pointer_move(None, p(2.0, 2.0));
        assert_eq!(ctl.pointer_up(None, p(2.0, 2.0), &mut NoPrompt), None);
    }

    #[test]
    fn test_release_without_press_uses_last_anchor() {
        let mut surface = CallLog::default();
        let mut ctl = InteractionController::new();
        ctl.set_tool(ToolKind::Line);

        ctl.pointer_down(Some(&mut surface), p(5.0, 5.0));
        ctl.pointer_up(Some(&mut surface), p(10.0, 10.0), &mut NoPrompt);
        ctl.pointer_up(Some(&mut surface), p(20.0, 5.0), &mut NoPrompt);

        let bbox = surface.strokes[1].0.bounding_box();
        assert_eq!(bbox, Rect::new(5.0, 5.0, 20.0, 5.0));
    }
}
