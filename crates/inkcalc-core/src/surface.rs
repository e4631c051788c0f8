//! Drawing surface abstraction and raster snapshots.
//!
//! The engine never touches pixels directly. Everything it draws goes through
//! [`DrawingSurface`], and everything it remembers is a [`Snapshot`] taken
//! from one.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use kurbo::{BezPath, Point, Rect};
use peniko::Color;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Prefix of PNG data URIs produced by [`to_png_data_uri`].
pub const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Surface errors.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Invalid surface size: {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("Pixel buffer of {actual} bytes does not fit {width}x{height}")]
    BufferSize { width: u32, height: u32, actual: usize },
    #[error("Snapshot is {snapshot_width}x{snapshot_height}, surface is {width}x{height}")]
    SizeMismatch {
        snapshot_width: u32,
        snapshot_height: u32,
        width: u32,
        height: u32,
    },
    #[error("Encoding error: {0}")]
    Encode(String),
    #[error("Decoding error: {0}")]
    Decode(String),
}

/// Result type for surface operations.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// How a stroke combines with the pixels already on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositeMode {
    /// Paint over existing pixels.
    #[default]
    SourceOver,
    /// Remove existing pixels where the stroke covers them.
    DestinationOut,
}

/// Stroke parameters. Line caps and joins are always round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub color: Color,
    pub width: f64,
}

impl Pen {
    pub fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// A decoded image in straight (non-premultiplied) RGBA8.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// Wrap an RGBA8 buffer, checking that it matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> SurfaceResult<Self> {
        check_buffer(width, height, pixels.len())?;
        Ok(Self { width, height, pixels })
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Immutable capture of every pixel of a surface at one point in time.
///
/// The bytes are four per pixel in the producing surface's native layout,
/// with alpha always in the fourth byte. Clones share the buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Snapshot {
    /// Create a snapshot from a pixel buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> SurfaceResult<Self> {
        check_buffer(width, height, pixels.len())?;
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    /// A fully transparent snapshot.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; pixel_len(width, height)].into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Alpha of the pixel at `(x, y)`. Out-of-range coordinates read as transparent.
    pub fn alpha_at(&self, x: u32, y: u32) -> u8 {
        if x >= self.width || y >= self.height {
            return 0;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.pixels[i + 3]
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn pixel_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}

fn check_buffer(width: u32, height: u32, actual: usize) -> SurfaceResult<()> {
    if actual != pixel_len(width, height) {
        return Err(SurfaceError::BufferSize {
            width,
            height,
            actual,
        });
    }
    Ok(())
}

/// A 2D raster drawing target.
///
/// Mirrors the handful of primitives the whiteboard needs from a canvas
/// context. Drawing calls are infallible; anything degenerate (empty path,
/// zero radius, glyph outside the surface) simply draws nothing.
pub trait DrawingSurface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Resize the surface. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32) -> SurfaceResult<()>;

    /// Stroke a path with the given pen and compositing mode.
    ///
    /// The mode applies to this call only.
    fn stroke_path(&mut self, path: &BezPath, pen: &Pen, mode: CompositeMode);

    /// Fill text with its baseline starting at `baseline`.
    fn fill_text(&mut self, text: &str, baseline: Point, color: Color, size: f64);

    /// Composite an image with its top-left corner at `top_left`.
    fn draw_image(&mut self, image: &RasterImage, top_left: Point);

    /// Make every pixel inside `rect` transparent.
    fn clear_rect(&mut self, rect: Rect);

    /// Make the whole surface transparent.
    fn clear(&mut self) {
        let rect = Rect::new(0.0, 0.0, self.width() as f64, self.height() as f64);
        self.clear_rect(rect);
    }

    /// Capture the full pixel buffer.
    fn snapshot(&self) -> Snapshot;

    /// Replace the full pixel buffer with a snapshot taken from a surface of
    /// the same size.
    fn restore(&mut self, snapshot: &Snapshot) -> SurfaceResult<()>;

    /// Encode the current contents as PNG.
    fn encode_png(&self) -> SurfaceResult<Vec<u8>>;
}

/// Parse a CSS color string (`#fff`, `#ffffff`, `red`, `rgb(0 0 0)`, ...).
pub fn parse_css_color(value: &str) -> Option<Color> {
    peniko::color::parse_color(value.trim())
        .ok()
        .map(|c| c.to_alpha_color::<peniko::color::Srgb>())
}

/// Wrap PNG bytes in a `data:` URI.
pub fn to_png_data_uri(png: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URI_PREFIX, STANDARD.encode(png))
}

/// Split a base64 `data:` URI into its media type and decoded payload.
pub fn decode_data_uri(uri: &str) -> SurfaceResult<(String, Vec<u8>)> {
    let rest = uri
        .trim_start()
        .strip_prefix("data:")
        .ok_or_else(|| SurfaceError::Decode("not a data URI".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| SurfaceError::Decode("data URI has no payload".to_string()))?;
    let media_type = header
        .strip_suffix(";base64")
        .ok_or_else(|| SurfaceError::Decode("only base64 data URIs are supported".to_string()))?;
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| SurfaceError::Decode(format!("invalid base64: {}", e)))?;
    Ok((media_type.to_string(), bytes))
}
