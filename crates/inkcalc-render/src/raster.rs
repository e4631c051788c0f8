//! CPU drawing surface backed by a tiny-skia pixmap.

use font8x8::{BASIC_FONTS, UnicodeFonts};
use inkcalc_core::surface::{
    CompositeMode, DrawingSurface, Pen, RasterImage, Snapshot, SurfaceError, SurfaceResult,
};
use kurbo::{BezPath, PathEl, Point, Rect};
use peniko::Color;
use tiny_skia::{
    BlendMode, ColorU8, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

/// Glyph cell size of the bitmap font.
const GLYPH_SIZE: usize = 8;

/// Raster surface with premultiplied RGBA storage.
///
/// Snapshots carry the premultiplied bytes as-is, so restoring one is exact.
pub struct RasterSurface {
    pixmap: Pixmap,
}

impl RasterSurface {
    /// Create a transparent surface.
    pub fn new(width: u32, height: u32) -> SurfaceResult<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(Self { pixmap })
    }

    /// Current contents as straight (non-premultiplied) RGBA8.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixmap.data().len());
        for pixel in self.pixmap.pixels() {
            let c = pixel.demultiply();
            rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        rgba
    }

    fn fill_cell(&mut self, x: f32, y: f32, size: f32, paint: &Paint<'_>) {
        if let Some(rect) = tiny_skia::Rect::from_xywh(x, y, size, size) {
            self.pixmap.fill_rect(rect, paint, Transform::identity(), None);
        }
    }
}

fn paint_for(color: Color) -> Paint<'static> {
    let c = color.to_rgba8();
    let mut paint = Paint::default();
    paint.set_color_rgba8(c.r, c.g, c.b, c.a);
    paint.anti_alias = true;
    paint
}

fn build_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(c, p) => builder.quad_to(c.x as f32, c.y as f32, p.x as f32, p.y as f32),
            PathEl::CurveTo(c1, c2, p) => builder.cubic_to(
                c1.x as f32,
                c1.y as f32,
                c2.x as f32,
                c2.y as f32,
                p.x as f32,
                p.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

/// Convert straight RGBA into a premultiplied pixmap.
fn image_pixmap(image: &RasterImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(image.width, image.height)?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(image.pixels.chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Some(pixmap)
}

impl DrawingSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn resize(&mut self, width: u32, height: u32) -> SurfaceResult<()> {
        self.pixmap =
            Pixmap::new(width, height).ok_or(SurfaceError::InvalidSize { width, height })?;
        Ok(())
    }

    fn stroke_path(&mut self, path: &BezPath, pen: &Pen, mode: CompositeMode) {
        let Some(path) = build_path(path) else {
            return;
        };
        let mut paint = paint_for(pen.color);
        paint.blend_mode = match mode {
            CompositeMode::SourceOver => BlendMode::SourceOver,
            CompositeMode::DestinationOut => BlendMode::DestinationOut,
        };
        let stroke = Stroke {
            width: pen.width as f32,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    fn fill_text(&mut self, text: &str, baseline: Point, color: Color, size: f64) {
        let scale = (size / GLYPH_SIZE as f64).round().max(1.0) as f32;
        let advance = GLYPH_SIZE as f32 * scale;
        let top = baseline.y as f32 - advance;
        let paint = paint_for(color);

        let mut cursor_x = baseline.x as f32;
        for ch in text.chars() {
            let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
                cursor_x += advance;
                continue;
            };
            for (row_idx, row) in glyph.iter().enumerate() {
                for col_idx in 0..GLYPH_SIZE {
                    if (row >> col_idx) & 1 == 0 {
                        continue;
                    }
                    let x = cursor_x + col_idx as f32 * scale;
                    let y = top + row_idx as f32 * scale;
                    self.fill_cell(x, y, scale, &paint);
                }
            }
            cursor_x += advance;
        }
    }

    fn draw_image(&mut self, image: &RasterImage, top_left: Point) {
        let Some(source) = image_pixmap(image) else {
            log::debug!("Skipping empty image");
            return;
        };
        self.pixmap.draw_pixmap(
            top_left.x.round() as i32,
            top_left.y.round() as i32,
            source.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    fn clear_rect(&mut self, rect: Rect) {
        let Some(rect) = tiny_skia::Rect::from_ltrb(
            rect.x0 as f32,
            rect.y0 as f32,
            rect.x1 as f32,
            rect.y1 as f32,
        ) else {
            return;
        };
        let paint = Paint {
            blend_mode: BlendMode::Clear,
            anti_alias: false,
            ..Paint::default()
        };
        self.pixmap.fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.width(), self.height(), self.pixmap.data().to_vec())
            .unwrap_or_else(|_| Snapshot::blank(self.width(), self.height()))
    }

    fn restore(&mut self, snapshot: &Snapshot) -> SurfaceResult<()> {
        if snapshot.width() != self.width() || snapshot.height() != self.height() {
            return Err(SurfaceError::SizeMismatch {
                snapshot_width: snapshot.width(),
                snapshot_height: snapshot.height(),
                width: self.width(),
                height: self.height(),
            });
        }
        self.pixmap.data_mut().copy_from_slice(snapshot.pixels());
        Ok(())
    }

    fn encode_png(&self) -> SurfaceResult<Vec<u8>> {
        let rgba = self.to_rgba();
        let mut png_data = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut png_data, self.width(), self.height());
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder
                .write_header()
                .map_err(|e| SurfaceError::Encode(e.to_string()))?;
            writer
                .write_image_data(&rgba)
                .map_err(|e| SurfaceError::Encode(e.to_string()))?;
        }
        Ok(png_data)
    }
}
