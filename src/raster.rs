//! Raster surface contract and its tiny-skia implementation.
//!
//! The compositor only talks to [`RasterSurface`]: a resize, image blits,
//! polyline strokes, polygon clip regions and rotated sprite blits.

use tiny_skia::{
    FillRule, FilterQuality, LineCap, LineJoin, Mask, Paint, PathBuilder, Pixmap, PixmapPaint,
    Stroke, Transform,
};

use crate::error::{Result, TrackerError};

/// Decoded, premultiplied RGBA image.
pub type Sprite = Pixmap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub rgba: [u8; 4],
    pub width: f32,
}

impl StrokeStyle {
    pub const fn new(rgba: [u8; 4], width: f32) -> Self {
        Self { rgba, width }
    }
}

/// Axis-aligned destination rectangle in raster pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    pub fn centered(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }
}

/// A sprite drawn in a frame translated to `origin` and rotated by
/// `rotation` radians; `local` is the destination rect in that frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpritePlacement {
    pub origin: (f64, f64),
    pub rotation: f64,
    pub local: Rect,
    pub opacity: f32,
}

impl SpritePlacement {
    pub fn centered(origin: (f64, f64), rotation: f64, w: f64, h: f64) -> Self {
        Self {
            origin,
            rotation,
            local: Rect::centered(0.0, 0.0, w, h),
            opacity: 1.0,
        }
    }

    /// Same placement, shifted in raster space. Used for drop shadows.
    pub fn shifted(&self, dx: f64, dy: f64) -> Self {
        Self {
            origin: (self.origin.0 + dx, self.origin.1 + dy),
            ..*self
        }
    }
}

pub trait RasterSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Reallocates the surface, discarding its content.
    fn resize(&mut self, width: u32, height: u32) -> Result<()>;
    fn draw_image(&mut self, image: &Sprite, dest: Rect);
    fn draw_sprite(&mut self, sprite: &Sprite, placement: &SpritePlacement);
    fn stroke_polyline(&mut self, points: &[(f64, f64)], style: &StrokeStyle);
    /// Restricts subsequent drawing to the polygon, intersected with any active clip.
    fn push_clip(&mut self, polygon: &[(f64, f64)]);
    fn pop_clip(&mut self);
}

fn polyline_path(points: &[(f64, f64)], close: bool) -> Option<tiny_skia::Path> {
    let (first, rest) = points.split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.0 as f32, first.1 as f32);
    for p in rest {
        pb.line_to(p.0 as f32, p.1 as f32);
    }
    if close {
        pb.close();
    }
    pb.finish()
}

fn image_transform(image: &Sprite, dest: Rect) -> Transform {
    Transform::from_row(
        (dest.w / image.width() as f64) as f32,
        0.0,
        0.0,
        (dest.h / image.height() as f64) as f32,
        dest.x as f32,
        dest.y as f32,
    )
}

pub struct PixmapSurface {
    pixmap: Pixmap,
    clips: Vec<Mask>,
}

impl PixmapSurface {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .ok_or_else(|| TrackerError::Raster(format!("cannot allocate {}x{} surface", width, height)))?;
        Ok(Self { pixmap, clips: Vec::new() })
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    fn clip(&self) -> Option<&Mask> {
        self.clips.last()
    }
}

impl RasterSurface for PixmapSurface {
    fn width(&self) -> u32 {
        self.pixmap.width()
    }

    fn height(&self) -> u32 {
        self.pixmap.height()
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        *self = Self::new(width, height)?;
        Ok(())
    }

    fn draw_image(&mut self, image: &Sprite, dest: Rect) {
        let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
        let transform = image_transform(image, dest);
        let mask = self.clips.last();
        self.pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, mask);
    }

    fn draw_sprite(&mut self, sprite: &Sprite, placement: &SpritePlacement) {
        let paint = PixmapPaint {
            opacity: placement.opacity,
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_translate(placement.origin.0 as f32, placement.origin.1 as f32)
            .pre_rotate(placement.rotation.to_degrees() as f32)
            .pre_concat(image_transform(sprite, placement.local));
        let mask = self.clips.last();
        self.pixmap.draw_pixmap(0, 0, sprite.as_ref(), &paint, transform, mask);
    }

    fn stroke_polyline(&mut self, points: &[(f64, f64)], style: &StrokeStyle) {
        let Some(path) = polyline_path(points, false) else {
            return;
        };
        let mut paint = Paint::default();
        let [r, g, b, a] = style.rgba;
        paint.set_color_rgba8(r, g, b, a);
        paint.anti_alias = true;
        let stroke = Stroke {
            width: style.width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        let mask = self.clips.last();
        self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), mask);
    }

    fn push_clip(&mut self, polygon: &[(f64, f64)]) {
        let path = polyline_path(polygon, true);
        let mask = match (self.clip(), path) {
            (Some(current), Some(path)) => {
                let mut mask = current.clone();
                mask.intersect_path(&path, FillRule::Winding, true, Transform::identity());
                Some(mask)
            }
            (None, Some(path)) => Mask::new(self.width(), self.height()).map(|mut mask| {
                mask.fill_path(&path, FillRule::Winding, true, Transform::identity());
                mask
            }),
            (_, None) => Mask::new(self.width(), self.height()),
        };
        match mask {
            Some(mask) => self.clips.push(mask),
            None => log::debug!("Clip mask allocation failed on {}x{}", self.width(), self.height()),
        }
    }

    fn pop_clip(&mut self) {
        self.clips.pop();
    }
}
