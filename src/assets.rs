//! Image assets for the 2D tracker view.
//!
//! Decoded once into premultiplied sprites and reused for every frame.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tiny_skia::{IntSize, Pixmap};

use crate::error::{Result, TrackerError};
use crate::raster::Sprite;

pub const DAY_MAP: &str = "mapday.png";
pub const NIGHT_MAP: &str = "mapnight.png";
pub const STATION_ICON: &str = "iss.png";
pub const SUN_ICON: &str = "sun.png";
pub const ORBIT_FORWARD_ICON: &str = "orbitfwd.png";
pub const ORBIT_BACKWARD_ICON: &str = "orbitbwd.png";
pub const MAP_MARKER_ICON: &str = "location-pin.png";

pub const SHADOW_OPACITY: f32 = 0.8;
/// Box blur radius in pixels applied to arrow shadows.
pub const SHADOW_BLUR_RADIUS: usize = 2;

/// Path of a file shipped with the crate.
pub fn asset_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Decodes a JPEG or PNG into a premultiplied sprite.
pub fn sprite_from_bytes(bytes: &[u8]) -> std::result::Result<Sprite, String> {
    let mut reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| format!("Failed to guess format: {}", e))?;
    reader.no_limits();
    let img = reader
        .decode()
        .map_err(|e| format!("Failed to decode image: {}", e))?
        .to_rgba8();
    let (width, height) = img.dimensions();

    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    let size = IntSize::from_wh(width, height).ok_or("Image has zero size")?;
    Pixmap::from_vec(data, size).ok_or_else(|| "Pixel buffer does not match image size".to_string())
}

pub fn load_sprite(path: &Path) -> Result<Sprite> {
    let fail = |reason: String| TrackerError::AssetLoadFailure { path: path.to_path_buf(), reason };
    let bytes = std::fs::read(path).map_err(|e| fail(e.to_string()))?;
    sprite_from_bytes(&bytes).map_err(fail)
}

/// One separable box blur pass over a `width` x `height` plane, edges clamped.
fn box_blur(plane: &[f32], width: usize, height: usize, radius: usize, horizontal: bool) -> Vec<f32> {
    let taps = (2 * radius + 1) as f32;
    let mut out = vec![0.0; plane.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            for k in 0..=2 * radius {
                let (sx, sy) = if horizontal {
                    ((x + k).saturating_sub(radius).min(width - 1), y)
                } else {
                    (x, (y + k).saturating_sub(radius).min(height - 1))
                };
                sum += plane[sy * width + sx];
            }
            out[y * width + x] = sum / taps;
        }
    }
    out
}

/// Black silhouette of `sprite`, with alpha scaled by `opacity` and softened
/// by a box blur of `blur_radius` pixels.
pub fn shadow_of(sprite: &Sprite, opacity: f32, blur_radius: usize) -> Sprite {
    let (width, height) = (sprite.width() as usize, sprite.height() as usize);
    let mut alpha: Vec<f32> = sprite.data().chunks_exact(4).map(|px| px[3] as f32 * opacity).collect();
    if blur_radius > 0 {
        alpha = box_blur(&alpha, width, height, blur_radius, true);
        alpha = box_blur(&alpha, width, height, blur_radius, false);
    }
    let mut shadow = sprite.clone();
    for (px, a) in shadow.data_mut().chunks_exact_mut(4).zip(alpha) {
        px.copy_from_slice(&[0, 0, 0, a.round().clamp(0.0, 255.0) as u8]);
    }
    shadow
}

/// Direction arrow glyph with its precomputed drop shadow.
pub struct ArrowSprite {
    pub image: Sprite,
    pub shadow: Sprite,
}

impl ArrowSprite {
    pub fn new(image: Sprite) -> Self {
        let shadow = shadow_of(&image, SHADOW_OPACITY, SHADOW_BLUR_RADIUS);
        Self { image, shadow }
    }
}

pub struct AssetSet {
    pub day: Sprite,
    pub night: Sprite,
    pub station: Sprite,
    pub sun: Sprite,
    pub orbit_forward: ArrowSprite,
    pub orbit_backward: ArrowSprite,
}

impl AssetSet {
    /// Loads the whole batch. Any missing or undecodable file fails the batch.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = |name: &str| -> PathBuf { dir.join(name) };
        let assets = Self {
            day: load_sprite(&path(DAY_MAP))?,
            night: load_sprite(&path(NIGHT_MAP))?,
            station: load_sprite(&path(STATION_ICON))?,
            sun: load_sprite(&path(SUN_ICON))?,
            orbit_forward: ArrowSprite::new(load_sprite(&path(ORBIT_FORWARD_ICON))?),
            orbit_backward: ArrowSprite::new(load_sprite(&path(ORBIT_BACKWARD_ICON))?),
        };
        log::info!("Loaded tracker assets from {:?}", dir);
        Ok(assets)
    }

    /// Assembles a set from already decoded sprites.
    pub fn from_sprites(
        day: Sprite,
        night: Sprite,
        station: Sprite,
        sun: Sprite,
        orbit_forward: Sprite,
        orbit_backward: Sprite,
    ) -> Self {
        Self {
            day,
            night,
            station,
            sun,
            orbit_forward: ArrowSprite::new(orbit_forward),
            orbit_backward: ArrowSprite::new(orbit_backward),
        }
    }
}
