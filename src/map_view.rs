//! Web-Mercator tile map that follows the published ground point.
//!
//! Tiles are XYZ, 256 px square. The viewport eases toward each new
//! coordinate instead of jumping, taking the short way around the
//! antimeridian.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use crate::geodetic::normalize_longitude;

pub const TILE_SIZE: f64 = 256.0;
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;
pub const DEFAULT_ZOOM: u8 = 3;
/// Exponent of the ease-out curve used for pans.
const EASE_OUT_POWER: i32 = 4;

#[derive(Clone, Copy, Hash, Eq, PartialEq, Debug)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

impl TileCoord {
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

/// Fractional tile-space position (x east, y south) at zoom `z`.
pub fn lon_lat_to_world(lon: f64, lat: f64, z: u8) -> (f64, f64) {
    let n = (1u32 << z) as f64;
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (lon + 180.0) / 360.0 * n;
    let y = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;
    (x, y)
}

pub fn lon_lat_to_tile(lon: f64, lat: f64, z: u8) -> TileCoord {
    let n = 1i64 << z;
    let (x, y) = lon_lat_to_world(lon, lat, z);
    TileCoord {
        x: (x.floor() as i64).rem_euclid(n) as u32,
        y: (y.floor() as i64).clamp(0, n - 1) as u32,
        z,
    }
}

/// North-west corner of a tile.
pub fn tile_to_lon_lat(t: &TileCoord) -> (f64, f64) {
    let n = (1u32 << t.z) as f64;
    let lon = t.x as f64 / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * t.y as f64 / n)).sinh().atan().to_degrees();
    (lon, lat)
}

/// A tile and the screen offset of its top-left corner relative to the view's top-left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacedTile {
    pub coord: TileCoord,
    pub screen_x: f64,
    pub screen_y: f64,
}

#[derive(Clone, Copy, Debug)]
struct Pan {
    from: (f64, f64),
    to: (f64, f64),
    started: Instant,
}

#[derive(Clone, Debug)]
pub struct MapViewport {
    zoom: u8,
    pan_duration: Duration,
    target: Option<(f64, f64)>,
    pan: Option<Pan>,
}

fn ease_out(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(EASE_OUT_POWER)
}

impl MapViewport {
    pub fn new(zoom: u8, pan_duration: Duration) -> Self {
        Self { zoom, pan_duration, target: None, pan: None }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// Latest requested `(lat, lng)`, where the marker sits.
    pub fn target(&self) -> Option<(f64, f64)> {
        self.target
    }

    /// Starts a pan from wherever the view currently is toward `(lat, lng)`.
    /// The first coordinate is adopted immediately.
    pub fn recenter(&mut self, lat: f64, lng: f64, now: Instant) {
        let to = (lat, normalize_longitude(lng));
        if let Some(from) = self.center_at(now) {
            self.pan = Some(Pan { from, to, started: now });
        }
        self.target = Some(to);
    }

    /// View centre `(lat, lng)` at `now`, or `None` before the first recenter.
    pub fn center_at(&self, now: Instant) -> Option<(f64, f64)> {
        let target = self.target?;
        let Some(pan) = self.pan else {
            return Some(target);
        };
        let elapsed = now.saturating_duration_since(pan.started).as_secs_f64();
        let total = self.pan_duration.as_secs_f64();
        if total <= 0.0 || elapsed >= total {
            return Some(pan.to);
        }
        let k = ease_out(elapsed / total);
        let mut d_lng = pan.to.1 - pan.from.1;
        if d_lng > 180.0 {
            d_lng -= 360.0;
        } else if d_lng < -180.0 {
            d_lng += 360.0;
        }
        Some((
            pan.from.0 + (pan.to.0 - pan.from.0) * k,
            normalize_longitude(pan.from.1 + d_lng * k),
        ))
    }

    pub fn is_animating(&self, now: Instant) -> bool {
        self.pan
            .is_some_and(|p| now.saturating_duration_since(p.started) < self.pan_duration)
    }

    /// Tiles covering a `view_w` × `view_h` pixel view centred on the current
    /// centre. Columns wrap around the antimeridian; rows stop at the poles.
    pub fn visible_tiles(&self, now: Instant, view_w: f64, view_h: f64) -> Vec<PlacedTile> {
        let Some((lat, lng)) = self.center_at(now) else {
            return Vec::new();
        };
        let n = 1i64 << self.zoom;
        let (cx, cy) = lon_lat_to_world(lng, lat, self.zoom);
        let left = cx * TILE_SIZE - view_w / 2.0;
        let top = cy * TILE_SIZE - view_h / 2.0;

        let x0 = (left / TILE_SIZE).floor() as i64;
        let x1 = ((left + view_w) / TILE_SIZE).ceil() as i64;
        let y0 = ((top / TILE_SIZE).floor() as i64).max(0);
        let y1 = (((top + view_h) / TILE_SIZE).ceil() as i64).min(n);

        let mut tiles = Vec::new();
        for ty in y0..y1 {
            for tx in x0..x1 {
                tiles.push(PlacedTile {
                    coord: TileCoord { x: tx.rem_euclid(n) as u32, y: ty as u32, z: self.zoom },
                    screen_x: tx as f64 * TILE_SIZE - left,
                    screen_y: ty as f64 * TILE_SIZE - top,
                });
            }
        }
        tiles
    }

    /// Screen position of the marker in a view of the given size, measured from the top-left.
    pub fn marker_position(&self, now: Instant, view_w: f64, view_h: f64) -> Option<(f64, f64)> {
        let (t_lat, t_lng) = self.target?;
        let (c_lat, c_lng) = self.center_at(now)?;
        let world = (1u32 << self.zoom) as f64 * TILE_SIZE;
        let (tx, ty) = lon_lat_to_world(t_lng, t_lat, self.zoom);
        let (cx, cy) = lon_lat_to_world(c_lng, c_lat, self.zoom);
        let mut dx = (tx - cx) * TILE_SIZE;
        if dx > world / 2.0 {
            dx -= world;
        } else if dx < -world / 2.0 {
            dx += world;
        }
        Some((view_w / 2.0 + dx, view_h / 2.0 + (ty - cy) * TILE_SIZE))
    }
}
