//! Per-frame compositing of the 2D tracker view.
//!
//! Layer order: night map, day map clipped to the lit hemisphere, sun,
//! orbit paths, horizon ring(s), path arrows, station marker.

use std::f64::consts::{FRAC_PI_2, PI};

use chrono::{DateTime, Duration, Utc};

use crate::assets::{ArrowSprite, AssetSet};
use crate::error::Result;
use crate::geodetic::Telemetry;
use crate::projection::Equirectangular;
use crate::propagator::GroundTrack;
use crate::raster::{RasterSurface, Rect, SpritePlacement, StrokeStyle};
use crate::solar::{subsolar_point, terminator_curve};
use crate::visibility::{encloses_pole, horizon_circle, wrap_offsets, DEFAULT_HORIZON_RADIUS_DEG};

pub const PATH_WINDOW_MINUTES: i64 = 90;
pub const HEADING_LOOKAHEAD_SECS: i64 = 2;

pub const FORWARD_PATH_STYLE: StrokeStyle = StrokeStyle::new([255, 255, 255, 255], 2.0);
pub const BACKWARD_PATH_STYLE: StrokeStyle = StrokeStyle::new([255, 255, 0, 255], 2.0);
pub const HORIZON_STYLE: StrokeStyle = StrokeStyle::new([0, 255, 0, 255], 3.0);

pub const SUN_SIZE: f64 = 40.0;
pub const STATION_SIZE: f64 = 60.0;
pub const ARROW_SIZE: f64 = 50.0;
pub const SHADOW_OFFSET: (f64, f64) = (2.0, 2.0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathDirection {
    Forward,
    Backward,
}

impl PathDirection {
    fn step_minutes(self) -> i64 {
        match self {
            PathDirection::Forward => 1,
            PathDirection::Backward => -1,
        }
    }

    pub fn style(self) -> StrokeStyle {
        match self {
            PathDirection::Forward => FORWARD_PATH_STYLE,
            PathDirection::Backward => BACKWARD_PATH_STYLE,
        }
    }

    /// Arrow glyph rect in the arrow's rotated frame.
    fn arrow_rect(self) -> Rect {
        let half = ARROW_SIZE / 2.0;
        match self {
            PathDirection::Forward => Rect::new(-35.0, -half - 15.0, ARROW_SIZE, ARROW_SIZE),
            PathDirection::Backward => Rect::new(-20.0, -half + 15.0, ARROW_SIZE, ARROW_SIZE),
        }
    }

    fn arrow_flip(self) -> f64 {
        match self {
            PathDirection::Forward => 0.0,
            PathDirection::Backward => PI,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitSample {
    pub lon: f64,
    pub lat: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrowPlacement {
    pub x: f64,
    pub y: f64,
    /// Direction from the second-to-last to the last sample, radians.
    pub angle: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OrbitPath {
    pub direction: PathDirection,
    pub segments: Vec<Vec<(f64, f64)>>,
    pub arrow: Option<ArrowPlacement>,
}

/// Samples the ground track at one-minute steps from `anchor` out to
/// `window_minutes` in `direction`, anchor included. Instants the model
/// cannot propagate are left out.
pub fn orbit_samples(
    track: &dyn GroundTrack,
    anchor: DateTime<Utc>,
    direction: PathDirection,
    window_minutes: i64,
) -> Vec<OrbitSample> {
    (0..=window_minutes)
        .filter_map(|i| {
            let t = anchor + Duration::minutes(i * direction.step_minutes());
            match track.position_at(t) {
                Ok(p) => Some(OrbitSample { lon: p.lng, lat: p.lat }),
                Err(e) => {
                    log::debug!("Skipping orbit sample at {}: {}", t, e);
                    None
                }
            }
        })
        .collect()
}

/// Breaks a projected polyline wherever consecutive points are more than half
/// the raster apart horizontally.
pub fn split_at_antimeridian(points: &[(f64, f64)], width: f64) -> Vec<Vec<(f64, f64)>> {
    let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for &p in points {
        if let Some(prev) = current.last() {
            if (p.0 - prev.0).abs() > width / 2.0 {
                segments.push(std::mem::take(&mut current));
            }
        }
        current.push(p);
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

pub fn orbit_path(samples: &[OrbitSample], direction: PathDirection, projection: &Equirectangular) -> OrbitPath {
    let points: Vec<(f64, f64)> = samples.iter().map(|s| projection.project(s.lon, s.lat)).collect();
    let arrow = match points.as_slice() {
        [.., prev, last] if (last.0 - prev.0).abs() < projection.width / 2.0 => Some(ArrowPlacement {
            x: last.0,
            y: last.1,
            angle: (last.1 - prev.1).atan2(last.0 - prev.0),
        }),
        _ => None,
    };
    OrbitPath {
        direction,
        segments: split_at_antimeridian(&points, projection.width),
        arrow,
    }
}

/// Raster-space direction of travel from `current` to `ahead`, or `None`
/// when the step crosses the seam.
pub fn marker_heading(current: (f64, f64), ahead: (f64, f64), width: f64) -> Option<f64> {
    let dx = ahead.0 - current.0;
    if dx.abs() < width / 2.0 {
        Some((ahead.1 - current.1).atan2(dx))
    } else {
        None
    }
}

/// Projected horizon polylines around the observer: the primary ring plus a
/// copy a full turn away when the observer is near the seam. A ring around a
/// pole spans the whole map and is wrapped and broken at the seam instead.
pub fn horizon_rings(observer: &Telemetry, radius_deg: f64, projection: &Equirectangular) -> Vec<Vec<(f64, f64)>> {
    let ring = horizon_circle(observer.lat, observer.lng, radius_deg);
    if encloses_pole(observer.lat, radius_deg) {
        let points: Vec<(f64, f64)> = ring.iter().map(|&(lon, lat)| projection.project(lon, lat)).collect();
        return split_at_antimeridian(&points, projection.width);
    }
    wrap_offsets(observer.lng)
        .into_iter()
        .map(|offset| {
            ring.iter()
                .map(|&(lon, lat)| (projection.lon_to_x_raw(lon + offset), projection.lat_to_y(lat)))
                .collect()
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameStats {
    pub width: u32,
    pub height: u32,
    pub path_segments: usize,
    pub arrows: usize,
    pub horizon_rings: usize,
    pub heading: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Assets or container size not available yet. Nothing drawn.
    NotReady,
    /// The object could not be propagated at the frame's anchor time. Nothing drawn.
    Skipped,
    Painted(FrameStats),
}

pub struct Compositor {
    assets: Option<AssetSet>,
    container: (u32, u32),
    horizon_radius_deg: f64,
    path_window_minutes: i64,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            assets: None,
            container: (0, 0),
            horizon_radius_deg: DEFAULT_HORIZON_RADIUS_DEG,
            path_window_minutes: PATH_WINDOW_MINUTES,
        }
    }

    pub fn with_horizon_radius(mut self, deg: f64) -> Self {
        self.horizon_radius_deg = deg;
        self
    }

    pub fn with_path_window(mut self, minutes: i64) -> Self {
        self.path_window_minutes = minutes;
        self
    }

    pub fn set_assets(&mut self, assets: AssetSet) {
        self.assets = Some(assets);
    }

    /// Records the container width. The raster keeps a 2:1 aspect; the next
    /// paint picks the new size up.
    pub fn observe_container(&mut self, width: f32) {
        let width = width.max(0.0).floor() as u32;
        self.container = (width, width / 2);
    }

    pub fn raster_size(&self) -> (u32, u32) {
        self.container
    }

    /// Paints one frame. Object geometry is anchored to `telemetry.time`;
    /// the sun and terminator follow the wall-clock `now`.
    pub fn paint(
        &self,
        surface: &mut dyn RasterSurface,
        track: &dyn GroundTrack,
        telemetry: &Telemetry,
        now: DateTime<Utc>,
    ) -> Result<FrameOutcome> {
        let (width, height) = self.container;
        let Some(assets) = self.assets.as_ref() else {
            return Ok(FrameOutcome::NotReady);
        };
        if width == 0 || height == 0 {
            return Ok(FrameOutcome::NotReady);
        }

        let anchor = telemetry.time;
        let ahead = match track.position_at(anchor) {
            Ok(_) => track.position_at(anchor + Duration::seconds(HEADING_LOOKAHEAD_SECS)).ok(),
            Err(e) => {
                log::warn!("Skipping frame: {}", e);
                return Ok(FrameOutcome::Skipped);
            }
        };

        let projection = Equirectangular::new(width as f64, height as f64);
        let full = Rect::new(0.0, 0.0, width as f64, height as f64);
        surface.resize(width, height)?;

        surface.draw_image(&assets.night, full);

        surface.push_clip(&terminator_curve(now, width, height));
        surface.draw_image(&assets.day, full);
        surface.pop_clip();

        let sun = subsolar_point(now);
        surface.draw_sprite(
            &assets.sun,
            &SpritePlacement::centered(projection.project(sun.lon, sun.lat), 0.0, SUN_SIZE, SUN_SIZE),
        );

        let mut path_segments = 0;
        let mut arrows = Vec::new();
        for direction in [PathDirection::Forward, PathDirection::Backward] {
            let samples = orbit_samples(track, anchor, direction, self.path_window_minutes);
            let path = orbit_path(&samples, direction, &projection);
            for segment in &path.segments {
                surface.stroke_polyline(segment, &direction.style());
            }
            path_segments += path.segments.len();
            if let Some(arrow) = path.arrow {
                arrows.push((direction, arrow));
            }
        }

        let rings = horizon_rings(telemetry, self.horizon_radius_deg, &projection);
        for ring in &rings {
            surface.stroke_polyline(ring, &HORIZON_STYLE);
        }

        for &(direction, arrow) in &arrows {
            let sprite: &ArrowSprite = match direction {
                PathDirection::Forward => &assets.orbit_forward,
                PathDirection::Backward => &assets.orbit_backward,
            };
            let placement = SpritePlacement {
                origin: (arrow.x, arrow.y),
                rotation: arrow.angle + direction.arrow_flip(),
                local: direction.arrow_rect(),
                opacity: 1.0,
            };
            surface.draw_sprite(&sprite.shadow, &placement.shifted(SHADOW_OFFSET.0, SHADOW_OFFSET.1));
            surface.draw_sprite(&sprite.image, &placement);
        }

        let station = projection.project(telemetry.lng, telemetry.lat);
        let heading = ahead.and_then(|next| {
            marker_heading(station, projection.project(next.lng, next.lat), projection.width)
        });
        surface.draw_sprite(
            &assets.station,
            &SpritePlacement::centered(station, heading.map_or(0.0, |h| h + FRAC_PI_2), STATION_SIZE, STATION_SIZE),
        );

        Ok(FrameOutcome::Painted(FrameStats {
            width,
            height,
            path_segments,
            arrows: arrows.len(),
            horizon_rings: rings.len(),
            heading,
        }))
    }
}
