//! Sub-solar point and day/night terminator.
//!
//! Low-precision declination approximation, good to a fraction of a degree.
//! Everything here is a pure function of the instant and is recomputed per frame.

use chrono::{DateTime, Utc};

use crate::geodetic::normalize_longitude;
use crate::projection::Equirectangular;
use crate::time::{day_of_year, utc_hours};

pub const OBLIQUITY_DEG: f64 = 23.44;

/// Smallest |tan(sun latitude)| used when solving for the terminator.
const TAN_EPSILON: f64 = 1e-4;

/// Column spacing of terminator samples, in pixels.
pub const TERMINATOR_STEP_PX: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SubsolarPoint {
    pub lon: f64,
    pub lat: f64,
}

pub fn subsolar_point(time: DateTime<Utc>) -> SubsolarPoint {
    let lon = normalize_longitude((12.0 - utc_hours(time)) * 15.0);
    let season = (360.0 / 365.0 * (day_of_year(time) as f64 + 10.0)).to_radians();
    let lat = -OBLIQUITY_DEG * season.cos();
    SubsolarPoint { lon, lat }
}

/// Latitude (degrees) of the terminator at longitude `lon`, where the sun's zenith angle is 90°.
pub fn terminator_latitude(lon: f64, sun: &SubsolarPoint) -> f64 {
    let mut tan_sun = sun.lat.to_radians().tan();
    if tan_sun.abs() < TAN_EPSILON {
        tan_sun = TAN_EPSILON.copysign(tan_sun);
    }
    let d_lon = (lon - sun.lon).to_radians();
    (-d_lon.cos() / tan_sun).atan().to_degrees()
}

/// Day-hemisphere polygon in raster space.
///
/// Samples the terminator every [`TERMINATOR_STEP_PX`] columns from 0 through
/// `width`, then closes through the two top corners when the sun is north of
/// the equator, the two bottom corners otherwise.
pub fn terminator_curve(time: DateTime<Utc>, width: u32, height: u32) -> Vec<(f64, f64)> {
    let sun = subsolar_point(time);
    let projection = Equirectangular::new(width as f64, height as f64);

    let mut columns: Vec<u32> = (0..=width).step_by(TERMINATOR_STEP_PX as usize).collect();
    if columns.last() != Some(&width) {
        columns.push(width);
    }

    let mut points: Vec<(f64, f64)> = columns
        .into_iter()
        .map(|x| {
            let x = x as f64;
            let lat = terminator_latitude(projection.x_to_lon(x), &sun);
            (x, projection.lat_to_y(lat))
        })
        .collect();

    let edge = if sun.lat < 0.0 { projection.height } else { 0.0 };
    points.push((projection.width, edge));
    points.push((0.0, edge));
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn june_solstice_noon() {
        let sun = subsolar_point(Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap());
        assert_abs_diff_eq!(sun.lon, 0.0, epsilon = 0.5);
        assert_abs_diff_eq!(sun.lat, 23.44, epsilon = 0.5);
    }

    #[test]
    fn december_evening() {
        let sun = subsolar_point(Utc.with_ymd_and_hms(2023, 12, 21, 18, 0, 0).unwrap());
        assert_abs_diff_eq!(sun.lon, -90.0, epsilon = 0.5);
        assert_abs_diff_eq!(sun.lat, -23.44, epsilon = 0.5);
    }

    #[test]
    fn midnight_sun_is_on_the_antimeridian() {
        let sun = subsolar_point(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_abs_diff_eq!(sun.lon, -180.0);
        assert!(sun.lat < -22.0);
    }

    #[test]
    fn terminator_is_periodic_in_longitude() {
        let sun = SubsolarPoint { lon: 37.0, lat: 12.5 };
        for lon in [-180.0, -91.3, 0.0, 44.4, 179.9] {
            assert_abs_diff_eq!(
                terminator_latitude(lon, &sun),
                terminator_latitude(lon + 360.0, &sun),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn terminator_is_ninety_degrees_from_the_sun() {
        let sun = SubsolarPoint { lon: 10.0, lat: 20.0 };
        assert_abs_diff_eq!(terminator_latitude(10.0, &sun), -70.0, epsilon = 1e-9);
        assert_abs_diff_eq!(terminator_latitude(190.0, &sun), 70.0, epsilon = 1e-9);
        assert_abs_diff_eq!(terminator_latitude(100.0, &sun), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn equinox_guard_keeps_latitude_finite() {
        let sun = SubsolarPoint { lon: 0.0, lat: 0.0 };
        let lat = terminator_latitude(0.0, &sun);
        assert!(lat.is_finite());
        assert_abs_diff_eq!(lat.abs(), 90.0, epsilon = 0.01);
    }

    #[test]
    fn curve_spans_raster_and_closes_on_the_lit_pole() {
        let june = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let curve = terminator_curve(june, 101, 50);
        let samples = &curve[..curve.len() - 2];
        assert_eq!(samples.first().unwrap().0, 0.0);
        assert_eq!(samples.last().unwrap().0, 101.0);
        assert_eq!(samples.len(), 52);
        assert_eq!(&curve[curve.len() - 2..], &[(101.0, 0.0), (0.0, 0.0)]);

        let december = Utc.with_ymd_and_hms(2024, 12, 21, 12, 0, 0).unwrap();
        let curve = terminator_curve(december, 100, 50);
        assert_eq!(curve.len(), 51 + 2);
        assert_eq!(&curve[curve.len() - 2..], &[(100.0, 50.0), (0.0, 50.0)]);
    }
}
