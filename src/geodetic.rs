//! Inertial → Earth-fixed → geodetic conversion.

use chrono::{DateTime, Utc};
use nalgebra::{Rotation3, Vector3};
use serde::Serialize;

use crate::earth::{eccentricity_squared, EQUATORIAL_RADIUS_KM, SECONDS_PER_HOUR};
use crate::propagator::StateVector;
use crate::time::greenwich_mean_sidereal_time;

/// Published ground-point state of the tracked object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Telemetry {
    pub lat: f64,
    /// Degrees in `[-180, 180)`.
    pub lng: f64,
    pub alt_km: f64,
    pub speed_kmh: f64,
    pub time: DateTime<Utc>,
}

pub fn normalize_longitude(deg: f64) -> f64 {
    let lon = (deg + 180.0).rem_euclid(360.0) - 180.0;
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if lon >= 180.0 {
        lon - 360.0
    } else {
        lon
    }
}

/// Rotates an inertial position into the Earth-fixed frame at `time`.
///
/// The sidereal angle is recomputed from the absolute instant on every call.
pub fn eci_to_ecef(position: &Vector3<f64>, time: DateTime<Utc>) -> Vector3<f64> {
    let gmst = greenwich_mean_sidereal_time(time);
    Rotation3::from_axis_angle(&Vector3::z_axis(), -gmst) * position
}

/// Earth-fixed cartesian (km) → geodetic (lat °, lon °, height km) on WGS84.
pub fn ecef_to_geodetic(ecef: &Vector3<f64>) -> (f64, f64, f64) {
    let e2 = eccentricity_squared();
    let a = EQUATORIAL_RADIUS_KM;
    let p = (ecef.x * ecef.x + ecef.y * ecef.y).sqrt();
    let lon = ecef.y.atan2(ecef.x);

    let mut lat = ecef.z.atan2(p * (1.0 - e2));
    let mut height = 0.0;
    for _ in 0..10 {
        let sin_lat = lat.sin();
        let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        height = if lat.cos().abs() > 1e-3 {
            p / lat.cos() - n
        } else {
            ecef.z / sin_lat - n * (1.0 - e2)
        };
        let next = ecef.z.atan2(p * (1.0 - e2 * n / (n + height)));
        let done = (next - lat).abs() < 1e-12;
        lat = next;
        if done {
            break;
        }
    }
    (lat.to_degrees(), lon.to_degrees(), height)
}

pub fn to_geodetic(state: &StateVector) -> Telemetry {
    let ecef = eci_to_ecef(&state.position_eci, state.time);
    let (lat, lon, alt_km) = ecef_to_geodetic(&ecef);
    Telemetry {
        lat,
        lng: normalize_longitude(lon),
        alt_km,
        speed_kmh: state.velocity_eci.norm() * SECONDS_PER_HOUR,
        time: state.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagator::Propagator;
    use crate::tle::ElementSet;
    use crate::visibility::great_circle_distance_deg;
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    #[test]
    fn longitude_normalisation_is_half_open() {
        assert_abs_diff_eq!(normalize_longitude(180.0), -180.0);
        assert_abs_diff_eq!(normalize_longitude(-180.0), -180.0);
        assert_abs_diff_eq!(normalize_longitude(190.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(normalize_longitude(-540.0), -180.0);
        assert_abs_diff_eq!(normalize_longitude(359.5), -0.5, epsilon = 1e-12);
        assert!(normalize_longitude(-1e-15) < 180.0);
    }

    #[test]
    fn equatorial_point_has_zero_latitude() {
        let (lat, lon, h) = ecef_to_geodetic(&Vector3::new(EQUATORIAL_RADIUS_KM + 400.0, 0.0, 0.0));
        assert_abs_diff_eq!(lat, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(lon, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h, 400.0, epsilon = 1e-6);
    }

    #[test]
    fn polar_point_uses_polar_radius() {
        let (lat, _, h) = ecef_to_geodetic(&Vector3::new(0.0, 0.0, crate::earth::polar_radius_km() + 100.0));
        assert_abs_diff_eq!(lat, 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(h, 100.0, epsilon = 1e-6);
    }

    #[test]
    fn reference_ground_point_at_epoch() {
        let p = Propagator::new(&ElementSet::embedded()).unwrap();
        let t = p.ground_point(p.epoch()).unwrap();
        assert_abs_diff_eq!(t.lat, -7.3635, epsilon = 0.01);
        assert_abs_diff_eq!(t.lng, 45.5132, epsilon = 0.01);
        assert_abs_diff_eq!(t.alt_km, 421.303, epsilon = 1.0);
        assert_abs_diff_eq!(t.speed_kmh, 27571.13, epsilon = 5.0);
    }

    #[test]
    fn reference_ground_point_ten_hours_on() {
        let p = Propagator::new(&ElementSet::embedded()).unwrap();
        let t = p.ground_point(p.epoch() + Duration::minutes(600)).unwrap();
        assert_abs_diff_eq!(t.lat, 18.1519, epsilon = 0.01);
        assert_abs_diff_eq!(t.lng, 63.9247, epsilon = 0.01);
    }

    #[test]
    fn longitude_stays_in_range_over_a_day() {
        let p = Propagator::new(&ElementSet::embedded()).unwrap();
        for minute in (0..1440).step_by(7) {
            let t = p.ground_point(p.epoch() + Duration::minutes(minute)).unwrap();
            assert!((-180.0..180.0).contains(&t.lng), "lng {} at {}", t.lng, minute);
            assert!(t.lat.abs() < 52.0);
        }
    }

    #[test]
    fn ground_track_is_continuous() {
        let p = Propagator::new(&ElementSet::embedded()).unwrap();
        let start = p.epoch() + Duration::hours(5);
        let mut prev = p.ground_point(start).unwrap();
        for step in 1..=120 {
            let next = p.ground_point(start + Duration::seconds(step * 10)).unwrap();
            let moved = great_circle_distance_deg((prev.lat, prev.lng), (next.lat, next.lng));
            // ~7.2 km/s ground speed plus Earth rotation: well under 1 degree per 10 s
            assert!(moved < 1.0, "jumped {moved} degrees");
            assert!(moved > 0.3, "stalled at {moved} degrees");
            prev = next;
        }
    }
}
