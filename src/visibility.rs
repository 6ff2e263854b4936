//! Ground-observer horizon geometry.

pub const DEFAULT_HORIZON_RADIUS_DEG: f64 = 18.0;
pub const BEARING_STEP_DEG: usize = 5;

/// Observers further than this from the prime meridian also get a ring shifted a full turn.
pub const WRAP_THRESHOLD_DEG: f64 = 120.0;

/// Central angle in radians between two points given in radians.
fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().min(1.0).asin()
}

/// Great-circle separation in degrees between two `(lat, lon)` points in degrees.
pub fn great_circle_distance_deg(a: (f64, f64), b: (f64, f64)) -> f64 {
    haversine(
        a.0.to_radians(),
        a.1.to_radians(),
        b.0.to_radians(),
        b.1.to_radians(),
    )
    .to_degrees()
}

/// Point reached from `(lat, lon)` travelling `distance_deg` along the great circle at `bearing_deg`.
/// Longitude is left unwrapped relative to the start.
pub fn destination_point(lat: f64, lon: f64, bearing_deg: f64, distance_deg: f64) -> (f64, f64) {
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();
    let theta = bearing_deg.to_radians();
    let delta = distance_deg.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());
    (lambda2.to_degrees(), phi2.to_degrees())
}

/// Closed ring of `(lon, lat)` points at `radius_deg` around the observer,
/// one per bearing from 0° up to 360°. The last point repeats the first.
pub fn horizon_circle(observer_lat: f64, observer_lon: f64, radius_deg: f64) -> Vec<(f64, f64)> {
    let mut ring: Vec<(f64, f64)> = (0..360)
        .step_by(BEARING_STEP_DEG)
        .map(|bearing| destination_point(observer_lat, observer_lon, bearing as f64, radius_deg))
        .collect();
    if let Some(&first) = ring.first() {
        ring.push(first);
    }
    ring
}

/// True when a ring of `radius_deg` around the observer contains a pole.
/// Such a ring sweeps every longitude and cannot be drawn as one closed loop.
pub fn encloses_pole(observer_lat: f64, radius_deg: f64) -> bool {
    90.0 - observer_lat.abs() < radius_deg
}

/// Longitude shifts at which the horizon ring must be drawn so it stays
/// continuous across the ±180° seam.
pub fn wrap_offsets(observer_lon: f64) -> Vec<f64> {
    let mut offsets = vec![0.0];
    if observer_lon > WRAP_THRESHOLD_DEG {
        offsets.push(-360.0);
    } else if observer_lon < -WRAP_THRESHOLD_DEG {
        offsets.push(360.0);
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn distance_between_known_points() {
        assert_abs_diff_eq!(great_circle_distance_deg((0.0, 0.0), (0.0, 90.0)), 90.0, epsilon = 1e-9);
        assert_abs_diff_eq!(great_circle_distance_deg((90.0, 0.0), (-90.0, 0.0)), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(great_circle_distance_deg((10.0, 179.5), (10.0, -179.5)), 0.985, epsilon = 1e-3);
    }

    #[test]
    fn ring_is_closed_and_on_the_radius() {
        for &(lat, lon) in &[(0.0, 0.0), (51.6, -170.0), (-45.0, 175.0), (80.0, 30.0)] {
            let ring = horizon_circle(lat, lon, DEFAULT_HORIZON_RADIUS_DEG);
            assert_eq!(ring.len(), 73);
            let (first, last) = (ring[0], ring[72]);
            assert_abs_diff_eq!(first.0, last.0, epsilon = 1e-9);
            assert_abs_diff_eq!(first.1, last.1, epsilon = 1e-9);
            for &(plon, plat) in &ring {
                let d = great_circle_distance_deg((lat, lon), (plat, plon));
                assert!(d <= DEFAULT_HORIZON_RADIUS_DEG + 1e-6, "point {d} deg away");
                assert_abs_diff_eq!(d, DEFAULT_HORIZON_RADIUS_DEG, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn polar_ring_still_closes() {
        let ring = horizon_circle(80.0, 30.0, DEFAULT_HORIZON_RADIUS_DEG);
        assert!(encloses_pole(80.0, DEFAULT_HORIZON_RADIUS_DEG));
        assert_eq!(ring.first(), ring.last());
        // every longitude is swept exactly once
        let span: f64 = ring
            .windows(2)
            .map(|w| (w[1].0 - w[0].0 + 180.0).rem_euclid(360.0) - 180.0)
            .sum();
        assert_abs_diff_eq!(span.abs(), 360.0, epsilon = 1e-6);
    }

    #[test]
    fn pole_inside_ring_only_past_the_radius() {
        assert!(!encloses_pole(51.6, 18.0));
        assert!(!encloses_pole(-72.0, 18.0));
        assert!(encloses_pole(-72.5, 18.0));
        assert!(encloses_pole(0.0, 90.5));
    }

    #[test]
    fn ring_is_contiguous_across_the_seam() {
        let ring = horizon_circle(0.0, 175.0, DEFAULT_HORIZON_RADIUS_DEG);
        let max_lon = ring.iter().map(|p| p.0).fold(f64::MIN, f64::max);
        assert_abs_diff_eq!(max_lon, 193.0, epsilon = 1e-6);
        for pair in ring.windows(2) {
            assert!((pair[1].0 - pair[0].0).abs() < 5.0);
        }
    }

    #[test]
    fn due_north_first() {
        let ring = horizon_circle(10.0, 20.0, 18.0);
        assert_abs_diff_eq!(ring[0].1, 28.0, epsilon = 1e-9);
        assert_abs_diff_eq!(ring[0].0, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn duplicate_ring_only_near_the_seam() {
        assert_eq!(wrap_offsets(0.0), vec![0.0]);
        assert_eq!(wrap_offsets(120.0), vec![0.0]);
        assert_eq!(wrap_offsets(150.0), vec![0.0, -360.0]);
        assert_eq!(wrap_offsets(-150.0), vec![0.0, 360.0]);
    }
}
