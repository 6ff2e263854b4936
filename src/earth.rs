//! Earth figure constants used by the frame transform.

pub const EQUATORIAL_RADIUS_KM: f64 = 6378.137;
pub const FLATTENING: f64 = 1.0 / 298.257223563;

pub const SECONDS_PER_DAY: f64 = 86400.0;
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// First eccentricity squared of the reference ellipsoid.
pub fn eccentricity_squared() -> f64 {
    FLATTENING * (2.0 - FLATTENING)
}

pub fn polar_radius_km() -> f64 {
    EQUATORIAL_RADIUS_KM * (1.0 - FLATTENING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn polar_radius_matches_wgs84() {
        assert_abs_diff_eq!(polar_radius_km(), 6356.752, epsilon = 1e-3);
    }
}
