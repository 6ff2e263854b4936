//! Equirectangular lon/lat → raster mapping.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equirectangular {
    pub width: f64,
    pub height: f64,
}

impl Equirectangular {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 2:1 raster for the given width.
    pub fn for_width(width: f64) -> Self {
        Self::new(width, width / 2.0)
    }

    /// Wrapped mapping, always inside `[0, width)`.
    pub fn lon_to_x(&self, lon: f64) -> f64 {
        (lon + 180.0).rem_euclid(360.0) * (self.width / 360.0)
    }

    /// Unwrapped mapping for geometry that must stay contiguous across the seam.
    pub fn lon_to_x_raw(&self, lon: f64) -> f64 {
        (lon + 180.0) * (self.width / 360.0)
    }

    pub fn lat_to_y(&self, lat: f64) -> f64 {
        (90.0 - lat) * (self.height / 180.0)
    }

    pub fn x_to_lon(&self, x: f64) -> f64 {
        x / self.width * 360.0 - 180.0
    }

    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (self.lon_to_x(lon), self.lat_to_y(lat))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn corners_and_centre() {
        let p = Equirectangular::for_width(720.0);
        assert_eq!(p.height, 360.0);
        assert_abs_diff_eq!(p.lon_to_x(-180.0), 0.0);
        assert_abs_diff_eq!(p.lon_to_x(0.0), 360.0);
        assert_abs_diff_eq!(p.lon_to_x(180.0), 0.0);
        assert_abs_diff_eq!(p.lat_to_y(90.0), 0.0);
        assert_abs_diff_eq!(p.lat_to_y(-90.0), 360.0);
        assert_abs_diff_eq!(p.lat_to_y(0.0), 180.0);
    }

    #[test]
    fn raw_mapping_does_not_wrap() {
        let p = Equirectangular::for_width(360.0);
        assert_abs_diff_eq!(p.lon_to_x_raw(190.0), 370.0);
        assert_abs_diff_eq!(p.lon_to_x(190.0), 10.0);
        assert_abs_diff_eq!(p.lon_to_x_raw(-200.0), -20.0);
        assert_abs_diff_eq!(p.lon_to_x(-200.0), 340.0);
    }

    #[test]
    fn x_to_lon_inverts_raw_mapping() {
        let p = Equirectangular::for_width(1000.0);
        assert_abs_diff_eq!(p.x_to_lon(p.lon_to_x_raw(123.4)), 123.4, epsilon = 1e-9);
    }
}
