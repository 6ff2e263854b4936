//! Text formatting for the numeric telemetry panel.

use chrono::{DateTime, Utc};

use crate::geodetic::Telemetry;
use crate::propagator::Propagator;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Readout {
    pub latitude: String,
    pub longitude: String,
    pub altitude: String,
    pub speed: String,
    pub time: String,
}

fn hemisphere(value: f64, positive: char, negative: char) -> String {
    let side = if value >= 0.0 { positive } else { negative };
    format!("{:.1} {}", value.abs(), side)
}

impl Readout {
    pub fn from_telemetry(t: &Telemetry) -> Self {
        Self {
            latitude: hemisphere(t.lat, 'N', 'S'),
            longitude: hemisphere(t.lng, 'E', 'W'),
            altitude: format!("{:.0} km", t.alt_km),
            speed: format!("{:.0} km/h", t.speed_kmh),
            time: t.time.format("%a, %d %b %Y %H:%M:%S").to_string(),
        }
    }

    /// Label/value pairs in display order.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("Latitude", self.latitude.as_str()),
            ("Longitude", self.longitude.as_str()),
            ("Altitude", self.altitude.as_str()),
            ("Speed", self.speed.as_str()),
        ]
    }
}

/// One-line description of the element set in use.
pub fn element_summary(propagator: &Propagator, now: DateTime<Utc>) -> String {
    format!(
        "NORAD {} | epoch {} | {:.1} d old",
        propagator.norad_id(),
        propagator.epoch().format("%Y-%m-%d %H:%M UTC"),
        propagator.age_days(now)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tle::ElementSet;
    use chrono::TimeZone;

    #[test]
    fn southern_western_point() {
        let t = Telemetry {
            lat: -51.63,
            lng: -0.04,
            alt_km: 417.49,
            speed_kmh: 27583.6,
            time: Utc.with_ymd_and_hms(2024, 2, 29, 7, 5, 9).unwrap(),
        };
        let r = Readout::from_telemetry(&t);
        assert_eq!(r.latitude, "51.6 S");
        assert_eq!(r.longitude, "0.0 W");
        assert_eq!(r.altitude, "417 km");
        assert_eq!(r.speed, "27584 km/h");
        assert_eq!(r.time, "Thu, 29 Feb 2024 07:05:09");
        assert_eq!(r.fields()[0], ("Latitude", "51.6 S"));
    }

    #[test]
    fn equator_and_prime_meridian_are_north_east() {
        let t = Telemetry {
            lat: 0.0,
            lng: 0.0,
            alt_km: 0.0,
            speed_kmh: 0.0,
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        let r = Readout::from_telemetry(&t);
        assert_eq!((r.latitude.as_str(), r.longitude.as_str()), ("0.0 N", "0.0 E"));
    }

    #[test]
    fn summary_names_object_and_age() {
        let p = Propagator::new(&ElementSet::embedded()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        assert_eq!(element_summary(&p, now), "NORAD 25544 | epoch 2024-02-29 00:00 UTC | 2.5 d old");
    }
}
