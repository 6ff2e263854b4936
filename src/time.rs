//! Time and astronomical calculations.
//!
//! Greenwich Mean Sidereal Time for the inertial-to-Earth-fixed rotation and
//! the calendar quantities the solar approximation is driven by.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::earth::SECONDS_PER_DAY;

pub const DAYS_PER_JULIAN_CENTURY: f64 = 36525.0;
pub const GMST_BASE_DEG: f64 = 280.46061837;
pub const GMST_ROTATION_PER_DAY: f64 = 360.98564736629;
pub const GMST_CORRECTION: f64 = 0.000387933;

/// 2000-01-01T12:00:00Z as Unix milliseconds.
const J2000_UNIX_MILLIS: i64 = 946_728_000_000;

/// Sidereal angle in radians, normalised into `[0, 2π)`.
///
/// Always derived from the absolute instant; the angle advances continuously
/// so it must never be cached across calls.
pub fn greenwich_mean_sidereal_time(timestamp: DateTime<Utc>) -> f64 {
    let days_since_j2000 =
        (timestamp.timestamp_millis() - J2000_UNIX_MILLIS) as f64 / (1000.0 * SECONDS_PER_DAY);
    let centuries = days_since_j2000 / DAYS_PER_JULIAN_CENTURY;
    let gmst_degrees = GMST_BASE_DEG
        + GMST_ROTATION_PER_DAY * days_since_j2000
        + GMST_CORRECTION * centuries * centuries
        - centuries * centuries * centuries / 38710000.0;
    gmst_degrees.rem_euclid(360.0).to_radians()
}

/// Fractional UTC hour of day at whole-second resolution.
pub fn utc_hours(timestamp: DateTime<Utc>) -> f64 {
    timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0 + timestamp.second() as f64 / 3600.0
}

/// 1-based UTC day of the year.
pub fn day_of_year(timestamp: DateTime<Utc>) -> u32 {
    timestamp.ordinal()
}

pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}
