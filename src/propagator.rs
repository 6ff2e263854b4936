//! SGP4 propagation of the tracked element set.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;

use crate::error::{Result, TrackerError};
use crate::geodetic::{to_geodetic, Telemetry};
use crate::time::minutes_between;
use crate::tle::{elapsed_days, ElementSet};

/// Inertial (TEME) state at an instant. Position in km, velocity in km/s.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StateVector {
    pub position_eci: Vector3<f64>,
    pub velocity_eci: Vector3<f64>,
    pub time: DateTime<Utc>,
}

/// Anything that can place the tracked object on the ground at an instant.
pub trait GroundTrack {
    fn position_at(&self, time: DateTime<Utc>) -> Result<Telemetry>;
}

/// An element set initialised into the propagation model's working form.
///
/// Propagation is a pure function of the requested instant.
pub struct Propagator {
    constants: sgp4::Constants,
    epoch: DateTime<Utc>,
    norad_id: u64,
}

impl Propagator {
    pub fn new(element_set: &ElementSet) -> Result<Self> {
        let elements = element_set.elements()?;
        let constants = sgp4::Constants::from_elements(&elements)
            .map_err(|e| TrackerError::MalformedElementSet(e.to_string()))?;
        Ok(Self {
            constants,
            epoch: elements.datetime.and_utc(),
            norad_id: elements.norad_id,
        })
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn norad_id(&self) -> u64 {
        self.norad_id
    }

    /// Age of the element set at `now`, in days.
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        elapsed_days(self.epoch, now)
    }

    pub fn minutes_since_epoch(&self, time: DateTime<Utc>) -> f64 {
        minutes_between(self.epoch, time)
    }

    pub fn propagate(&self, time: DateTime<Utc>) -> Result<StateVector> {
        let minutes = self.minutes_since_epoch(time);
        let prediction = self
            .constants
            .propagate(sgp4::MinutesSinceEpoch(minutes))
            .map_err(|e| TrackerError::PropagationUnavailable { minutes, reason: e.to_string() })?;

        let position_eci = Vector3::from(prediction.position);
        let velocity_eci = Vector3::from(prediction.velocity);
        if !position_eci.iter().chain(velocity_eci.iter()).all(|v| v.is_finite()) {
            return Err(TrackerError::PropagationUnavailable {
                minutes,
                reason: "non-finite state".to_string(),
            });
        }
        Ok(StateVector { position_eci, velocity_eci, time })
    }

    /// Propagates and converts to a ground point in one step.
    pub fn ground_point(&self, time: DateTime<Utc>) -> Result<Telemetry> {
        Ok(to_geodetic(&self.propagate(time)?))
    }
}

impl GroundTrack for Propagator {
    fn position_at(&self, time: DateTime<Utc>) -> Result<Telemetry> {
        self.ground_point(time)
    }
}
