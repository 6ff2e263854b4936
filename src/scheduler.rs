//! Fixed-interval telemetry publication.
//!
//! The scheduler is the single writer of the current element set and the
//! current telemetry. The host loop calls [`TelemetryScheduler::poll`] as
//! often as it likes; a tick runs at most once per interval.

use std::sync::mpsc;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::geodetic::Telemetry;
use crate::propagator::Propagator;
use crate::tle::ElementSet;

pub const DEFAULT_TICK_INTERVAL_MS: i64 = 1000;

pub struct TelemetryScheduler {
    element_set: Option<ElementSet>,
    propagator: Option<Propagator>,
    latest: Option<Telemetry>,
    subscribers: Vec<mpsc::Sender<Telemetry>>,
    interval: Duration,
    next_tick: Option<DateTime<Utc>>,
}

impl Default for TelemetryScheduler {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_TICK_INTERVAL_MS))
    }
}

impl TelemetryScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            element_set: None,
            propagator: None,
            latest: None,
            subscribers: Vec::new(),
            interval,
            next_tick: None,
        }
    }

    /// Replaces the element set wholesale. The next poll ticks immediately.
    pub fn install(&mut self, element_set: ElementSet, now: DateTime<Utc>) -> Result<()> {
        let propagator = Propagator::new(&element_set)?;
        log::info!(
            "Tracking NORAD {} with elements from {} ({:.1} days old)",
            propagator.norad_id(),
            propagator.epoch(),
            propagator.age_days(now)
        );
        self.element_set = Some(element_set);
        self.propagator = Some(propagator);
        self.next_tick = None;
        Ok(())
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<Telemetry> {
        let (tx, rx) = mpsc::channel();
        if let Some(latest) = self.latest {
            let _ = tx.send(latest);
        }
        self.subscribers.push(tx);
        rx
    }

    /// Propagates to `now` and publishes. Returns `None`, leaving the
    /// previous telemetry current, when there is nothing to propagate or the
    /// model cannot reach `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<Telemetry> {
        let propagator = self.propagator.as_ref()?;
        let telemetry = match propagator.ground_point(now) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("Skipping telemetry tick: {}", e);
                return None;
            }
        };
        self.latest = Some(telemetry);
        self.subscribers.retain(|tx| tx.send(telemetry).is_ok());
        Some(telemetry)
    }

    /// Ticks if the interval has elapsed since the previous tick.
    pub fn poll(&mut self, now: DateTime<Utc>) -> Option<Telemetry> {
        if self.next_tick.is_some_and(|due| now < due) || self.propagator.is_none() {
            return None;
        }
        self.next_tick = Some(now + self.interval);
        self.tick(now)
    }

    /// Time until the next tick is due, for scheduling repaints.
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Duration {
        match self.next_tick {
            Some(due) if due > now => due - now,
            _ => Duration::zero(),
        }
    }

    pub fn latest(&self) -> Option<&Telemetry> {
        self.latest.as_ref()
    }

    pub fn element_set(&self) -> Option<&ElementSet> {
        self.element_set.as_ref()
    }

    pub fn propagator(&self) -> Option<&Propagator> {
        self.propagator.as_ref()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn installed() -> TelemetryScheduler {
        let mut s = TelemetryScheduler::default();
        s.install(ElementSet::embedded(), t0()).unwrap();
        s
    }

    #[test]
    fn nothing_published_without_elements() {
        let mut s = TelemetryScheduler::default();
        assert!(s.poll(t0()).is_none());
        assert!(s.tick(t0()).is_none());
        assert!(s.latest().is_none());
    }

    #[test]
    fn poll_ticks_once_per_interval() {
        let mut s = installed();
        let first = s.poll(t0()).unwrap();
        assert_eq!(first.time, t0());
        assert!(s.poll(t0() + Duration::milliseconds(400)).is_none());
        assert_eq!(s.time_until_next(t0() + Duration::milliseconds(400)), Duration::milliseconds(600));
        let second = s.poll(t0() + Duration::milliseconds(1000)).unwrap();
        assert_eq!(s.latest(), Some(&second));
        assert_ne!(first.lng, second.lng);
    }

    #[test]
    fn subscribers_receive_every_tick_in_order() {
        let mut s = installed();
        let rx = s.subscribe();
        let times: Vec<_> = (0..3).map(|i| t0() + Duration::seconds(i)).collect();
        for &t in &times {
            s.tick(t);
        }
        let received: Vec<_> = rx.try_iter().map(|t| t.time).collect();
        assert_eq!(received, times);
    }

    #[test]
    fn late_subscriber_gets_current_state() {
        let mut s = installed();
        s.tick(t0());
        let rx = s.subscribe();
        assert_eq!(rx.try_recv().unwrap().time, t0());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut s = installed();
        let kept = s.subscribe();
        drop(s.subscribe());
        assert_eq!(s.subscriber_count(), 2);
        s.tick(t0());
        assert_eq!(s.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn reinstall_forces_immediate_tick() {
        let mut s = installed();
        s.poll(t0()).unwrap();
        s.install(ElementSet::embedded(), t0()).unwrap();
        assert!(s.poll(t0() + Duration::milliseconds(10)).is_some());
        assert_eq!(s.element_set(), Some(&ElementSet::embedded()));
    }
}
