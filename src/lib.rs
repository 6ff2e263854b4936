//! Live tracking engine for a single orbiting station.
//!
//! Element sets are acquired through a cache with network and embedded
//! fallbacks, propagated with SGP4, converted to ground points and
//! composited onto an equirectangular day/night map.

pub mod assets;
pub mod cache;
pub mod compositor;
pub mod config;
pub mod earth;
pub mod error;
pub mod geodetic;
pub mod map_view;
pub mod projection;
pub mod propagator;
pub mod raster;
pub mod readout;
pub mod scheduler;
pub mod solar;
pub mod source;
pub mod store;
pub mod time;
pub mod tle;
pub mod visibility;

pub use error::{Result, TrackerError};
