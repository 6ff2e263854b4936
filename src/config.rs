//! Runtime configuration.
//!
//! Loaded from a JSON file; every field has a default so partial files work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::asset_path;
use crate::error::{Result, TrackerError};

pub const CONFIG_ENV: &str = "ISS_TRACKER_CONFIG";
const APP_DIR: &str = "iss-tracker";

pub fn dirs_cache() -> PathBuf {
    std::env::var_os("HOME")
        .map(|h| PathBuf::from(h).join(".cache"))
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => PathBuf::from(path),
        None => dirs_cache().join(APP_DIR).join("config.json"),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub norad_id: u32,
    /// `{id}` is replaced by `norad_id`.
    pub primary_url: String,
    pub secondary_url: String,
    /// Service names shown while a source is being queried.
    pub primary_label: String,
    pub secondary_label: String,
    /// Prefix the secondary URL is form-encoded onto. `None` fetches directly.
    pub relay_url: Option<String>,
    pub http_timeout_secs: u64,
    pub max_cache_age_secs: i64,
    pub store_path: PathBuf,
    pub tick_interval_ms: i64,
    pub path_window_minutes: i64,
    pub horizon_radius_deg: f64,
    pub asset_dir: PathBuf,
    pub tile_url: String,
    pub map_zoom: u8,
    pub pan_duration_ms: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            norad_id: 25544,
            primary_url: "https://api.wheretheiss.at/v1/satellites/{id}/tles".to_string(),
            secondary_url: "https://celestrak.org/NORAD/elements/gp.php?CATNR={id}&FORMAT=TLE".to_string(),
            primary_label: "WhereTheIss".to_string(),
            secondary_label: "Celestrak".to_string(),
            relay_url: Some("https://corsproxy.io/?".to_string()),
            http_timeout_secs: 10,
            max_cache_age_secs: 2 * 60 * 60,
            store_path: dirs_cache().join(APP_DIR).join("store.json"),
            tick_interval_ms: 1000,
            path_window_minutes: 90,
            horizon_radius_deg: 18.0,
            asset_dir: asset_path("assets"),
            tile_url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
                .to_string(),
            map_zoom: 3,
            pan_duration_ms: 1000,
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| TrackerError::Config(format!("cannot read {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults with a warning when it is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                if path.exists() {
                    log::warn!("Ignoring config {:?}: {}", path, e);
                } else {
                    log::info!("No config at {:?}, using defaults", path);
                }
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| TrackerError::Store { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?).map_err(io_err)
    }

    fn validate(&self) -> Result<()> {
        if self.tick_interval_ms <= 0 {
            return Err(TrackerError::Config("tick_interval_ms must be positive".into()));
        }
        if self.path_window_minutes < 0 {
            return Err(TrackerError::Config("path_window_minutes must not be negative".into()));
        }
        if !(self.horizon_radius_deg > 0.0 && self.horizon_radius_deg < 90.0) {
            return Err(TrackerError::Config("horizon_radius_deg must be in (0, 90)".into()));
        }
        if self.map_zoom > 18 {
            return Err(TrackerError::Config("map_zoom must be at most 18".into()));
        }
        Ok(())
    }

    fn expand(&self, template: &str) -> String {
        template.replace("{id}", &self.norad_id.to_string())
    }

    pub fn primary_url(&self) -> String {
        self.expand(&self.primary_url)
    }

    pub fn secondary_url(&self) -> String {
        self.expand(&self.secondary_url)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn tick_interval(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.tick_interval_ms)
    }

    pub fn pan_duration(&self) -> Duration {
        Duration::from_millis(self.pan_duration_ms)
    }
}
