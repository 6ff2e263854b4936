//! Network sources for element sets.
//!
//! The primary source is a per-object telemetry API answering with a JSON
//! object that carries both element lines. The secondary is a general
//! element catalog answering with plain multi-line text, fetched through a
//! relay prefix when one is configured.

use std::time::Duration;

use serde::Deserialize;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::tle::ElementSet;

pub trait ElementSource: Send {
    /// Short label used in status text and logs.
    fn name(&self) -> &str;
    fn fetch(&self) -> Result<ElementSet>;
}

fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn get_text(agent: &ureq::Agent, source_name: &str, url: &str) -> Result<String> {
    log::debug!("GET {}", url);
    agent
        .get(url)
        .call()
        .map_err(|e| TrackerError::network(source_name, e))?
        .into_string()
        .map_err(|e| TrackerError::network(source_name, e))
}

#[derive(Deserialize)]
struct TelemetryApiBody {
    line1: String,
    line2: String,
}

/// Parses the primary source's `{line1, line2}` body.
pub fn parse_telemetry_api_body(body: &str) -> Result<ElementSet> {
    let parsed: TelemetryApiBody = serde_json::from_str(body)
        .map_err(|e| TrackerError::MalformedElementSet(format!("unexpected response body: {}", e)))?;
    ElementSet::new(&parsed.line1, &parsed.line2)
}

pub struct TelemetryApiSource {
    label: String,
    url: String,
    agent: ureq::Agent,
}

impl TelemetryApiSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { label: "primary".to_string(), url: url.into(), agent: http_agent(timeout) }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.primary_url(), config.http_timeout()).with_label(&config.primary_label)
    }
}

impl ElementSource for TelemetryApiSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<ElementSet> {
        let body = get_text(&self.agent, self.name(), &self.url)?;
        parse_telemetry_api_body(&body)
    }
}

pub struct CatalogSource {
    label: String,
    url: String,
    relay: Option<String>,
    agent: ureq::Agent,
}

impl CatalogSource {
    pub fn new(url: impl Into<String>, relay: Option<String>, timeout: Duration) -> Self {
        Self { label: "secondary".to_string(), url: url.into(), relay, agent: http_agent(timeout) }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.secondary_url(), config.relay_url.clone(), config.http_timeout())
            .with_label(&config.secondary_label)
    }

    /// The URL actually requested: the catalog URL, form-encoded behind the relay prefix if any.
    pub fn request_url(&self) -> String {
        match &self.relay {
            Some(prefix) => {
                let encoded: String = url::form_urlencoded::byte_serialize(self.url.as_bytes()).collect();
                format!("{}{}", prefix, encoded)
            }
            None => self.url.clone(),
        }
    }
}

impl ElementSource for CatalogSource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fetch(&self) -> Result<ElementSet> {
        let body = get_text(&self.agent, self.name(), &self.request_url())?;
        ElementSet::from_catalog_text(&body)
    }
}
