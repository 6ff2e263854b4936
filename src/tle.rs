//! Two-Line Element (TLE) sets for the tracked station.
//!
//! An [`ElementSet`] is the two fixed-format element lines, validated on
//! construction. It is immutable and replaced wholesale on refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

/// Embedded element set used when neither the network nor the local store
/// can supply one. Stale, but always valid.
pub const EMBEDDED_LINE1: &str =
    "1 25544U 98067A   24060.00000000  .00016717  00000+0  10270-3 0  9996";
pub const EMBEDDED_LINE2: &str =
    "2 25544  51.6442 209.6558 0005013 100.1234 250.6789 15.49500000 12340";

pub const TLE_LINE_LENGTH: usize = 69;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSet {
    #[serde(rename = "l1")]
    line1: String,
    #[serde(rename = "l2")]
    line2: String,
}

/// Fractional days from `epoch` to `now`, negative when `now` is earlier.
pub fn elapsed_days(epoch: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - epoch).num_seconds() as f64 / crate::earth::SECONDS_PER_DAY
}

impl ElementSet {
    pub fn new(line1: &str, line2: &str) -> Result<Self> {
        let set = ElementSet {
            line1: line1.trim().to_string(),
            line2: line2.trim().to_string(),
        };
        set.validate()?;
        Ok(set)
    }

    pub fn embedded() -> Self {
        ElementSet {
            line1: EMBEDDED_LINE1.to_string(),
            line2: EMBEDDED_LINE2.to_string(),
        }
    }

    /// Extracts the element lines from a multi-line catalog response: the
    /// first trimmed line starting with `"1 "` and the first with `"2 "`.
    pub fn from_catalog_text(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let line1 = lines.iter().find(|l| l.starts_with("1 "));
        let line2 = lines.iter().find(|l| l.starts_with("2 "));
        match (line1, line2) {
            (Some(l1), Some(l2)) => Self::new(l1, l2),
            _ => Err(TrackerError::MalformedElementSet(
                "catalog response has no \"1 \"/\"2 \" line pair".to_string(),
            )),
        }
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    /// Parses the lines into the propagation model's element form.
    pub fn elements(&self) -> Result<sgp4::Elements> {
        sgp4::Elements::from_tle(None, self.line1.as_bytes(), self.line2.as_bytes())
            .map_err(|e| TrackerError::MalformedElementSet(e.to_string()))
    }

    pub fn norad_id(&self) -> Result<u64> {
        Ok(self.elements()?.norad_id)
    }

    pub fn epoch(&self) -> Result<DateTime<Utc>> {
        Ok(self.elements()?.datetime.and_utc())
    }

    /// Days elapsed between the element epoch and `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> Result<f64> {
        Ok(elapsed_days(self.epoch()?, now))
    }

    fn validate(&self) -> Result<()> {
        for (index, line) in [&self.line1, &self.line2].into_iter().enumerate() {
            let expected = if index == 0 { "1 " } else { "2 " };
            if !line.starts_with(expected) {
                return Err(TrackerError::MalformedElementSet(format!(
                    "line {} must start with {:?}",
                    index + 1,
                    expected
                )));
            }
            if line.len() != TLE_LINE_LENGTH {
                return Err(TrackerError::MalformedElementSet(format!(
                    "line {} has {} columns, expected {}",
                    index + 1,
                    line.len(),
                    TLE_LINE_LENGTH
                )));
            }
            let stated = line.as_bytes()[TLE_LINE_LENGTH - 1];
            if !stated.is_ascii_digit() || u32::from(stated - b'0') != checksum(line) {
                return Err(TrackerError::MalformedElementSet(format!(
                    "line {} fails its checksum",
                    index + 1
                )));
            }
        }
        if self.line1.get(2..7) != self.line2.get(2..7) {
            return Err(TrackerError::MalformedElementSet(
                "catalog numbers of the two lines differ".to_string(),
            ));
        }
        self.elements().map(|_| ())
    }
}

/// Modulo-10 sum of the digits in the first 68 columns, minus signs counting as 1.
pub fn checksum(line: &str) -> u32 {
    line.bytes()
        .take(TLE_LINE_LENGTH - 1)
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum::<u32>()
        % 10
}
