use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;
pub const DEFAULT_EVENT_NAME: &str = "videometrics";

const INTERVAL_ENV: &str = "VIDEOMETRICS_INTERVAL_SECS";
const EVENT_NAME_ENV: &str = "VIDEOMETRICS_EVENT_NAME";

/// Tick period and name of the emitted custom event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub interval_secs: f64,
    pub event_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            event_name: DEFAULT_EVENT_NAME.into(),
        }
    }
}

impl TrackerConfig {
    pub fn new(interval_secs: f64, event_name: impl Into<String>) -> Self {
        Self {
            interval_secs,
            event_name: event_name.into(),
        }
        .sanitized()
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: TrackerConfig =
            serde_json::from_str(contents).context("Failed to parse tracker config")?;
        Ok(config.sanitized())
    }

    /// Defaults overridden by `VIDEOMETRICS_INTERVAL_SECS` and
    /// `VIDEOMETRICS_EVENT_NAME`. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var(INTERVAL_ENV) {
            if let Ok(secs) = value.trim().parse::<f64>() {
                config.interval_secs = secs;
            }
        }

        if let Ok(value) = std::env::var(EVENT_NAME_ENV) {
            config.event_name = value.trim().to_string();
        }

        config.sanitized()
    }

    /// Non-positive or non-finite intervals and blank event names fall back
    /// to the defaults.
    pub fn sanitized(mut self) -> Self {
        self.interval_secs = self.sanitized_interval();
        if self.event_name.trim().is_empty() {
            self.event_name = DEFAULT_EVENT_NAME.into();
        }
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.sanitized_interval())
    }

    fn sanitized_interval(&self) -> f64 {
        if self.interval_secs.is_finite() && self.interval_secs > 0.0 {
            self.interval_secs
        } else {
            DEFAULT_INTERVAL_SECS
        }
    }
}
