//! Typed settings for the replay driver
//!
//! These live in the `[driver]` table of the same configuration file the
//! bus is loaded from. Everything else in that file is left to the bus.

use crate::error::{FlightError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default control/fusion tick rate in Hz
pub const DEFAULT_RATE_HZ: f64 = 50.0;

fn default_rate_hz() -> f64 {
    DEFAULT_RATE_HZ
}

fn default_log_filter() -> String {
    "info,flightcore=debug".to_string()
}

/// Settings consumed by the binary, not by the flight core itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSettings {
    /// Scheduler rate in Hz
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,

    /// Stop after this many ticks (0 = run until the replay ends)
    #[serde(default)]
    pub max_ticks: u64,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Also write logs to this file (non-blocking)
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Write remote-link telemetry frames here as JSON lines
    #[serde(default)]
    pub remote_link_path: Option<PathBuf>,

    /// Write logging telemetry frames here as JSON lines
    #[serde(default)]
    pub logging_path: Option<PathBuf>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            rate_hz: DEFAULT_RATE_HZ,
            max_ticks: 0,
            log_filter: default_log_filter(),
            log_path: None,
            remote_link_path: None,
            logging_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    driver: DriverSettings,
}

impl DriverSettings {
    /// Tick period in seconds, falling back to the default rate when the
    /// configured one is unusable.
    pub fn dt(&self) -> f64 {
        if self.rate_hz.is_finite() && self.rate_hz > 0.0 {
            1.0 / self.rate_hz
        } else {
            1.0 / DEFAULT_RATE_HZ
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(text)?;
        Ok(file.driver)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let file: SettingsFile = serde_json::from_str(text)?;
        Ok(file.driver)
    }

    /// Load the `[driver]` table from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            FlightError::Config(format!("Failed to read settings {:?}: {}", path, e))
        })?;

        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        };
        parsed.map_err(|e| FlightError::Config(format!("Failed to parse settings {:?}: {}", path, e)))
    }
}
