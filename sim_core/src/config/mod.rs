//! Configuration loading from TOML files

mod constants;

pub use constants::CombatConstants;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Load a TOML file and deserialize it
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_toml(&content)
}

/// Load a TOML string and deserialize it
pub fn parse_toml<T: serde::de::DeserializeOwned>(content: &str) -> Result<T, ConfigError> {
    let config: T = toml::from_str(content)?;
    Ok(config)
}

/// Settings for one batch of simulated encounters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Encounter length; an iteration stops once simulated time reaches it
    #[serde(rename = "duration_secs", with = "secs")]
    pub duration: Duration,
    /// Number of independent iterations to run
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Base seed; iteration `i` is seeded with `seed + i`
    #[serde(default)]
    pub seed: u64,
    /// Keep an ordered log of every emitted event
    #[serde(default)]
    pub record_events: bool,
    #[serde(default)]
    pub constants: CombatConstants,
}

fn default_iterations() -> u64 {
    1000
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            duration: Duration::from_secs(180),
            iterations: default_iterations(),
            seed: 0,
            record_events: false,
            constants: CombatConstants::default(),
        }
    }
}

impl SimConfig {
    /// Config for a single encounter of the given length
    pub fn with_duration(secs: f64) -> Self {
        SimConfig {
            duration: Duration::from_secs_f64(secs),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration.is_zero() {
            return Err(ConfigError::ValidationError(
                "encounter duration must be positive".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(ConfigError::ValidationError(
                "at least one iteration is required".to_string(),
            ));
        }
        self.constants.validate()
    }
}

/// Serde adapter storing a `Duration` as floating-point seconds
pub mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Like [`secs`], for optional durations
pub mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        secs.map(|s| Duration::try_from_secs_f64(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
