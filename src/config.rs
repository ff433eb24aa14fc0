//! Ring and telemetry settings.
//!
//! Settings load from TOML and can be overridden from the environment:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CHORD_BITS` | `4` | Identifier space bit width |
//! | `CHORD_REPLICATION_FACTOR` | `3` | Predecessors receiving each write |
//! | `CHORD_MAX_HOPS` | node count + 1 | Routing hop budget |
//! | `CHORD_LOG_JSON` | `false` | Emit JSON log lines |

use crate::error::ConfigError;
use crate::ring::MAX_BIT_WIDTH;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Shape of the ring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Ring has `2^bit_width` positions
    pub bit_width: u32,
    /// Number of predecessor nodes receiving a copy of each write
    pub replication_factor: usize,
    /// Upper bound on routing hops; `None` uses node count + 1
    pub max_hops: Option<usize>,
}

impl Default for RingConfig {
    fn default() -> Self {
        RingConfig {
            bit_width: 4,
            replication_factor: 3,
            max_hops: None,
        }
    }
}

impl RingConfig {
    pub fn new(bit_width: u32) -> Self {
        RingConfig {
            bit_width,
            ..Default::default()
        }
    }

    pub fn with_replication_factor(mut self, rf: usize) -> Self {
        self.replication_factor = rf;
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn ring_size(&self) -> u64 {
        1u64 << self.bit_width.min(MAX_BIT_WIDTH)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_width == 0 || self.bit_width > MAX_BIT_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "bit_width must be in 1..={}, got {}",
                MAX_BIT_WIDTH, self.bit_width
            )));
        }
        if self.max_hops == Some(0) {
            return Err(ConfigError::Invalid("max_hops must be positive".into()));
        }
        Ok(())
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Default filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON instead of human-readable lines
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub ring: RingConfig,
    pub telemetry: TelemetryConfig,
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(raw)?;
        settings.ring.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Defaults with `CHORD_*` environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bits) = lookup("CHORD_BITS") {
            self.ring.bit_width = parse_var("CHORD_BITS", &bits)?;
        }
        if let Some(rf) = lookup("CHORD_REPLICATION_FACTOR") {
            self.ring.replication_factor = parse_var("CHORD_REPLICATION_FACTOR", &rf)?;
        }
        if let Some(hops) = lookup("CHORD_MAX_HOPS") {
            self.ring.max_hops = Some(parse_var("CHORD_MAX_HOPS", &hops)?);
        }
        if let Some(json) = lookup("CHORD_LOG_JSON") {
            self.telemetry.json = parse_var("CHORD_LOG_JSON", &json)?;
        }
        self.ring.validate()?;
        Ok(self)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{} has invalid value {:?}", name, raw)))
}
