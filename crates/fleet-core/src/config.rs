//! fleetd.toml configuration parser.
//!
//! Every section is optional; omitted values fall back to the documented
//! defaults. Durations use the human format from [`crate::duration`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::serde_str;

/// Configuration validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one [[failover.upstreams]] entry is required")]
    NoUpstreams,

    #[error("duplicate upstream id: {0}")]
    DuplicateUpstream(String),

    #[error("upstream {0} has an empty address")]
    EmptyAddress(String),

    #[error("failover.failure_threshold must be at least 1")]
    ZeroThreshold,

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("health.{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
        max: String,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub health: HealthConfig,
    pub failover: FailoverConfig,
    pub local_process: Option<LocalProcessConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8450,
            data_dir: PathBuf::from("/var/lib/fleetgrid"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Silence after which the sweep forces a worker offline.
    #[serde(with = "serde_str")]
    pub stale_threshold: Duration,
    /// How often the staleness sweep runs.
    #[serde(with = "serde_str")]
    pub sweep_interval: Duration,
    /// How often a fleet snapshot event is published.
    #[serde(with = "serde_str")]
    pub snapshot_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            stale_threshold: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(60),
            snapshot_interval: Duration::from_secs(30),
        }
    }
}

/// Health scoring thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HealthConfig {
    #[serde(with = "serde_str")]
    pub silence_after: Duration,
    #[serde(with = "serde_str")]
    pub idle_after: Duration,
    pub max_temperature: f64,
    pub max_power: f64,
    /// Minimum throughput per watt before "low efficiency" is flagged.
    pub efficiency_floor: f64,
    pub max_rejection_rate: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            silence_after: Duration::from_secs(5 * 60),
            idle_after: Duration::from_secs(2 * 60),
            max_temperature: 85.0,
            max_power: 300.0,
            efficiency_floor: 0.001,
            max_rejection_rate: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FailoverConfig {
    /// Consecutive failures that make a rotation due.
    pub failure_threshold: u32,
    /// Minimum time between two automatic rotations.
    #[serde(with = "serde_str")]
    pub cooldown: Duration,
    /// Failure lines are ignored for this long after a restart.
    #[serde(with = "serde_str")]
    pub settle_delay: Duration,
    /// Substrings (case-insensitive) that mark a local output line as a
    /// connection failure.
    pub failure_patterns: Vec<String>,
    /// Substrings (case-insensitive) that mark a line as upstream success.
    /// A success resets the failure count.
    pub success_patterns: Vec<String>,
    pub upstreams: Vec<UpstreamConfig>,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            failure_patterns: default_failure_patterns(),
            success_patterns: vec!["accepted".to_string()],
            upstreams: Vec::new(),
        }
    }
}

fn default_failure_patterns() -> Vec<String> {
    ["timeout", "timed out", "refused", "unreachable", "connection failed"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub credential_ref: Option<String>,
}

/// The local process restarted on every upstream rotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalProcessConfig {
    pub command: String,
    /// Arguments; `{upstream}` and `{credential}` are substituted.
    #[serde(default)]
    pub args: Vec<String>,
}

impl FleetConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: FleetConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let failover = &self.failover;
        if failover.upstreams.is_empty() {
            return Err(ConfigError::NoUpstreams);
        }
        let mut seen = HashSet::new();
        for upstream in &failover.upstreams {
            if !seen.insert(upstream.id.as_str()) {
                return Err(ConfigError::DuplicateUpstream(upstream.id.clone()));
            }
            if upstream.address.trim().is_empty() {
                return Err(ConfigError::EmptyAddress(upstream.id.clone()));
            }
        }
        if failover.failure_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }

        let registry = &self.registry;
        for (field, value) in [
            ("registry.stale_threshold", registry.stale_threshold),
            ("registry.sweep_interval", registry.sweep_interval),
            ("registry.snapshot_interval", registry.snapshot_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        let rate = self.health.max_rejection_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::OutOfRange {
                field: "max_rejection_rate",
                value: rate.to_string(),
                min: "0".to_string(),
                max: "1".to_string(),
            });
        }
        Ok(())
    }
}
