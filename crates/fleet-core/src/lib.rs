//! fleet-core: shared building blocks for the fleetgrid crates.
//!
//! Holds the `fleetd.toml` configuration model, the human duration
//! format used throughout the config (`"500ms"`, `"30s"`, `"5m"`), and
//! the injectable clock used by every component that reads wall time.

pub mod clock;
pub mod config;
pub mod duration;

pub use clock::{epoch_secs, system_clock, Clock, ManualClock};
pub use config::{
    ConfigError, FailoverConfig, FleetConfig, HealthConfig, LocalProcessConfig, RegistryConfig,
    ServerConfig, UpstreamConfig,
};
pub use duration::{format_duration, parse_duration};
