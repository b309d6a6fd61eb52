//! Thresholds used by the evaluator.

use std::time::Duration;

use fleet_core::HealthConfig;

/// Scoring thresholds. Built from `[health]` in fleetd.toml.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPolicy {
    /// Silence that costs 30 points.
    pub silence_after: Duration,
    /// Silence after which a non-critical worker is idle.
    pub idle_after: Duration,
    pub max_temperature: f64,
    pub max_power: f64,
    pub efficiency_floor: f64,
    pub max_rejection_rate: f64,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            silence_after: config.silence_after,
            idle_after: config.idle_after,
            max_temperature: config.max_temperature,
            max_power: config.max_power,
            efficiency_floor: config.efficiency_floor,
            max_rejection_rate: config.max_rejection_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_documented_thresholds() {
        let policy = HealthPolicy::default();
        assert_eq!(policy.silence_after, Duration::from_secs(300));
        assert_eq!(policy.idle_after, Duration::from_secs(120));
        assert_eq!(policy.max_temperature, 85.0);
        assert_eq!(policy.max_power, 300.0);
        assert_eq!(policy.efficiency_floor, 0.001);
        assert_eq!(policy.max_rejection_rate, 0.10);
    }
}
