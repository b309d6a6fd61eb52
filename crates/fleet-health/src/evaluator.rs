//! Health scoring and status derivation.

use std::time::Duration;

use fleet_state::{HealthClassification, Timestamp, WorkerHealth, WorkerRecord, WorkerStatus};

use crate::policy::HealthPolicy;

const SILENCE_PENALTY: i32 = 30;
const TEMPERATURE_PENALTY: i32 = 20;
const POWER_PENALTY: i32 = 15;
const EFFICIENCY_PENALTY: i32 = 10;
const REJECTION_PENALTY: i32 = 15;

pub const ISSUE_HIGH_TEMPERATURE: &str = "high temperature";
pub const ISSUE_HIGH_POWER: &str = "high power consumption";
pub const ISSUE_LOW_EFFICIENCY: &str = "low efficiency";
pub const ISSUE_HIGH_REJECTION: &str = "high rejection rate";

/// Score a worker as of `now`.
///
/// Issues are ordered by check: silence, temperature, power, efficiency,
/// rejection rate.
pub fn evaluate(record: &WorkerRecord, now: Timestamp, policy: &HealthPolicy) -> WorkerHealth {
    let mut score: i32 = 100;
    let mut issues = Vec::new();
    let metrics = &record.metrics;

    let silence = now.saturating_sub(record.last_seen_at);
    if silence > policy.silence_after.as_secs() {
        issues.push(format!(
            "no communication for {}",
            silence_phrase(policy.silence_after)
        ));
        score -= SILENCE_PENALTY;
    }

    if metrics.temperature.is_some_and(|t| t > policy.max_temperature) {
        issues.push(ISSUE_HIGH_TEMPERATURE.to_string());
        score -= TEMPERATURE_PENALTY;
    }

    let power = metrics.power.unwrap_or(0.0);
    if power > policy.max_power {
        issues.push(ISSUE_HIGH_POWER.to_string());
        score -= POWER_PENALTY;
    }

    if metrics.throughput > 0.0 && power > 0.0 && metrics.throughput / power < policy.efficiency_floor
    {
        issues.push(ISSUE_LOW_EFFICIENCY.to_string());
        score -= EFFICIENCY_PENALTY;
    }

    let submitted = metrics.accepted + metrics.rejected;
    if submitted > 0 && metrics.rejected as f64 / submitted as f64 > policy.max_rejection_rate {
        issues.push(ISSUE_HIGH_REJECTION.to_string());
        score -= REJECTION_PENALTY;
    }

    let score = score.clamp(0, 100) as u8;
    WorkerHealth {
        score,
        classification: classify(score),
        issues,
        last_evaluated_at: now,
    }
}

/// Map a score onto its classification.
pub fn classify(score: u8) -> HealthClassification {
    if score > 80 {
        HealthClassification::Healthy
    } else if score > 50 {
        HealthClassification::Warning
    } else {
        HealthClassification::Critical
    }
}

/// Derive connectivity status from health and silence.
///
/// Never returns `Offline` for silence alone; that transition belongs to
/// the staleness sweep.
pub fn derive_status(
    classification: HealthClassification,
    last_seen_at: Timestamp,
    now: Timestamp,
    policy: &HealthPolicy,
) -> WorkerStatus {
    if classification == HealthClassification::Critical {
        WorkerStatus::Offline
    } else if now.saturating_sub(last_seen_at) > policy.idle_after.as_secs() {
        WorkerStatus::Idle
    } else {
        WorkerStatus::Online
    }
}

/// Issue appended by the staleness sweep.
pub fn stale_issue(stale_threshold: Duration) -> String {
    format!("stale: no communication for {}", silence_phrase(stale_threshold))
}

fn silence_phrase(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}+ minutes", secs / 60)
    } else {
        format!("{secs}+ seconds")
    }
}
