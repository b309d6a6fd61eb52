//! Domain types for fleetgrid.
//!
//! Wire-facing types use camelCase field names so the same structs serve
//! worker messages, REST responses, and the persisted snapshot blob.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable identity of a worker.
pub type WorkerId = String;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Current snapshot blob format.
pub const SNAPSHOT_VERSION: u32 = 1;

// ── Worker ─────────────────────────────────────────────────────────

/// Host metadata reported by a worker at registration.
///
/// Only `hostname` and `hardwareId` carry meaning (they derive the worker
/// identity); everything else is kept as an opaque blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Total memory in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<String>,
    /// Anything else the worker chose to send.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Connectivity status, derived from silence and health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Online,
    Idle,
    Offline,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Online => "online",
            WorkerStatus::Idle => "idle",
            WorkerStatus::Offline => "offline",
        }
    }
}

/// Bucketed health score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthClassification {
    Healthy,
    Warning,
    Critical,
}

impl HealthClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthClassification::Healthy => "healthy",
            HealthClassification::Warning => "warning",
            HealthClassification::Critical => "critical",
        }
    }
}

/// Result of the last health evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerHealth {
    /// 0–100.
    pub score: u8,
    pub classification: HealthClassification,
    pub issues: Vec<String>,
    pub last_evaluated_at: Timestamp,
}

impl WorkerHealth {
    /// Health of a record that has not been evaluated yet.
    pub fn unevaluated(now: Timestamp) -> Self {
        Self {
            score: 100,
            classification: HealthClassification::Healthy,
            issues: Vec::new(),
            last_evaluated_at: now,
        }
    }
}

/// Last reported telemetry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMetrics {
    /// Work units per second.
    pub throughput: f64,
    /// Accepted units. Never decreases except by operator reset.
    pub accepted: u64,
    /// Rejected units. Never decreases except by operator reset.
    pub rejected: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

/// A connected (or once-connected) worker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub id: WorkerId,
    pub display_name: String,
    pub host_info: HostInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address: Option<String>,
    pub status: WorkerStatus,
    pub health: WorkerHealth,
    pub metrics: WorkerMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub first_seen_at: Timestamp,
    pub last_seen_at: Timestamp,
    /// Incremented on every mutation; used for optimistic writes.
    #[serde(default)]
    pub revision: u64,
}

// ── Upstream ───────────────────────────────────────────────────────

/// A candidate upstream the local process can connect to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamEndpoint {
    pub id: String,
    pub address: String,
    /// Lower is preferred.
    pub priority: u32,
    /// Opaque reference to credentials; never resolved here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<String>,
}

// ── Snapshot ───────────────────────────────────────────────────────

/// Persisted form of the worker registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    pub version: u32,
    pub saved_at: Timestamp,
    pub workers: Vec<WorkerRecord>,
}

impl RegistrySnapshot {
    pub fn new(saved_at: Timestamp, workers: Vec<WorkerRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at,
            workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_info_keeps_unknown_fields() {
        let json = r#"{"hostname":"rig-7","hardwareId":"abc","cores":16,"os":"linux"}"#;
        let info: HostInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.hostname.as_deref(), Some("rig-7"));
        assert_eq!(info.hardware_id.as_deref(), Some("abc"));
        assert_eq!(info.extra.get("cores"), Some(&serde_json::json!(16)));

        let back = serde_json::to_value(&info).unwrap();
        assert_eq!(back["cores"], 16);
        assert!(back.get("gpu").is_none());
    }

    #[test]
    fn status_and_classification_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&WorkerStatus::Offline).unwrap(),
            "\"offline\""
        );
        assert_eq!(
            serde_json::to_string(&HealthClassification::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(WorkerStatus::Idle.as_str(), "idle");
    }
}
