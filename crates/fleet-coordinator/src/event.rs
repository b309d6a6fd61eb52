//! Events published to external subscribers (dashboards, log shippers).

use serde::Serialize;

use fleet_failover::Rotation;
use fleet_registry::FleetSnapshot;
use fleet_state::WorkerId;

/// Something observable happened in the fleet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FleetEvent {
    #[serde(rename_all = "camelCase")]
    WorkerRegistered { worker_id: WorkerId, display_name: String, created: bool },
    /// The worker's channel closed. Its status is left to the sweep.
    #[serde(rename_all = "camelCase")]
    WorkerDisconnected { worker_id: WorkerId },
    #[serde(rename_all = "camelCase")]
    WorkersStale { count: usize },
    SnapshotUpdated { snapshot: FleetSnapshot },
    UpstreamRotated { rotation: Rotation },
    #[serde(rename_all = "camelCase")]
    RotationSuppressed { upstream: String, failures: u32, retry_in_secs: u64 },
    #[serde(rename_all = "camelCase")]
    UpstreamExhausted { tried: usize, last_upstream: String },
}

impl FleetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WorkerRegistered { .. } => "workerRegistered",
            Self::WorkerDisconnected { .. } => "workerDisconnected",
            Self::WorkersStale { .. } => "workersStale",
            Self::SnapshotUpdated { .. } => "snapshotUpdated",
            Self::UpstreamRotated { .. } => "upstreamRotated",
            Self::RotationSuppressed { .. } => "rotationSuppressed",
            Self::UpstreamExhausted { .. } => "upstreamExhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(FleetEvent::WorkerDisconnected {
            worker_id: "worker-1".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "workerDisconnected");
        assert_eq!(json["workerId"], "worker-1");

        let json = serde_json::to_value(FleetEvent::RotationSuppressed {
            upstream: "pool-a".into(),
            failures: 3,
            retry_in_secs: 27,
        })
        .unwrap();
        assert_eq!(json["retryInSecs"], 27);
        assert_eq!(json["event"], FleetEvent::RotationSuppressed {
            upstream: String::new(),
            failures: 0,
            retry_in_secs: 0,
        }
        .name());
    }
}
