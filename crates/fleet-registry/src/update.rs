//! Inputs to registry operations.

use std::collections::BTreeMap;

use fleet_state::{HealthClassification, HostInfo, WorkerRecord, WorkerStatus};

/// A worker announcing itself.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub host_info: HostInfo,
    pub source_address: Option<String>,
    pub display_name: Option<String>,
    /// Applied only if the worker has no group yet.
    pub group: Option<String>,
    /// Added to existing labels; existing keys win.
    pub labels: BTreeMap<String, String>,
}

impl Registration {
    pub fn new(host_info: HostInfo) -> Self {
        Self {
            host_info,
            ..Default::default()
        }
    }

    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}

/// A partial update from a worker message.
///
/// `None` fields are left untouched. Counter totals reported by the worker
/// are applied as `max(current, reported)` so a restarted worker cannot
/// move them backwards; increments are added afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerUpdate {
    pub display_name: Option<String>,
    pub throughput: Option<f64>,
    pub temperature: Option<f64>,
    pub power: Option<f64>,
    pub reported_accepted: Option<u64>,
    pub reported_rejected: Option<u64>,
    pub accepted_increment: u64,
    pub rejected_increment: u64,
}

impl WorkerUpdate {
    /// Touch `last_seen_at` only.
    pub fn heartbeat() -> Self {
        Self::default()
    }

    /// One unit found, accepted or rejected upstream.
    pub fn unit_found(accepted: bool) -> Self {
        if accepted {
            Self {
                accepted_increment: 1,
                ..Default::default()
            }
        } else {
            Self {
                rejected_increment: 1,
                ..Default::default()
            }
        }
    }

    pub(crate) fn apply_to(&self, record: &mut WorkerRecord) {
        if let Some(name) = &self.display_name {
            record.display_name = name.clone();
        }
        let metrics = &mut record.metrics;
        if let Some(throughput) = self.throughput {
            metrics.throughput = throughput.max(0.0);
        }
        if self.temperature.is_some() {
            metrics.temperature = self.temperature;
        }
        if self.power.is_some() {
            metrics.power = self.power;
        }
        if let Some(reported) = self.reported_accepted {
            metrics.accepted = metrics.accepted.max(reported);
        }
        if let Some(reported) = self.reported_rejected {
            metrics.rejected = metrics.rejected.max(reported);
        }
        metrics.accepted = metrics.accepted.saturating_add(self.accepted_increment);
        metrics.rejected = metrics.rejected.saturating_add(self.rejected_increment);
    }
}

/// Filter for [`crate::WorkerRegistry::list`]. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerFilter {
    pub group: Option<String>,
    pub status: Option<WorkerStatus>,
    pub health: Option<HealthClassification>,
}

impl WorkerFilter {
    pub fn group(group: impl Into<String>) -> Self {
        Self {
            group: Some(group.into()),
            ..Default::default()
        }
    }

    pub fn status(status: WorkerStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn health(health: HealthClassification) -> Self {
        Self {
            health: Some(health),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &WorkerRecord) -> bool {
        self.group
            .as_ref()
            .is_none_or(|g| record.group.as_ref() == Some(g))
            && self.status.is_none_or(|s| record.status == s)
            && self
                .health
                .is_none_or(|h| record.health.classification == h)
    }
}
