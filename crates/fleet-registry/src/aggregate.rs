//! Fleet-wide summary statistics.
//!
//! A [`FleetSnapshot`] is computed in one pass over the registry and never
//! stored. Aggregation only reads records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fleet_state::{HealthClassification, Timestamp, WorkerRecord, WorkerStatus};

use crate::registry::WorkerRegistry;

/// Worker counts by connectivity status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub online: usize,
    pub idle: usize,
    pub offline: usize,
}

impl StatusCounts {
    fn add(&mut self, status: WorkerStatus) {
        match status {
            WorkerStatus::Online => self.online += 1,
            WorkerStatus::Idle => self.idle += 1,
            WorkerStatus::Offline => self.offline += 1,
        }
    }
}

/// Worker counts by health classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCounts {
    pub healthy: usize,
    pub warning: usize,
    pub critical: usize,
}

impl HealthCounts {
    fn add(&mut self, classification: HealthClassification) {
        match classification {
            HealthClassification::Healthy => self.healthy += 1,
            HealthClassification::Warning => self.warning += 1,
            HealthClassification::Critical => self.critical += 1,
        }
    }
}

/// Totals for one worker group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub workers: usize,
    pub online: usize,
    pub throughput: f64,
    pub accepted: u64,
    pub rejected: u64,
}

/// Aggregate of all worker records at read time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSnapshot {
    pub generated_at: Timestamp,
    pub total_workers: usize,
    /// Workers with an open channel. Filled in by the coordinator; the
    /// registry does not know about connections.
    pub connected_workers: usize,
    pub by_status: StatusCounts,
    pub by_health: HealthCounts,
    pub total_throughput: f64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    /// Mean health score, 0 for an empty fleet.
    pub average_health_score: f64,
    /// Per-group totals. Ungrouped workers are not listed.
    pub groups: BTreeMap<String, GroupSummary>,
}

impl FleetSnapshot {
    pub fn with_connected(mut self, connected: usize) -> Self {
        self.connected_workers = connected;
        self
    }

    /// Fraction of submitted units that were rejected.
    pub fn rejection_rate(&self) -> f64 {
        let submitted = self.total_accepted + self.total_rejected;
        if submitted == 0 {
            0.0
        } else {
            self.total_rejected as f64 / submitted as f64
        }
    }
}

/// Running totals for one aggregation pass.
#[derive(Default)]
struct Accumulator {
    snapshot: FleetSnapshot,
    score_sum: u64,
}

impl Accumulator {
    fn add(&mut self, rec: &WorkerRecord) {
        let s = &mut self.snapshot;
        s.total_workers += 1;
        s.by_status.add(rec.status);
        s.by_health.add(rec.health.classification);
        s.total_throughput += rec.metrics.throughput;
        s.total_accepted = s.total_accepted.saturating_add(rec.metrics.accepted);
        s.total_rejected = s.total_rejected.saturating_add(rec.metrics.rejected);
        self.score_sum += u64::from(rec.health.score);

        if let Some(group) = &rec.group {
            let g = s.groups.entry(group.clone()).or_default();
            g.workers += 1;
            if rec.status == WorkerStatus::Online {
                g.online += 1;
            }
            g.throughput += rec.metrics.throughput;
            g.accepted = g.accepted.saturating_add(rec.metrics.accepted);
            g.rejected = g.rejected.saturating_add(rec.metrics.rejected);
        }
    }

    fn finish(mut self, now: Timestamp) -> FleetSnapshot {
        self.snapshot.generated_at = now;
        if self.snapshot.total_workers > 0 {
            self.snapshot.average_health_score =
                self.score_sum as f64 / self.snapshot.total_workers as f64;
        }
        self.snapshot
    }
}

/// Aggregate an arbitrary set of records.
pub fn aggregate<'a, I>(records: I, now: Timestamp) -> FleetSnapshot
where
    I: IntoIterator<Item = &'a WorkerRecord>,
{
    let mut acc = Accumulator::default();
    for rec in records {
        acc.add(rec);
    }
    acc.finish(now)
}

/// Computes snapshots straight from a registry without cloning records.
#[derive(Clone)]
pub struct FleetAggregator {
    registry: Arc<WorkerRegistry>,
}

impl FleetAggregator {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        Self { registry }
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        let mut acc = Accumulator::default();
        self.registry.visit(|rec| acc.add(rec));
        acc.finish(self.registry.now())
    }
}
