//! Prometheus text exposition of a fleet snapshot.

use std::fmt::Write;

use crate::aggregate::FleetSnapshot;

/// Render `snapshot` in the Prometheus text exposition format.
///
/// Fleet totals are unlabeled; per-status, per-health, and per-group
/// series carry a `status`, `health`, or `group` label.
pub fn render_prometheus(snapshot: &FleetSnapshot) -> String {
    let mut out = String::new();

    header(&mut out, "fleet_workers", "Registered workers by status.", "gauge");
    for (status, count) in [
        ("online", snapshot.by_status.online),
        ("idle", snapshot.by_status.idle),
        ("offline", snapshot.by_status.offline),
    ] {
        let _ = writeln!(out, "fleet_workers{{status=\"{status}\"}} {count}");
    }

    header(&mut out, "fleet_workers_health", "Registered workers by health classification.", "gauge");
    for (health, count) in [
        ("healthy", snapshot.by_health.healthy),
        ("warning", snapshot.by_health.warning),
        ("critical", snapshot.by_health.critical),
    ] {
        let _ = writeln!(out, "fleet_workers_health{{health=\"{health}\"}} {count}");
    }

    header(&mut out, "fleet_workers_connected", "Workers with an open channel.", "gauge");
    let _ = writeln!(out, "fleet_workers_connected {}", snapshot.connected_workers);

    header(&mut out, "fleet_throughput", "Total reported throughput in units per second.", "gauge");
    let _ = writeln!(out, "fleet_throughput {:.2}", snapshot.total_throughput);

    header(&mut out, "fleet_units_accepted_total", "Units accepted upstream.", "counter");
    let _ = writeln!(out, "fleet_units_accepted_total {}", snapshot.total_accepted);

    header(&mut out, "fleet_units_rejected_total", "Units rejected upstream.", "counter");
    let _ = writeln!(out, "fleet_units_rejected_total {}", snapshot.total_rejected);

    header(&mut out, "fleet_health_score_average", "Mean worker health score (0-100).", "gauge");
    let _ = writeln!(out, "fleet_health_score_average {:.2}", snapshot.average_health_score);

    header(&mut out, "fleet_group_workers", "Workers per group.", "gauge");
    for (group, summary) in &snapshot.groups {
        let _ = writeln!(out, "fleet_group_workers{{group=\"{}\"}} {}", escape(group), summary.workers);
    }

    header(&mut out, "fleet_group_throughput", "Reported throughput per group.", "gauge");
    for (group, summary) in &snapshot.groups {
        let _ = writeln!(
            out,
            "fleet_group_throughput{{group=\"{}\"}} {:.2}",
            escape(group),
            summary.throughput
        );
    }

    out
}

fn header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
}

/// Escape a label value.
fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
