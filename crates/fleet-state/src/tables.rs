//! redb table definitions for the fleetgrid state store.

use redb::TableDefinition;

/// Opaque snapshot blobs keyed by snapshot name.
pub const SNAPSHOTS: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshots");

/// Key under which the worker registry snapshot is stored.
pub const WORKER_REGISTRY_KEY: &str = "worker_registry";
