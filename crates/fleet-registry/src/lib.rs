//! fleet-registry: the authoritative store of worker records.
//!
//! # Architecture
//!
//! ```text
//! WorkerRegistry
//!   ├── RwLock<HashMap<WorkerId, Arc<Mutex<WorkerRecord>>>>
//!   │   ├── read lock + per-record mutex → apply_update (parallel across ids)
//!   │   └── write lock → register / remove / restore
//!   ├── HealthPolicy → re-evaluate health + status on every update
//!   └── StateStore (optional) → snapshot blob after every mutation
//!
//! FleetAggregator
//!   └── one pass over the registry → FleetSnapshot (never stored)
//! ```
//!
//! Status is never written by callers: it is re-derived from health and
//! silence on every update, and only the staleness sweep may force a
//! worker offline for silence alone.

pub mod aggregate;
pub mod error;
pub mod identity;
pub mod prometheus;
pub mod registry;
pub mod update;

pub use aggregate::{aggregate, FleetAggregator, FleetSnapshot, GroupSummary, HealthCounts, StatusCounts};
pub use error::{RegistryError, RegistryResult};
pub use identity::{derive_worker_id, IdentityHint};
pub use prometheus::render_prometheus;
pub use registry::{Registered, WorkerRegistry};
pub use update::{Registration, WorkerFilter, WorkerUpdate};
