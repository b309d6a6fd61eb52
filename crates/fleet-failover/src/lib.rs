//! fleet-failover: keeps the local process pointed at a working upstream.
//!
//! # Architecture
//!
//! ```text
//! process output line
//!   └── FailureClassifier (regex set) → Option<FailureSignal>
//!         └── FailoverController::record_failure(now)
//!               ├── below threshold        → Degraded
//!               ├── cooldown not elapsed   → Suppressed
//!               ├── every upstream tried   → Err(UpstreamExhausted), paused
//!               └── otherwise              → Rotated(next by priority)
//!
//! UpstreamRegistry
//!   └── endpoints sorted by priority (lower first), cycled modulo len
//! ```
//!
//! The controller is a pure state machine: every call takes `now` in
//! epoch seconds and nothing here sleeps or spawns. The settle delay after
//! a restart belongs to whoever restarts the process.
//!
//! Failure detection is a best-effort heuristic over free-form text. A
//! process that fails without printing a recognised pattern is never
//! rotated away from, and a pattern appearing in unrelated output can cause
//! a spurious rotation.

pub mod classifier;
pub mod controller;
pub mod error;
pub mod upstream;

pub use classifier::{FailureClassifier, FailureSignal};
pub use controller::{FailoverController, FailoverDecision, FailoverPhase, FailoverPolicy, FailoverStatus, Rotation};
pub use error::{FailoverError, FailoverResult};
pub use upstream::UpstreamRegistry;
