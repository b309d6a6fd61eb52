//! fleet-health: worker health scoring for fleetgrid.
//!
//! Turns raw worker signals (silence since last message, temperature,
//! power draw, efficiency, rejection rate) into a 0–100 score, a
//! classification, and a list of human-readable issues. Everything here
//! is a pure function of its inputs: no clock, no I/O.
//!
//! # Scoring
//!
//! ```text
//! score = 100
//!   - 30  silent for longer than silence_after (5m)
//!   - 20  temperature > max_temperature (85)
//!   - 15  power > max_power (300 W)
//!   - 10  throughput / power < efficiency_floor (0.001)
//!   - 15  rejected / (accepted + rejected) > max_rejection_rate (0.10)
//!
//! score > 80 → healthy, score > 50 → warning, else critical
//! ```
//!
//! # Status
//!
//! `critical` → offline; silent longer than idle_after (2m) → idle;
//! otherwise online.

pub mod evaluator;
pub mod policy;

pub use evaluator::{classify, derive_status, evaluate, stale_issue};
pub use policy::HealthPolicy;
