//! fleet-coordinator: the composition root of the fleet.
//!
//! # Architecture
//!
//! ```text
//! transport (WebSocket, tests)
//!   │  open_session / handle_text / next_command / close_session
//!   ▼
//! Coordinator
//!   ├── WorkerRegistry ← register / apply_update per inbound message
//!   ├── connections: WorkerId → mpsc::Sender<WorkerCommand>
//!   │     send_command (one worker) / broadcast_command (all or a group)
//!   ├── FleetAggregator → snapshot() with connected count
//!   ├── failover driver
//!   │     local output line → FailureClassifier → FailoverController
//!   │     rotation → RestartCallback(new upstream) → settle window
//!   ├── run_sweeper / run_snapshot_publisher (watch shutdown)
//!   └── broadcast::Sender<FleetEvent> → subscribers
//! ```
//!
//! A closed channel only drops the command sender. The worker's status is
//! left alone so a quick reconnect does not flap it offline; the staleness
//! sweep decides when a silent worker is gone.

pub mod coordinator;
pub mod error;
pub mod event;
pub mod failover;
pub mod message;
pub mod session;

pub use coordinator::{Coordinator, CoordinatorSettings};
pub use error::{CoordinatorError, CoordinatorResult};
pub use event::FleetEvent;
pub use failover::{RestartCallback, RestartFuture};
pub use message::{
    MetricsPayload, RegisterPayload, Reply, StatusPayload, UnitFoundPayload, WorkerCommand,
    WorkerMessage,
};
pub use session::WorkerSession;
