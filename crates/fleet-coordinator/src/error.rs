//! Coordinator error types.

use fleet_state::WorkerId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Inbound message failed to parse or validate. The message is dropped;
    /// the connection stays open.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("session has not registered a worker")]
    NotRegistered,

    #[error("worker {0} has no open channel")]
    NotConnected(WorkerId),

    #[error("command channel to worker {0} is closed")]
    ChannelClosed(WorkerId),

    /// A rotation was requested while the previous restart is still running.
    #[error("an upstream restart is already in progress")]
    RotationInProgress,

    #[error(transparent)]
    Registry(#[from] fleet_registry::RegistryError),

    #[error(transparent)]
    Failover(#[from] fleet_failover::FailoverError),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
