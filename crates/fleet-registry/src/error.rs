//! Registry error types.

use fleet_state::WorkerId;
use thiserror::Error;

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("worker not found: {0}")]
    NotFound(WorkerId),

    #[error("worker {id} changed concurrently (expected revision {expected}, found {found})")]
    StaleWrite {
        id: WorkerId,
        expected: u64,
        found: u64,
    },

    #[error("invalid registry snapshot: {0}")]
    Snapshot(String),

    #[error("state store error: {0}")]
    State(#[from] fleet_state::StateError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;
