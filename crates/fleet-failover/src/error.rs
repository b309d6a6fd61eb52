//! Failover error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailoverError {
    /// Every upstream failed in turn without a single success.
    #[error("all {tried} upstreams failed without a success (last: {last_upstream}); automatic rotation paused")]
    UpstreamExhausted { tried: usize, last_upstream: String },

    #[error("no upstreams configured")]
    NoUpstreams,

    #[error("invalid failover config: {0}")]
    InvalidConfig(String),
}

pub type FailoverResult<T> = Result<T, FailoverError>;
