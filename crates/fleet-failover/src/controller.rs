//! Failover controller: hysteresis around upstream rotation.
//!
//! Phases:
//!
//! ```text
//! Connected ──failure──▶ Degraded(n) ──n ≥ threshold, cooldown elapsed──▶ rotate ──▶ Connected(next)
//!     ▲                      │  │
//!     └──────success─────────┘  └──n ≥ threshold, cooldown running──▶ Degraded (suppressed)
//! ```
//!
//! After a rotation the controller reports `RotatingCooldown` until the
//! cooldown elapses; it still accepts failures and successes in that
//! phase, but cannot rotate again.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use fleet_core::FailoverConfig;
use fleet_state::{Timestamp, UpstreamEndpoint};

use crate::error::{FailoverError, FailoverResult};
use crate::upstream::UpstreamRegistry;

/// Rotation thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    /// Consecutive failures that make a rotation due.
    pub failure_threshold: u32,
    /// Minimum time between automatic rotations.
    pub cooldown: Duration,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self::from(&FailoverConfig::default())
    }
}

impl From<&FailoverConfig> for FailoverPolicy {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            cooldown: config.cooldown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverPhase {
    Connected,
    Degraded,
    RotatingCooldown,
}

impl FailoverPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Degraded => "degraded",
            Self::RotatingCooldown => "rotating_cooldown",
        }
    }
}

/// A completed switch from one upstream to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rotation {
    pub from: UpstreamEndpoint,
    pub to: UpstreamEndpoint,
    pub index: usize,
    pub at: Timestamp,
    /// Requested by an operator rather than triggered by failures.
    pub forced: bool,
}

/// Outcome of one failure or success signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverDecision {
    /// Success recorded; failure count is zero.
    Healthy,
    /// Failure recorded, below threshold.
    Degraded { failures: u32 },
    /// Threshold reached but the cooldown is still running.
    Suppressed { failures: u32, retry_in: Duration },
    /// Switched upstream. The caller must restart the local process.
    Rotated(Rotation),
    /// Automatic rotation is paused after exhaustion.
    Paused { failures: u32 },
}

/// Point-in-time view for the query surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverStatus {
    pub active_upstream: UpstreamEndpoint,
    pub active_index: usize,
    pub consecutive_failures: u32,
    pub phase: FailoverPhase,
    pub paused: bool,
    pub last_rotation_at: Option<Timestamp>,
    /// When the next automatic rotation becomes possible.
    pub rotation_available_at: Option<Timestamp>,
    pub rotations_since_success: usize,
    pub upstream_count: usize,
}

/// Tracks the active upstream and decides when to rotate.
#[derive(Debug, Clone)]
pub struct FailoverController {
    upstreams: UpstreamRegistry,
    policy: FailoverPolicy,
    active: usize,
    consecutive_failures: u32,
    last_rotation_at: Option<Timestamp>,
    rotations_since_success: usize,
    paused: bool,
}

impl FailoverController {
    /// Start on the highest-priority upstream.
    pub fn new(upstreams: UpstreamRegistry, policy: FailoverPolicy) -> Self {
        Self {
            upstreams,
            policy,
            active: 0,
            consecutive_failures: 0,
            last_rotation_at: None,
            rotations_since_success: 0,
            paused: false,
        }
    }

    /// Build from `[failover]`.
    pub fn from_config(config: &FailoverConfig) -> FailoverResult<Self> {
        if config.failure_threshold == 0 {
            return Err(FailoverError::InvalidConfig(
                "failure_threshold must be at least 1".into(),
            ));
        }
        let upstreams = UpstreamRegistry::from_config(&config.upstreams)?;
        Ok(Self::new(upstreams, FailoverPolicy::from(config)))
    }

    pub fn active(&self) -> &UpstreamEndpoint {
        self.upstreams.get(self.active)
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn upstreams(&self) -> &UpstreamRegistry {
        &self.upstreams
    }

    pub fn policy(&self) -> &FailoverPolicy {
        &self.policy
    }

    /// Record a connectivity failure on the active upstream.
    ///
    /// Returns `Err(UpstreamExhausted)` exactly once, when a rotation is due
    /// but every upstream has already failed since the last success. The
    /// controller then stays paused until [`record_success`],
    /// [`resume`], or [`force_rotate`].
    ///
    /// [`record_success`]: Self::record_success
    /// [`resume`]: Self::resume
    /// [`force_rotate`]: Self::force_rotate
    pub fn record_failure(&mut self, now: Timestamp) -> FailoverResult<FailoverDecision> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let failures = self.consecutive_failures;

        if self.paused {
            debug!(failures, "failover paused, failure recorded");
            return Ok(FailoverDecision::Paused { failures });
        }

        if failures < self.policy.failure_threshold {
            debug!(
                upstream = %self.active().address,
                failures,
                threshold = self.policy.failure_threshold,
                "upstream degraded"
            );
            return Ok(FailoverDecision::Degraded { failures });
        }

        if let Some(available_at) = self.rotation_available_at()
            && now < available_at
        {
            let retry_in = Duration::from_secs(available_at - now);
            warn!(
                upstream = %self.active().address,
                failures,
                retry_in_secs = retry_in.as_secs(),
                "upstream rotation suppressed by cooldown"
            );
            return Ok(FailoverDecision::Suppressed { failures, retry_in });
        }

        if self.rotations_since_success + 1 >= self.upstreams.len() {
            self.paused = true;
            let tried = self.upstreams.len();
            error!(
                upstream = %self.active().address,
                tried,
                "all upstreams exhausted, automatic rotation paused"
            );
            return Err(FailoverError::UpstreamExhausted {
                tried,
                last_upstream: self.active().id.clone(),
            });
        }

        Ok(FailoverDecision::Rotated(self.rotate(now, false)))
    }

    /// Record a healthy signal from the active upstream.
    pub fn record_success(&mut self) -> FailoverDecision {
        if self.consecutive_failures > 0 {
            debug!(
                upstream = %self.active().address,
                failures = self.consecutive_failures,
                "upstream recovered"
            );
        }
        if self.paused {
            info!(upstream = %self.active().address, "success received, automatic rotation resumed");
        }
        self.consecutive_failures = 0;
        self.rotations_since_success = 0;
        self.paused = false;
        FailoverDecision::Healthy
    }

    /// Rotate now, ignoring the threshold and cooldown. Clears a pause.
    pub fn force_rotate(&mut self, now: Timestamp) -> Rotation {
        self.paused = false;
        self.rotations_since_success = 0;
        self.rotate(now, true)
    }

    /// Clear an exhaustion pause without rotating.
    pub fn resume(&mut self) {
        if self.paused {
            info!("automatic rotation resumed by operator");
        }
        self.paused = false;
        self.rotations_since_success = 0;
        self.consecutive_failures = 0;
    }

    pub fn phase(&self, now: Timestamp) -> FailoverPhase {
        if self.consecutive_failures > 0 {
            FailoverPhase::Degraded
        } else if self.rotation_available_at().is_some_and(|at| now < at) {
            FailoverPhase::RotatingCooldown
        } else {
            FailoverPhase::Connected
        }
    }

    pub fn status(&self, now: Timestamp) -> FailoverStatus {
        FailoverStatus {
            active_upstream: self.active().clone(),
            active_index: self.active,
            consecutive_failures: self.consecutive_failures,
            phase: self.phase(now),
            paused: self.paused,
            last_rotation_at: self.last_rotation_at,
            rotation_available_at: self.rotation_available_at(),
            rotations_since_success: self.rotations_since_success,
            upstream_count: self.upstreams.len(),
        }
    }

    fn rotation_available_at(&self) -> Option<Timestamp> {
        self.last_rotation_at
            .map(|at| at.saturating_add(self.policy.cooldown.as_secs()))
    }

    fn rotate(&mut self, now: Timestamp, forced: bool) -> Rotation {
        let from = self.active().clone();
        self.active = self.upstreams.next_index(self.active);
        self.consecutive_failures = 0;
        self.last_rotation_at = Some(now);
        if !forced {
            self.rotations_since_success += 1;
        }
        let to = self.active().clone();
        info!(
            from = %from.address,
            upstream = %to.address,
            index = self.active,
            forced,
            "upstream rotated"
        );
        Rotation {
            from,
            to,
            index: self.active,
            at: now,
            forced,
        }
    }
}
