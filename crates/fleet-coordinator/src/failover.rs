//! Failover driver: feeds local process output to the controller and
//! restarts the process when the upstream rotates.
//!
//! Only one restart runs at a time. While it is in flight, and for
//! `settle_delay` after it, failure lines are dropped so startup noise from
//! the new process is not counted against the new upstream, and a forced
//! rotation is refused with [`CoordinatorError::RotationInProgress`].

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use fleet_failover::{
    FailoverController, FailoverDecision, FailoverError, FailoverStatus, FailureClassifier, Rotation,
};
use fleet_state::UpstreamEndpoint;

use crate::coordinator::Coordinator;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::event::FleetEvent;

pub type RestartFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Invoked with the new upstream after a rotation. Resolves once the local
/// process has been restarted.
pub type RestartCallback = Arc<dyn Fn(UpstreamEndpoint) -> RestartFuture + Send + Sync>;

pub(crate) struct FailoverDriver {
    state: Mutex<DriverState>,
    classifier: FailureClassifier,
    settle_delay: Duration,
    pub(crate) restart: Option<RestartCallback>,
}

struct DriverState {
    controller: FailoverController,
    restarting: bool,
    settle_until: Option<Instant>,
}

impl DriverState {
    fn settling(&self) -> bool {
        self.restarting || self.settle_until.is_some_and(|t| Instant::now() < t)
    }
}

impl FailoverDriver {
    pub(crate) fn new(controller: FailoverController, classifier: FailureClassifier, settle_delay: Duration) -> Self {
        Self {
            state: Mutex::new(DriverState {
                controller,
                restarting: false,
                settle_until: None,
            }),
            classifier,
            settle_delay,
            restart: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, DriverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ends the in-flight restart when dropped, even if the restart future is
/// cancelled before the callback resolves.
struct RestartInFlight<'a> {
    driver: &'a FailoverDriver,
}

impl Drop for RestartInFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.driver.lock();
        state.restarting = false;
        state.settle_until = Some(Instant::now() + self.driver.settle_delay);
    }
}

impl Coordinator {
    /// Classify one line of local process output and act on it.
    ///
    /// Returns `None` for lines that are neither a failure nor a success,
    /// and for failures dropped during the settle window.
    pub async fn report_local_line(&self, line: &str) -> CoordinatorResult<Option<FailoverDecision>> {
        if self.failover.classifier.is_success(line) {
            return Ok(Some(self.report_local_success()));
        }
        self.report_local_failure_line(line).await
    }

    /// Count `line` as an upstream failure if it matches a failure pattern.
    pub async fn report_local_failure_line(&self, line: &str) -> CoordinatorResult<Option<FailoverDecision>> {
        let Some(signal) = self.failover.classifier.classify(line) else {
            return Ok(None);
        };
        let now = self.registry().now();

        let rotation = {
            let mut state = self.failover.lock();
            if state.settling() {
                debug!(pattern = %signal.pattern, "failure line dropped while settling");
                return Ok(None);
            }
            let upstream = state.controller.active().address.clone();
            match state.controller.record_failure(now) {
                Ok(FailoverDecision::Rotated(rotation)) => {
                    state.restarting = true;
                    rotation
                }
                Ok(decision) => {
                    if let FailoverDecision::Suppressed { failures, retry_in } = &decision {
                        self.emit(FleetEvent::RotationSuppressed {
                            upstream,
                            failures: *failures,
                            retry_in_secs: retry_in.as_secs(),
                        });
                    }
                    return Ok(Some(decision));
                }
                Err(e) => {
                    if let FailoverError::UpstreamExhausted { tried, last_upstream } = &e {
                        self.emit(FleetEvent::UpstreamExhausted {
                            tried: *tried,
                            last_upstream: last_upstream.clone(),
                        });
                    }
                    return Err(e.into());
                }
            }
        };

        self.restart(&rotation).await;
        Ok(Some(FailoverDecision::Rotated(rotation)))
    }

    /// The local process reported healthy upstream activity.
    pub fn report_local_success(&self) -> FailoverDecision {
        self.failover.lock().controller.record_success()
    }

    /// Operator rotation: ignores threshold, cooldown, and any pause.
    ///
    /// Fails with [`CoordinatorError::RotationInProgress`] while another
    /// restart has not finished.
    pub async fn force_rotate(&self) -> CoordinatorResult<Rotation> {
        let now = self.registry().now();
        let rotation = {
            let mut state = self.failover.lock();
            if state.restarting {
                warn!("forced rotation refused, restart already in flight");
                return Err(CoordinatorError::RotationInProgress);
            }
            state.restarting = true;
            state.controller.force_rotate(now)
        };
        self.restart(&rotation).await;
        Ok(rotation)
    }

    /// Clear an exhaustion pause without rotating.
    pub fn resume_failover(&self) {
        self.failover.lock().controller.resume();
    }

    pub fn failover_status(&self) -> FailoverStatus {
        let now = self.registry().now();
        self.failover.lock().controller.status(now)
    }

    pub fn active_upstream(&self) -> UpstreamEndpoint {
        self.failover.lock().controller.active().clone()
    }

    /// True while failure lines are being ignored after a restart.
    pub fn is_settling(&self) -> bool {
        self.failover.lock().settling()
    }

    /// Caller must have set `restarting` under the same lock that decided
    /// the rotation.
    async fn restart(&self, rotation: &Rotation) {
        let _in_flight = RestartInFlight { driver: &self.failover };
        self.emit(FleetEvent::UpstreamRotated {
            rotation: rotation.clone(),
        });
        match &self.failover.restart {
            Some(callback) => callback(rotation.to.clone()).await,
            None => warn!(upstream = %rotation.to.address, "upstream rotated with no restart callback"),
        }
    }
}
