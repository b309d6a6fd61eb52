//! Coordinator: routes worker messages, fans out commands, runs loops.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use fleet_core::FleetConfig;
use fleet_failover::{FailoverController, FailureClassifier};
use fleet_registry::{
    FleetAggregator, FleetSnapshot, Registered, RegistryError, WorkerFilter, WorkerRegistry,
    WorkerUpdate,
};
use fleet_state::{WorkerId, WorkerRecord};

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::event::FleetEvent;
use crate::failover::{FailoverDriver, RestartCallback};
use crate::message::{RegisterPayload, Reply, WorkerCommand, WorkerMessage};
use crate::session::WorkerSession;

/// Commands queued per worker before sends start failing.
const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 256;

/// Timing knobs, from `[registry]` and `[failover]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub stale_threshold: Duration,
    pub sweep_interval: Duration,
    pub snapshot_interval: Duration,
    /// Failure lines are dropped for this long after a restart.
    pub settle_delay: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from(&FleetConfig::default())
    }
}

impl From<&FleetConfig> for CoordinatorSettings {
    fn from(config: &FleetConfig) -> Self {
        Self {
            stale_threshold: config.registry.stale_threshold,
            sweep_interval: config.registry.sweep_interval,
            snapshot_interval: config.registry.snapshot_interval,
            settle_delay: config.failover.settle_delay,
        }
    }
}

/// Command sender owned by the session that registered the worker.
struct Connection {
    session: u64,
    commands: mpsc::Sender<WorkerCommand>,
}

pub struct Coordinator {
    registry: Arc<WorkerRegistry>,
    aggregator: FleetAggregator,
    connections: Mutex<HashMap<WorkerId, Connection>>,
    pub(crate) failover: FailoverDriver,
    events: broadcast::Sender<FleetEvent>,
    next_session: AtomicU64,
    settings: CoordinatorSettings,
}

impl Coordinator {
    pub fn new(
        registry: Arc<WorkerRegistry>,
        failover: FailoverController,
        classifier: FailureClassifier,
        settings: CoordinatorSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            aggregator: FleetAggregator::new(registry.clone()),
            registry,
            connections: Mutex::new(HashMap::new()),
            failover: FailoverDriver::new(failover, classifier, settings.settle_delay),
            events,
            next_session: AtomicU64::new(1),
            settings,
        }
    }

    /// Called with the new upstream after every rotation.
    pub fn with_restart_callback(mut self, callback: RestartCallback) -> Self {
        self.failover.restart = Some(callback);
        self
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: FleetEvent) {
        debug!(event = event.name(), "fleet event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // ── Sessions ───────────────────────────────────────────────────

    /// Start tracking a new worker channel.
    pub fn open_session(&self, source: Option<String>) -> WorkerSession {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed);
        debug!(session = id, source = ?source, "worker channel opened");
        WorkerSession::new(id, source)
    }

    /// Validate and route one inbound text frame.
    ///
    /// Errors describe a dropped message; the channel stays usable.
    pub fn handle_text(&self, session: &mut WorkerSession, text: &str) -> CoordinatorResult<Option<Reply>> {
        let message = WorkerMessage::parse(text).inspect_err(|e| {
            warn!(
                session = session.id(),
                worker_id = ?session.worker_id(),
                error = %e,
                "dropping malformed worker message"
            );
        })?;
        self.handle_message(session, message)
    }

    /// Route one parsed message.
    pub fn handle_message(
        &self,
        session: &mut WorkerSession,
        message: WorkerMessage,
    ) -> CoordinatorResult<Option<Reply>> {
        let kind = message.kind();
        let update = match message {
            WorkerMessage::Register(payload) => return self.register(session, payload).map(Some),
            WorkerMessage::StatusUpdate(status) => WorkerUpdate::from(&status),
            WorkerMessage::UnitFound(unit) => WorkerUpdate::unit_found(unit.accepted),
            WorkerMessage::Heartbeat => WorkerUpdate::heartbeat(),
        };

        let Some(worker_id) = session.worker_id().map(str::to_string) else {
            warn!(session = session.id(), kind, "message before registration dropped");
            return Err(CoordinatorError::NotRegistered);
        };

        match self.registry.apply_update(&worker_id, &update) {
            Ok(record) => {
                debug!(%worker_id, kind, status = record.status.as_str(), "worker message applied");
                Ok(None)
            }
            Err(RegistryError::NotFound(id)) => {
                // Removed by an operator while connected; it must register again.
                warn!(%worker_id, kind, "message from removed worker dropped");
                self.release_connection(&worker_id, session.id());
                session.detach();
                Err(RegistryError::NotFound(id).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn register(&self, session: &mut WorkerSession, payload: RegisterPayload) -> CoordinatorResult<Reply> {
        let registration = payload.into_registration(session.source().map(str::to_string));
        let Registered { record, created } = self.registry.register(registration)?;

        if let Some(previous) = session.worker_id()
            && previous != record.id
        {
            self.release_connection(previous, session.id());
        }

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let superseded = self
            .lock_connections()
            .insert(
                record.id.clone(),
                Connection {
                    session: session.id(),
                    commands: tx,
                },
            )
            .is_some_and(|old| old.session != session.id());
        if superseded {
            info!(worker_id = %record.id, session = session.id(), "worker reconnected, previous channel superseded");
        }
        session.attach(record.id.clone(), rx);

        self.emit(FleetEvent::WorkerRegistered {
            worker_id: record.id.clone(),
            display_name: record.display_name.clone(),
            created,
        });
        Ok(Reply::Registered {
            worker_id: record.id,
        })
    }

    /// The channel closed. Drops the command sender if this session still
    /// owns it; the worker record is untouched.
    pub fn close_session(&self, session: WorkerSession) {
        let Some(worker_id) = session.worker_id() else {
            debug!(session = session.id(), "unregistered channel closed");
            return;
        };
        if self.release_connection(worker_id, session.id()) {
            info!(%worker_id, session = session.id(), "worker disconnected");
            self.emit(FleetEvent::WorkerDisconnected {
                worker_id: worker_id.to_string(),
            });
        } else {
            debug!(%worker_id, session = session.id(), "superseded channel closed");
        }
    }

    fn release_connection(&self, worker_id: &str, session: u64) -> bool {
        let mut connections = self.lock_connections();
        match connections.get(worker_id) {
            Some(conn) if conn.session == session => {
                connections.remove(worker_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, worker_id: &str) -> bool {
        self.lock_connections().contains_key(worker_id)
    }

    /// Ids of workers with an open channel, sorted.
    pub fn connected_workers(&self) -> Vec<WorkerId> {
        let mut ids: Vec<_> = self.lock_connections().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn connected_count(&self) -> usize {
        self.lock_connections().len()
    }

    // ── Commands ───────────────────────────────────────────────────

    /// Queue `command` for one worker.
    pub async fn send_command(&self, worker_id: &str, command: WorkerCommand) -> CoordinatorResult<()> {
        if !self.registry.contains(worker_id) {
            return Err(RegistryError::NotFound(worker_id.to_string()).into());
        }
        let sender = self
            .lock_connections()
            .get(worker_id)
            .map(|conn| conn.commands.clone())
            .ok_or_else(|| CoordinatorError::NotConnected(worker_id.to_string()))?;

        let kind = command.kind();
        sender
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed(worker_id.to_string()))?;
        info!(%worker_id, command = kind, "command sent");
        Ok(())
    }

    /// Queue `command` for every connected worker, or only those in `group`.
    ///
    /// Workers whose queue is full are skipped. Returns how many workers
    /// received the command.
    pub fn broadcast_command(&self, command: &WorkerCommand, group: Option<&str>) -> usize {
        let members: Option<HashSet<WorkerId>> =
            group.map(|g| self.registry.list_ids_in_group(g).into_iter().collect());
        let targets: Vec<(WorkerId, mpsc::Sender<WorkerCommand>)> = self
            .lock_connections()
            .iter()
            .filter(|(id, _)| members.as_ref().is_none_or(|m| m.contains(*id)))
            .map(|(id, conn)| (id.clone(), conn.commands.clone()))
            .collect();

        let mut delivered = 0;
        for (worker_id, sender) in targets {
            match sender.try_send(command.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(%worker_id, command = command.kind(), "command queue full, skipped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%worker_id, "command channel closed during broadcast");
                }
            }
        }
        info!(command = command.kind(), group = ?group, delivered, "command broadcast");
        delivered
    }

    // ── Queries and operator actions ───────────────────────────────

    pub fn list_workers(&self, filter: &WorkerFilter) -> Vec<WorkerRecord> {
        self.registry.list(filter)
    }

    pub fn get_worker(&self, worker_id: &str) -> CoordinatorResult<WorkerRecord> {
        Ok(self.registry.get(worker_id)?)
    }

    /// Fleet aggregate including the number of open channels.
    pub fn snapshot(&self) -> FleetSnapshot {
        self.aggregator.snapshot().with_connected(self.connected_count())
    }

    /// Delete a worker record and close its channel, if any.
    pub fn remove_worker(&self, worker_id: &str) -> CoordinatorResult<bool> {
        let removed = self.registry.remove(worker_id)?;
        // Dropping the sender ends the session's command stream.
        let dropped = self.lock_connections().remove(worker_id).is_some();
        if dropped {
            info!(%worker_id, "removed worker disconnected");
            self.emit(FleetEvent::WorkerDisconnected {
                worker_id: worker_id.to_string(),
            });
        }
        Ok(removed)
    }

    pub fn set_group(&self, worker_id: &str, group: Option<String>) -> CoordinatorResult<WorkerRecord> {
        Ok(self.registry.set_group(worker_id, group)?)
    }

    pub fn reset_counters(&self, worker_id: &str) -> CoordinatorResult<WorkerRecord> {
        Ok(self.registry.reset_counters(worker_id)?)
    }

    // ── Background loops ───────────────────────────────────────────

    /// One staleness sweep at the registry's current time.
    pub fn sweep_stale(&self) -> CoordinatorResult<usize> {
        let count = self
            .registry
            .sweep_stale(self.registry.now(), self.settings.stale_threshold)?;
        if count > 0 {
            self.emit(FleetEvent::WorkersStale { count });
        }
        Ok(count)
    }

    /// Run the staleness sweep until shutdown.
    pub async fn run_sweeper(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.sweep_interval.as_secs(),
            stale_after_secs = self.settings.stale_threshold.as_secs(),
            "staleness sweeper started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.sweep_interval) => {
                    if let Err(e) = self.sweep_stale() {
                        error!(error = %e, "staleness sweep failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("staleness sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Publish a `SnapshotUpdated` event on every tick until shutdown.
    pub async fn run_snapshot_publisher(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.snapshot_interval.as_secs(),
            "snapshot publisher started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.snapshot_interval) => {
                    let snapshot = self.snapshot();
                    debug!(
                        workers = snapshot.total_workers,
                        connected = snapshot.connected_workers,
                        throughput = snapshot.total_throughput,
                        "fleet snapshot"
                    );
                    self.emit(FleetEvent::SnapshotUpdated { snapshot });
                }
                _ = shutdown.changed() => {
                    info!("snapshot publisher shutting down");
                    return;
                }
            }
        }
    }

    fn lock_connections(&self) -> MutexGuard<'_, HashMap<WorkerId, Connection>> {
        self.connections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
