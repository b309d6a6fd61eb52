//! Worker registry: the single owner of worker record mutations.
//!
//! Records live behind a map-level `RwLock` and a per-record `Mutex`.
//! Updates to different workers only share the map's read lock, so they
//! run in parallel; two updates to the same worker serialize on its
//! mutex. Register, remove, and restore take the map's write lock.
//!
//! Lock order is always map → record. Neither lock is held while
//! persisting: the snapshot is collected under a dedicated persist mutex
//! so the blob in the store is never older than an earlier write.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use fleet_core::{system_clock, Clock};
use fleet_health::{derive_status, evaluate, stale_issue, HealthPolicy};
use fleet_state::*;

use crate::error::{RegistryError, RegistryResult};
use crate::identity::{derive_worker_id, IdentityHint};
use crate::update::{Registration, WorkerFilter, WorkerUpdate};

type Slot = Arc<Mutex<WorkerRecord>>;

/// Outcome of [`WorkerRegistry::register`].
#[derive(Debug, Clone)]
pub struct Registered {
    pub record: WorkerRecord,
    /// False when the registration merged into an existing record.
    pub created: bool,
}

/// Concurrent store of worker records.
pub struct WorkerRegistry {
    workers: RwLock<HashMap<WorkerId, Slot>>,
    policy: HealthPolicy,
    clock: Clock,
    /// Snapshot target; `None` keeps the registry purely in memory.
    store: Option<StateStore>,
    persist_lock: Mutex<()>,
    /// Per-instance seed so anonymous ids differ across restarts.
    session_seed: u128,
    sessions: AtomicU64,
}

impl WorkerRegistry {
    /// Create an empty in-memory registry.
    pub fn new(policy: HealthPolicy) -> Self {
        let session_seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        Self {
            workers: RwLock::new(HashMap::new()),
            policy,
            clock: system_clock(),
            store: None,
            persist_lock: Mutex::new(()),
            session_seed,
            sessions: AtomicU64::new(0),
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Persist a snapshot to `store` after every mutation.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Current time as seen by this registry.
    pub fn now(&self) -> Timestamp {
        (self.clock)()
    }

    /// Register a worker, or merge into its existing record.
    ///
    /// A merge keeps `first_seen_at`, counters, group, and existing labels,
    /// and overwrites host info, source address, and display name.
    pub fn register(&self, registration: Registration) -> RegistryResult<Registered> {
        let now = self.now();
        let hint = IdentityHint::from(&registration.host_info);
        let session = self
            .session_seed
            .wrapping_add(u128::from(self.sessions.fetch_add(1, Ordering::Relaxed)));
        let id = derive_worker_id(&hint, registration.source_address.as_deref(), session);

        let (record, created) = {
            let mut workers = self.write_workers();
            match workers.entry(id.clone()) {
                Entry::Occupied(entry) => {
                    let mut rec = lock(entry.get());
                    merge_registration(&mut rec, registration, now);
                    self.refresh(&mut rec, now);
                    (rec.clone(), false)
                }
                Entry::Vacant(entry) => {
                    let mut rec = new_record(id.clone(), registration, now);
                    self.refresh(&mut rec, now);
                    entry.insert(Arc::new(Mutex::new(rec.clone())));
                    (rec, true)
                }
            }
        };

        info!(
            worker_id = %record.id,
            name = %record.display_name,
            created,
            source = ?record.source_address,
            "worker registered"
        );
        self.persist()?;
        Ok(Registered { record, created })
    }

    /// Merge a partial update, mark the worker as seen, and re-derive
    /// health and status.
    pub fn apply_update(&self, id: &str, update: &WorkerUpdate) -> RegistryResult<WorkerRecord> {
        let record = self.write_record(id, None, update)?;
        self.persist()?;
        Ok(record)
    }

    /// Like [`apply_update`](Self::apply_update), but only if the record is
    /// still at `expected_revision`.
    pub fn apply_update_if(
        &self,
        id: &str,
        expected_revision: u64,
        update: &WorkerUpdate,
    ) -> RegistryResult<WorkerRecord> {
        let record = self.write_record(id, Some(expected_revision), update)?;
        self.persist()?;
        Ok(record)
    }

    /// Compute an update from the current record and apply it optimistically.
    ///
    /// If the record changes between the read and the write, the update is
    /// recomputed once from the fresh record before giving up with
    /// [`RegistryError::StaleWrite`].
    pub fn apply_computed_update<F>(&self, id: &str, compute: F) -> RegistryResult<WorkerRecord>
    where
        F: Fn(&WorkerRecord) -> WorkerUpdate,
    {
        let mut retried = false;
        loop {
            let current = self.get(id)?;
            let update = compute(&current);
            match self.apply_update_if(id, current.revision, &update) {
                Err(RegistryError::StaleWrite { .. }) if !retried => {
                    debug!(worker_id = %id, "concurrent write, recomputing update");
                    retried = true;
                }
                other => return other,
            }
        }
    }

    fn write_record(
        &self,
        id: &str,
        expected_revision: Option<u64>,
        update: &WorkerUpdate,
    ) -> RegistryResult<WorkerRecord> {
        let now = self.now();
        let workers = self.read_workers();
        let slot = workers
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let mut rec = lock(slot);
        if let Some(expected) = expected_revision
            && rec.revision != expected
        {
            return Err(RegistryError::StaleWrite {
                id: id.to_string(),
                expected,
                found: rec.revision,
            });
        }
        update.apply_to(&mut rec);
        rec.last_seen_at = now;
        self.refresh(&mut rec, now);
        debug!(
            worker_id = %id,
            status = rec.status.as_str(),
            score = rec.health.score,
            "worker updated"
        );
        Ok(rec.clone())
    }

    /// Look up one worker.
    pub fn get(&self, id: &str) -> RegistryResult<WorkerRecord> {
        let workers = self.read_workers();
        workers
            .get(id)
            .map(|slot| lock(slot).clone())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read_workers().contains_key(id)
    }

    /// Workers matching `filter`, sorted by id.
    pub fn list(&self, filter: &WorkerFilter) -> Vec<WorkerRecord> {
        let mut records = Vec::new();
        self.visit(|rec| {
            if filter.matches(rec) {
                records.push(rec.clone());
            }
        });
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    /// Ids of the workers in `group`, sorted.
    pub fn list_ids_in_group(&self, group: &str) -> Vec<WorkerId> {
        let mut ids = Vec::new();
        self.visit(|rec| {
            if rec.group.as_deref() == Some(group) {
                ids.push(rec.id.clone());
            }
        });
        ids.sort();
        ids
    }

    /// Call `f` on every record without cloning. Order is unspecified.
    pub fn visit<F: FnMut(&WorkerRecord)>(&self, mut f: F) {
        let workers = self.read_workers();
        for slot in workers.values() {
            f(&lock(slot));
        }
    }

    pub fn len(&self) -> usize {
        self.read_workers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force every worker silent for longer than `stale_threshold` offline.
    ///
    /// Returns how many workers transitioned. A worker already marked stale
    /// is not counted again.
    pub fn sweep_stale(&self, now: Timestamp, stale_threshold: Duration) -> RegistryResult<usize> {
        let issue = stale_issue(stale_threshold);
        let threshold = stale_threshold.as_secs();
        let mut transitioned = 0;
        {
            let workers = self.read_workers();
            for slot in workers.values() {
                let mut rec = lock(slot);
                if now.saturating_sub(rec.last_seen_at) <= threshold {
                    continue;
                }
                let already_marked = rec.health.issues.contains(&issue);
                if rec.status == WorkerStatus::Offline && already_marked {
                    continue;
                }
                rec.status = WorkerStatus::Offline;
                if !already_marked {
                    rec.health.issues.push(issue.clone());
                }
                rec.revision += 1;
                transitioned += 1;
                warn!(
                    worker_id = %rec.id,
                    silent_secs = now.saturating_sub(rec.last_seen_at),
                    "worker marked offline by staleness sweep"
                );
            }
        }
        if transitioned > 0 {
            self.persist()?;
        }
        Ok(transitioned)
    }

    /// Delete a worker. Returns false if it was unknown.
    pub fn remove(&self, id: &str) -> RegistryResult<bool> {
        let removed = self.write_workers().remove(id);
        let existed = removed.is_some();
        if existed {
            info!(worker_id = %id, "worker removed");
            self.persist()?;
        }
        Ok(existed)
    }

    /// Assign or clear the worker's group.
    pub fn set_group(&self, id: &str, group: Option<String>) -> RegistryResult<WorkerRecord> {
        let record = self.mutate(id, |rec| rec.group = group)?;
        info!(worker_id = %id, group = ?record.group, "worker group changed");
        Ok(record)
    }

    /// Zero the accepted and rejected counters.
    pub fn reset_counters(&self, id: &str) -> RegistryResult<WorkerRecord> {
        let record = self.mutate(id, |rec| {
            rec.metrics.accepted = 0;
            rec.metrics.rejected = 0;
        })?;
        info!(worker_id = %id, "worker counters reset");
        Ok(record)
    }

    fn mutate<F: FnOnce(&mut WorkerRecord)>(&self, id: &str, f: F) -> RegistryResult<WorkerRecord> {
        let record = {
            let workers = self.read_workers();
            let slot = workers
                .get(id)
                .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
            let mut rec = lock(slot);
            f(&mut rec);
            rec.revision += 1;
            rec.clone()
        };
        self.persist()?;
        Ok(record)
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// Copy of every record, as persisted.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot::new(self.now(), self.list(&WorkerFilter::default()))
    }

    /// Replace the registry contents with `snapshot`.
    ///
    /// The current contents are kept if the snapshot lists a worker twice.
    pub fn load_snapshot(&self, snapshot: RegistrySnapshot) -> RegistryResult<usize> {
        let mut loaded: HashMap<WorkerId, Slot> = HashMap::with_capacity(snapshot.workers.len());
        for rec in snapshot.workers {
            match loaded.entry(rec.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(RegistryError::Snapshot(format!(
                        "duplicate worker id {}",
                        rec.id
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Mutex::new(rec)));
                }
            }
        }
        let count = loaded.len();
        *self.write_workers() = loaded;
        Ok(count)
    }

    /// Load the last persisted snapshot from the store, if any.
    pub fn restore(&self) -> RegistryResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        match store.load_registry()? {
            Some(snapshot) => {
                let count = self.load_snapshot(snapshot)?;
                info!(workers = count, "worker registry restored");
                Ok(count)
            }
            None => {
                debug!("no worker registry snapshot to restore");
                Ok(0)
            }
        }
    }

    fn persist(&self) -> RegistryResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self
            .persist_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        store.save_registry(&snapshot)?;
        debug!(workers = snapshot.workers.len(), "worker registry persisted");
        Ok(())
    }

    fn refresh(&self, rec: &mut WorkerRecord, now: Timestamp) {
        let health = evaluate(rec, now, &self.policy);
        rec.status = derive_status(health.classification, rec.last_seen_at, now, &self.policy);
        rec.health = health;
        rec.revision += 1;
    }

    fn read_workers(&self) -> RwLockReadGuard<'_, HashMap<WorkerId, Slot>> {
        self.workers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_workers(&self) -> RwLockWriteGuard<'_, HashMap<WorkerId, Slot>> {
        self.workers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(slot: &Slot) -> MutexGuard<'_, WorkerRecord> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn new_record(id: WorkerId, registration: Registration, now: Timestamp) -> WorkerRecord {
    let display_name = registration
        .display_name
        .or_else(|| registration.host_info.hostname.clone())
        .unwrap_or_else(|| id.clone());
    WorkerRecord {
        id,
        display_name,
        host_info: registration.host_info,
        source_address: registration.source_address,
        status: WorkerStatus::Online,
        health: WorkerHealth::unevaluated(now),
        metrics: WorkerMetrics::default(),
        group: registration.group,
        labels: registration.labels,
        first_seen_at: now,
        last_seen_at: now,
        revision: 0,
    }
}

fn merge_registration(rec: &mut WorkerRecord, registration: Registration, now: Timestamp) {
    if let Some(name) = registration.display_name {
        rec.display_name = name;
    }
    rec.host_info = registration.host_info;
    if registration.source_address.is_some() {
        rec.source_address = registration.source_address;
    }
    if rec.group.is_none() {
        rec.group = registration.group;
    }
    for (key, value) in registration.labels {
        rec.labels.entry(key).or_insert(value);
    }
    rec.last_seen_at = now;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::ManualClock;

    const START: Timestamp = 1_700_000_000;

    fn registry() -> (WorkerRegistry, ManualClock) {
        let clock = ManualClock::new(START);
        let reg = WorkerRegistry::new(HealthPolicy::default()).with_clock(clock.clock());
        (reg, clock)
    }

    fn host(name: &str) -> HostInfo {
        HostInfo {
            hostname: Some(name.to_string()),
            hardware_id: Some(format!("{name}-hw")),
            os: Some("linux".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn register_creates_online_record() {
        let (reg, _) = registry();
        let rec = reg
            .register(Registration::new(host("rig-1")).from_address("10.0.0.1:5000"))
            .unwrap()
            .record;

        assert!(rec.id.starts_with("worker-"));
        assert_eq!(rec.display_name, "rig-1");
        assert_eq!(rec.status, WorkerStatus::Online);
        assert_eq!(rec.health.score, 100);
        assert_eq!(rec.first_seen_at, START);
        assert_eq!(rec.source_address.as_deref(), Some("10.0.0.1:5000"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn repeated_registration_is_idempotent() {
        let (reg, clock) = registry();
        let first = reg
            .register(Registration::new(host("rig-1")).in_group("rack-a"))
            .unwrap()
            .record;
        reg.apply_update(&first.id, &WorkerUpdate::unit_found(true)).unwrap();

        clock.advance(90);
        let second = reg
            .register(
                Registration::new(host("rig-1"))
                    .from_address("10.0.0.9:1")
                    .named("renamed")
                    .in_group("rack-b"),
            )
            .unwrap()
            .record;

        assert_eq!(second.id, first.id);
        assert_eq!(second.first_seen_at, START);
        assert_eq!(second.last_seen_at, START + 90);
        assert_eq!(second.metrics.accepted, 1);
        assert_eq!(second.group.as_deref(), Some("rack-a"));
        assert_eq!(second.display_name, "renamed");
        assert_eq!(second.source_address.as_deref(), Some("10.0.0.9:1"));
        assert_eq!(reg.list(&WorkerFilter::default()).len(), 1);
    }

    #[test]
    fn register_reports_whether_record_was_created() {
        let (reg, _) = registry();
        let first = reg.register(Registration::new(host("rig-1"))).unwrap();
        assert!(first.created);
        assert_eq!(first.record.revision, 1);

        let again = reg.register(Registration::new(host("rig-1"))).unwrap();
        assert!(!again.created);
        assert_eq!(again.record.id, first.record.id);

        reg.remove(&first.record.id).unwrap();
        assert!(reg.register(Registration::new(host("rig-1"))).unwrap().created);
    }

    #[test]
    fn anonymous_workers_never_merge() {
        let (reg, _) = registry();
        let a = reg
            .register(Registration::new(HostInfo::default()).from_address("10.0.0.1:1"))
            .unwrap()
            .record;
        let b = reg
            .register(Registration::new(HostInfo::default()).from_address("10.0.0.1:1"))
            .unwrap()
            .record;
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("anon-"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn apply_update_unknown_worker() {
        let (reg, _) = registry();
        let err = reg.apply_update("ghost", &WorkerUpdate::heartbeat()).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(id) if id == "ghost"));
    }

    #[test]
    fn apply_update_reevaluates_health_and_status() {
        let (reg, clock) = registry();
        let id = reg.register(Registration::new(host("rig-1"))).unwrap().record.id;

        clock.advance(10);
        let rec = reg
            .apply_update(
                &id,
                &WorkerUpdate {
                    throughput: Some(0.05),
                    temperature: Some(95.0),
                    power: Some(400.0),
                    reported_accepted: Some(1),
                    reported_rejected: Some(9),
                    ..Default::default()
                },
            )
            .unwrap();

        // 100 - 20 - 15 - 10 - 15
        assert_eq!(rec.health.score, 40);
        assert_eq!(rec.health.classification, HealthClassification::Critical);
        assert_eq!(rec.status, WorkerStatus::Offline);
        assert_eq!(rec.last_seen_at, START + 10);

        let rec = reg
            .apply_update(
                &id,
                &WorkerUpdate {
                    temperature: Some(60.0),
                    power: Some(100.0),
                    throughput: Some(50.0),
                    reported_accepted: Some(200),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(rec.health.classification, HealthClassification::Healthy);
        assert_eq!(rec.status, WorkerStatus::Online);
    }

    #[test]
    fn sweep_marks_silent_workers_offline() {
        let (reg, _) = registry();
        let id = reg.register(Registration::new(host("rig-1"))).unwrap().record.id;
        let fresh = reg.register(Registration::new(host("rig-2"))).unwrap().record.id;

        // rig-1 last seen 11 minutes before the sweep; rig-2 just now.
        reg.apply_update(&fresh, &WorkerUpdate::heartbeat()).unwrap();
        let now = START + 11 * 60;
        {
            let workers = reg.read_workers();
            lock(&workers[&fresh]).last_seen_at = now;
        }

        let transitioned = reg.sweep_stale(now, Duration::from_secs(600)).unwrap();
        assert_eq!(transitioned, 1);

        let stale = reg.get(&id).unwrap();
        assert_eq!(stale.status, WorkerStatus::Offline);
        assert!(stale
            .health
            .issues
            .contains(&"stale: no communication for 10+ minutes".to_string()));
        assert_eq!(reg.get(&fresh).unwrap().status, WorkerStatus::Online);

        // A second sweep does not count or duplicate the issue.
        assert_eq!(reg.sweep_stale(now + 60, Duration::from_secs(600)).unwrap(), 0);
        let issues = reg.get(&id).unwrap().health.issues;
        assert_eq!(issues.iter().filter(|i| i.starts_with("stale")).count(), 1);
    }

    #[test]
    fn update_after_sweep_brings_worker_back() {
        let (reg, clock) = registry();
        let id = reg.register(Registration::new(host("rig-1"))).unwrap().record.id;
        clock.advance(11 * 60);
        reg.sweep_stale(clock.now(), Duration::from_secs(600)).unwrap();
        assert_eq!(reg.get(&id).unwrap().status, WorkerStatus::Offline);

        let rec = reg.apply_update(&id, &WorkerUpdate::heartbeat()).unwrap();
        assert_eq!(rec.status, WorkerStatus::Online);
        assert!(rec.health.issues.is_empty());
    }

    #[test]
    fn list_filters_and_sorts() {
        let (reg, _) = registry();
        for (name, group) in [("c", "x"), ("a", "y"), ("b", "x")] {
            reg.register(Registration::new(host(name)).in_group(group)).unwrap();
        }

        let all = reg.list(&WorkerFilter::default());
        assert_eq!(all.len(), 3);
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let x = reg.list(&WorkerFilter::group("x"));
        assert_eq!(x.len(), 2);
        assert_eq!(reg.list_ids_in_group("x").len(), 2);
        assert!(reg.list(&WorkerFilter::status(WorkerStatus::Offline)).is_empty());
    }

    #[test]
    fn remove_drops_worker_and_group_membership() {
        let (reg, _) = registry();
        let id = reg.register(Registration::new(host("rig-1")).in_group("g")).unwrap().record.id;

        assert!(reg.remove(&id).unwrap());
        assert!(!reg.remove(&id).unwrap());
        assert!(reg.list_ids_in_group("g").is_empty());
        assert!(matches!(reg.get(&id), Err(RegistryError::NotFound(_))));
    }

    #[test]
    fn set_group_and_reset_counters() {
        let (reg, _) = registry();
        let id = reg.register(Registration::new(host("rig-1"))).unwrap().record.id;
        reg.apply_update(
            &id,
            &WorkerUpdate {
                reported_accepted: Some(50),
                reported_rejected: Some(2),
                ..Default::default()
            },
        )
        .unwrap();

        let rec = reg.set_group(&id, Some("night-shift".to_string())).unwrap();
        assert_eq!(rec.group.as_deref(), Some("night-shift"));

        let rec = reg.reset_counters(&id).unwrap();
        assert_eq!(rec.metrics.accepted, 0);
        assert_eq!(rec.metrics.rejected, 0);

        assert!(matches!(
            reg.reset_counters("ghost"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn stale_revision_is_rejected() {
        let (reg, _) = registry();
        let rec = reg.register(Registration::new(host("rig-1"))).unwrap().record;
        reg.apply_update(&rec.id, &WorkerUpdate::heartbeat()).unwrap();

        let err = reg
            .apply_update_if(&rec.id, rec.revision, &WorkerUpdate::heartbeat())
            .unwrap_err();
        assert!(matches!(err, RegistryError::StaleWrite { expected, .. } if expected == rec.revision));
    }

    #[test]
    fn computed_update_reads_current_record() {
        let (reg, _) = registry();
        let id = reg.register(Registration::new(host("rig-1"))).unwrap().record.id;
        reg.apply_update(
            &id,
            &WorkerUpdate {
                throughput: Some(10.0),
                ..Default::default()
            },
        )
        .unwrap();

        let rec = reg
            .apply_computed_update(&id, |current| WorkerUpdate {
                throughput: Some(current.metrics.throughput * 2.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rec.metrics.throughput, 20.0);
    }

    #[test]
    fn concurrent_updates_do_not_lose_counts() {
        let (reg, _) = registry();
        let ids: Vec<_> = (0..4)
            .map(|i| reg.register(Registration::new(host(&format!("rig-{i}")))).unwrap().record.id)
            .collect();

        std::thread::scope(|scope| {
            for id in &ids {
                for _ in 0..4 {
                    let reg = &reg;
                    scope.spawn(move || {
                        for _ in 0..50 {
                            reg.apply_update(id, &WorkerUpdate::unit_found(true)).unwrap();
                        }
                    });
                }
            }
        });

        for id in &ids {
            assert_eq!(reg.get(id).unwrap().metrics.accepted, 200);
        }
    }

    #[test]
    fn persisted_snapshot_restores_identical_list() {
        let store = StateStore::open_in_memory().unwrap();
        let clock = ManualClock::new(START);
        let reg = WorkerRegistry::new(HealthPolicy::default())
            .with_clock(clock.clock())
            .with_store(store.clone());

        let a = reg.register(Registration::new(host("rig-a")).in_group("g")).unwrap().record.id;
        reg.register(Registration::new(host("rig-b"))).unwrap();
        reg.apply_update(
            &a,
            &WorkerUpdate {
                throughput: Some(12.0),
                temperature: Some(70.0),
                accepted_increment: 3,
                ..Default::default()
            },
        )
        .unwrap();

        let fresh = WorkerRegistry::new(HealthPolicy::default()).with_store(store);
        assert_eq!(fresh.restore().unwrap(), 2);
        assert_eq!(
            fresh.list(&WorkerFilter::default()),
            reg.list(&WorkerFilter::default())
        );
    }

    #[test]
    fn snapshot_with_duplicate_ids_is_rejected() {
        let (reg, _) = registry();
        let rec = reg.register(Registration::new(host("rig-1"))).unwrap().record;
        let snapshot = RegistrySnapshot::new(START, vec![rec.clone(), rec]);

        let err = reg.load_snapshot(snapshot).unwrap_err();
        assert!(matches!(err, RegistryError::Snapshot(_)));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn restore_without_store_is_noop() {
        let (reg, _) = registry();
        assert_eq!(reg.restore().unwrap(), 0);
        assert!(reg.is_empty());
    }
}
