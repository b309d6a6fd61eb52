//! StateStore: redb-backed persistence for fleetgrid.
//!
//! Stores opaque snapshot blobs keyed by name. The worker registry writes
//! its whole state as one JSON blob after every mutation and reads it
//! back at startup. The store supports both on-disk and in-memory
//! backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Raw blobs ──────────────────────────────────────────────────

    /// Insert or replace a named blob.
    pub fn put_blob(&self, key: &str, blob: &[u8]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            table.insert(key, blob).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, bytes = blob.len(), "snapshot blob stored");
        Ok(())
    }

    /// Read a named blob.
    pub fn get_blob(&self, key: &str) -> StateResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
        let blob = table
            .get(key)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_vec());
        Ok(blob)
    }

    /// Delete a named blob. Returns true if it existed.
    pub fn delete_blob(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(SNAPSHOTS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Worker registry ────────────────────────────────────────────

    /// Persist the worker registry snapshot blob.
    pub fn save_registry_snapshot(&self, blob: &[u8]) -> StateResult<()> {
        self.put_blob(WORKER_REGISTRY_KEY, blob)
    }

    /// Load the worker registry snapshot blob, if one was ever saved.
    pub fn load_registry_snapshot(&self) -> StateResult<Option<Vec<u8>>> {
        self.get_blob(WORKER_REGISTRY_KEY)
    }

    /// Encode and persist a typed registry snapshot.
    pub fn save_registry(&self, snapshot: &RegistrySnapshot) -> StateResult<()> {
        let blob = serde_json::to_vec(snapshot).map_err(map_err!(Serialize))?;
        self.save_registry_snapshot(&blob)
    }

    /// Load and decode the registry snapshot.
    pub fn load_registry(&self) -> StateResult<Option<RegistrySnapshot>> {
        let Some(blob) = self.load_registry_snapshot()? else {
            return Ok(None);
        };
        let snapshot: RegistrySnapshot =
            serde_json::from_slice(&blob).map_err(map_err!(Deserialize))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateError::SnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        Ok(Some(snapshot))
    }
}
