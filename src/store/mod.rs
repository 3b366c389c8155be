//! Durable Store
//!
//! Key-value persistence that survives process restarts, and the snapshot adapter
//! that keeps a serialized action sequence under one fixed key.

pub mod memory;
pub mod persistence;

pub use memory::MemoryKeyValueStore;
pub use persistence::SledKeyValueStore;

use crate::action::PendingAction;
use crate::error::StorageError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key holding the pending action snapshot
pub const PENDING_ACTIONS_KEY: &str = "standby.pending_actions";

/// Key holding actions that exhausted their replay attempts
pub const DEAD_LETTERS_KEY: &str = "standby.dead_letters";

/// Key-value backing interface
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Full-replace snapshot of an action sequence under a fixed key.
#[derive(Clone)]
pub struct SnapshotStore {
    backing: Arc<dyn KeyValueStore>,
    key: &'static str,
}

impl SnapshotStore {
    pub fn new(backing: Arc<dyn KeyValueStore>, key: &'static str) -> Self {
        Self { backing, key }
    }

    /// Snapshot store for the pending action queue
    pub fn pending(backing: Arc<dyn KeyValueStore>) -> Self {
        Self::new(backing, PENDING_ACTIONS_KEY)
    }

    /// Snapshot store for dead-lettered actions
    pub fn dead_letters(backing: Arc<dyn KeyValueStore>) -> Self {
        Self::new(backing, DEAD_LETTERS_KEY)
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Load the last persisted snapshot.
    ///
    /// Absent, unreadable, and unparsable values all load as empty. Failures are logged.
    pub fn load(&self) -> Vec<PendingAction> {
        let raw = match self.backing.get(self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(key = self.key, error = %err, "Failed to read snapshot, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<Vec<PendingAction>>(&raw) {
            Ok(actions) => {
                debug!(key = self.key, count = actions.len(), "Loaded snapshot");
                actions
            }
            Err(err) => {
                warn!(
                    key = self.key,
                    bytes = raw.len(),
                    error = %err,
                    "Discarding malformed snapshot"
                );
                Vec::new()
            }
        }
    }

    /// Serialize the full sequence and overwrite the stored value.
    pub fn save(&self, actions: &[PendingAction]) -> Result<(), StorageError> {
        let value = serde_json::to_vec(actions)?;
        self.backing.set(self.key, value)
    }

    /// Remove the key entirely.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.backing.remove(self.key)
    }
}
