//! Action Queue Core
//!
//! In-memory ordered collection of pending actions, kept consistent with its durable
//! snapshot. Every mutation persists the full queue before returning. Persistence
//! failures never fail the caller: the in-memory queue stays authoritative for the
//! session and the failure is logged and counted.

use crate::action::PendingAction;
use crate::store::{KeyValueStore, SnapshotStore};
use crate::types::ActionId;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Replay retry policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts after which an action moves to the dead-letter list.
    /// `None` retains failing actions indefinitely.
    pub max_attempts: Option<u32>,
}

/// What happened to an action after a failed attempt was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Still pending, in its original position
    Retained { attempts: u32 },
    /// Moved to the dead-letter list
    DeadLettered { attempts: u32 },
    /// The action was no longer in the queue
    Missing,
}

/// Durable FIFO of pending actions
pub struct ActionQueue {
    pending: RwLock<Vec<PendingAction>>,
    dead_letters: RwLock<Vec<PendingAction>>,
    snapshot: SnapshotStore,
    dead_letter_snapshot: SnapshotStore,
    policy: RetryPolicy,
    count_tx: watch::Sender<usize>,
    persist_failures: AtomicU64,
}

impl ActionQueue {
    /// Open the queue, hydrating from any prior snapshot.
    pub fn open(backing: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Self {
        let snapshot = SnapshotStore::pending(backing.clone());
        let dead_letter_snapshot = SnapshotStore::dead_letters(backing);

        let pending = dedupe_by_id(snapshot.load());
        let dead_letters = dead_letter_snapshot.load();
        let (count_tx, _) = watch::channel(pending.len());

        info!(
            pending = pending.len(),
            dead_letters = dead_letters.len(),
            max_attempts = ?policy.max_attempts,
            "Opened action queue"
        );

        Self {
            pending: RwLock::new(pending),
            dead_letters: RwLock::new(dead_letters),
            snapshot,
            dead_letter_snapshot,
            policy,
            count_tx,
            persist_failures: AtomicU64::new(0),
        }
    }

    /// Open the queue and wrap it for sharing with the coordinator and monitor.
    pub fn shared(backing: Arc<dyn KeyValueStore>, policy: RetryPolicy) -> Arc<Self> {
        Arc::new(Self::open(backing, policy))
    }

    /// Append a new action and persist. Never fails the caller.
    pub fn add_pending_action(&self, kind: impl Into<String>, payload: Value) -> PendingAction {
        let action = PendingAction::new(kind, payload);
        let len = {
            let mut pending = self.pending.write();
            pending.push(action.clone());
            self.persist_pending(&pending);
            pending.len()
        };
        self.count_tx.send_replace(len);

        debug!(
            action_id = %action.id,
            kind = %action.kind,
            queue_size = len,
            "Enqueued pending action"
        );
        action
    }

    /// Remove the action with `id`. Returns false (and does nothing) when absent.
    pub fn remove_action(&self, id: &ActionId) -> bool {
        let len = {
            let mut pending = self.pending.write();
            let before = pending.len();
            pending.retain(|action| &action.id != id);
            if pending.len() == before {
                return false;
            }
            self.persist_pending(&pending);
            pending.len()
        };
        self.count_tx.send_replace(len);
        debug!(action_id = %id, queue_size = len, "Removed pending action");
        true
    }

    /// Empty the queue and delete its snapshot. Idempotent.
    pub fn clear_pending_actions(&self) {
        let removed = {
            let mut pending = self.pending.write();
            let removed = pending.len();
            pending.clear();
            if let Err(err) = self.snapshot.clear() {
                self.note_persist_failure(self.snapshot.key(), &err.to_string());
            }
            removed
        };
        self.count_tx.send_replace(0);
        info!(removed, "Cleared pending actions");
    }

    /// Point-in-time copy of the queue in replay order.
    pub fn snapshot(&self) -> Vec<PendingAction> {
        self.pending.read().clone()
    }

    pub fn get(&self, id: &ActionId) -> Option<PendingAction> {
        self.pending.read().iter().find(|a| &a.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.pending.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Pending-count feed for indicator consumers.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    /// Number of snapshot writes that failed this session.
    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.load(Ordering::Relaxed)
    }

    /// Record a failed replay attempt. The action keeps its position unless the
    /// retry policy is exhausted, in which case it moves to the dead-letter list.
    pub fn record_failure(&self, id: &ActionId, error: &str) -> FailureDisposition {
        let mut pending = self.pending.write();
        let Some(index) = pending.iter().position(|a| &a.id == id) else {
            return FailureDisposition::Missing;
        };

        let action = &mut pending[index];
        action.attempts = action.attempts.saturating_add(1);
        action.last_error = Some(error.to_string());
        let attempts = action.attempts;

        let exhausted = self
            .policy
            .max_attempts
            .is_some_and(|max| attempts >= max);

        if !exhausted {
            self.persist_pending(&pending);
            return FailureDisposition::Retained { attempts };
        }

        let action = pending.remove(index);
        {
            let mut dead = self.dead_letters.write();
            dead.push(action);
            if let Err(err) = self.dead_letter_snapshot.save(&dead) {
                self.note_persist_failure(self.dead_letter_snapshot.key(), &err.to_string());
            }
        }
        self.persist_pending(&pending);
        let len = pending.len();
        drop(pending);
        self.count_tx.send_replace(len);

        warn!(
            action_id = %id,
            attempts,
            error = %error,
            "Action exhausted replay attempts, moved to dead letters"
        );
        FailureDisposition::DeadLettered { attempts }
    }

    /// Actions that exhausted their replay attempts, oldest first.
    pub fn dead_letters(&self) -> Vec<PendingAction> {
        self.dead_letters.read().clone()
    }

    /// Move every dead-lettered action back to the tail of the queue with its
    /// attempt count reset. Returns the number of actions requeued.
    pub fn requeue_dead_letters(&self) -> usize {
        // Lock order matches record_failure: pending, then dead letters.
        let mut pending = self.pending.write();
        let mut dead = self.dead_letters.write();
        if dead.is_empty() {
            return 0;
        }

        // A dead letter whose id is already pending is dropped, not duplicated.
        let known: HashSet<ActionId> = pending.iter().map(|a| a.id.clone()).collect();
        let mut requeued = 0;
        for mut action in dead.drain(..) {
            if known.contains(&action.id) {
                debug!(action_id = %action.id, "Dead letter already pending, skipping");
                continue;
            }
            action.attempts = 0;
            action.last_error = None;
            pending.push(action);
            requeued += 1;
        }
        self.persist_pending(&pending);
        if let Err(err) = self.dead_letter_snapshot.clear() {
            self.note_persist_failure(self.dead_letter_snapshot.key(), &err.to_string());
        }
        let len = pending.len();
        drop(dead);
        drop(pending);
        self.count_tx.send_replace(len);

        info!(requeued, queue_size = len, "Requeued dead-lettered actions");
        requeued
    }

    /// Drop every dead-lettered action. Returns the number removed.
    pub fn purge_dead_letters(&self) -> usize {
        let mut dead = self.dead_letters.write();
        let purged = dead.len();
        dead.clear();
        if let Err(err) = self.dead_letter_snapshot.clear() {
            self.note_persist_failure(self.dead_letter_snapshot.key(), &err.to_string());
        }
        info!(purged, "Purged dead-lettered actions");
        purged
    }

    fn persist_pending(&self, pending: &[PendingAction]) {
        if let Err(err) = self.snapshot.save(pending) {
            self.note_persist_failure(self.snapshot.key(), &err.to_string());
        }
    }

    fn note_persist_failure(&self, key: &str, error: &str) {
        let failures = self.persist_failures.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            key,
            error,
            failures,
            "Failed to persist queue snapshot; in-memory queue remains authoritative"
        );
    }
}

/// Keep the first occurrence of each id.
fn dedupe_by_id(actions: Vec<PendingAction>) -> Vec<PendingAction> {
    let mut seen = HashSet::new();
    let total = actions.len();
    let deduped: Vec<PendingAction> = actions
        .into_iter()
        .filter(|a| seen.insert(a.id.clone()))
        .collect();
    if deduped.len() != total {
        warn!(
            dropped = total - deduped.len(),
            "Dropped duplicate action ids from snapshot"
        );
    }
    deduped
}
