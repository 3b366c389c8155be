//! Drain behavior end to end: ordering, failure isolation, unknown kinds, re-entrancy

use crate::integration::test_utils::{open_queue, RecordingExecutor};
use async_trait::async_trait;
use futures::FutureExt;
use serde_json::json;
use standby::error::ExecutionError;
use standby::executor::{ActionExecutor, DispatchTable};
use standby::queue::{ActionQueue, RetryPolicy};
use standby::replay::{DrainStatus, ReplayCoordinator, ReplayOptions};
use standby::store::MemoryKeyValueStore;
use standby::types::ActionId;
use standby::PendingAction;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Notify, Semaphore};

fn memory_queue() -> Arc<ActionQueue> {
    ActionQueue::shared(Arc::new(MemoryKeyValueStore::new()), RetryPolicy::default())
}

#[tokio::test]
async fn test_drain_replays_in_enqueue_order_and_empties_queue() {
    let queue = memory_queue();
    let ids: Vec<ActionId> = (0..5)
        .map(|i| queue.add_pending_action("like", json!({ "n": i })).id)
        .collect();

    let coordinator = ReplayCoordinator::new(Arc::clone(&queue), ReplayOptions::default());
    let executor = RecordingExecutor::new();
    assert_eq!(coordinator.drain(&executor).await, DrainStatus::Ran);

    assert_eq!(executor.calls(), ids);
    assert!(queue.is_empty());
    assert_eq!(coordinator.last_report().unwrap().succeeded(), 5);
}

#[tokio::test]
async fn test_partial_failure_retains_only_the_failed_action() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");
    let queue = open_queue(&store_dir, RetryPolicy::default());
    let a = queue.add_pending_action("post_comment", json!({"text": "a"}));
    let b = queue.add_pending_action("post_comment", json!({"text": "b"}));
    let c = queue.add_pending_action("post_comment", json!({"text": "c"}));

    let executor = RecordingExecutor::new();
    executor.fail(&b.id);
    let coordinator = ReplayCoordinator::new(Arc::clone(&queue), ReplayOptions::default());
    coordinator.drain(&executor).await;

    assert_eq!(executor.calls(), vec![a.id, b.id.clone(), c.id]);
    let remaining = queue.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, b.id);
    assert_eq!(remaining[0].attempts, 1);
    drop(coordinator);
    drop(queue);

    // The retained action and its attempt count are durable
    let reopened = open_queue(&store_dir, RetryPolicy::default());
    let persisted = reopened.snapshot();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].id, b.id);
    assert_eq!(persisted[0].attempts, 1);
    assert!(persisted[0].last_error.is_some());
}

#[tokio::test]
async fn test_failed_action_succeeds_on_a_later_drain() {
    let queue = memory_queue();
    let flaky = queue.add_pending_action("like", json!(null));
    let executor = RecordingExecutor::new();
    executor.fail(&flaky.id);
    let coordinator = ReplayCoordinator::new(Arc::clone(&queue), ReplayOptions::default());

    coordinator.drain(&executor).await;
    assert_eq!(queue.len(), 1);

    executor.recover(&flaky.id);
    coordinator.drain(&executor).await;
    assert!(queue.is_empty());
    assert_eq!(coordinator.drains_completed(), 2);
    assert_eq!(coordinator.last_report().unwrap().actions[0].attempt, 2);
}

#[tokio::test]
async fn test_unknown_kind_is_retained_and_others_proceed() {
    let queue = memory_queue();
    queue.add_pending_action("like", json!({"postId": 1}));
    let orphan = queue.add_pending_action("mystery", json!({}));
    queue.add_pending_action("like", json!({"postId": 2}));

    let mut table = DispatchTable::new();
    table
        .register_fn("like", |_action| async { Ok(()) }.boxed())
        .unwrap();

    let coordinator = ReplayCoordinator::new(Arc::clone(&queue), ReplayOptions::default());
    coordinator.drain(&table).await;

    let remaining = queue.snapshot();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, orphan.id);
    assert!(remaining[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("mystery")));

    let report = coordinator.last_report().unwrap();
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
}

#[tokio::test]
async fn test_dead_letter_after_max_attempts() {
    let queue = ActionQueue::shared(
        Arc::new(MemoryKeyValueStore::new()),
        RetryPolicy {
            max_attempts: Some(3),
        },
    );
    let doomed = queue.add_pending_action("like", json!(null));
    let executor = RecordingExecutor::new();
    executor.fail(&doomed.id);
    let coordinator = ReplayCoordinator::new(Arc::clone(&queue), ReplayOptions::default());

    for _ in 0..3 {
        coordinator.drain(&executor).await;
    }
    assert!(queue.is_empty());
    assert_eq!(queue.dead_letters().len(), 1);
    assert_eq!(coordinator.last_report().unwrap().dead_lettered(), 1);

    // Dead letters are not replayed
    coordinator.drain(&executor).await;
    assert_eq!(executor.calls().len(), 3);
}

/// Blocks every execution until the gate opens
struct GatedExecutor {
    gate: Semaphore,
    started: Notify,
    inner: RecordingExecutor,
}

impl GatedExecutor {
    fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            started: Notify::new(),
            inner: RecordingExecutor::new(),
        }
    }

    fn open(&self) {
        self.gate.add_permits(1);
    }
}

#[async_trait]
impl ActionExecutor for GatedExecutor {
    async fn execute(&self, action: &PendingAction) -> Result<(), ExecutionError> {
        self.started.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        self.inner.execute(action).await
    }
}

#[tokio::test]
async fn test_concurrent_drain_is_coalesced_and_each_action_runs_once() {
    let queue = memory_queue();
    let first = queue.add_pending_action("like", json!(1));
    let second = queue.add_pending_action("like", json!(2));

    let coordinator = ReplayCoordinator::shared(Arc::clone(&queue), ReplayOptions::default());
    let executor = Arc::new(GatedExecutor::new());

    let in_flight = {
        let coordinator = Arc::clone(&coordinator);
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { coordinator.drain(executor.as_ref()).await })
    };

    // First drain is now blocked inside the executor
    executor.started.notified().await;
    assert!(coordinator.is_draining());

    // Enqueued mid-drain: not in the running pass's snapshot
    let late = queue.add_pending_action("like", json!(3));
    assert_eq!(
        coordinator.drain(executor.as_ref()).await,
        DrainStatus::Coalesced
    );

    executor.open();
    let status = tokio::time::timeout(Duration::from_secs(5), in_flight)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, DrainStatus::Ran);

    assert_eq!(executor.inner.calls(), vec![first.id, second.id, late.id]);
    assert!(queue.is_empty());
    assert!(!coordinator.is_draining());
    assert_eq!(coordinator.drains_completed(), 1);
    assert_eq!(coordinator.last_report().unwrap().passes, 2);
}

#[tokio::test]
async fn test_removal_during_drain_skips_the_action() {
    let queue = memory_queue();
    let first = queue.add_pending_action("like", json!(1));
    let cancelled = queue.add_pending_action("like", json!(2));

    let coordinator = ReplayCoordinator::shared(Arc::clone(&queue), ReplayOptions::default());
    let executor = Arc::new(GatedExecutor::new());
    let in_flight = {
        let coordinator = Arc::clone(&coordinator);
        let executor = Arc::clone(&executor);
        tokio::spawn(async move { coordinator.drain(executor.as_ref()).await })
    };

    executor.started.notified().await;
    assert!(queue.remove_action(&cancelled.id));
    executor.open();
    in_flight.await.unwrap();

    assert_eq!(executor.inner.calls(), vec![first.id]);
    assert!(queue.is_empty());
}
