//! Connectivity transitions driving drains

use crate::integration::test_utils::{wait_until, RecordingExecutor};
use serde_json::json;
use standby::connectivity::{ConnectivityMonitor, ConnectivitySignal};
use standby::executor::ActionExecutor;
use standby::queue::{ActionQueue, RetryPolicy};
use standby::replay::{ReplayCoordinator, ReplayOptions};
use standby::store::MemoryKeyValueStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    signal: ConnectivitySignal,
    queue: Arc<ActionQueue>,
    coordinator: Arc<ReplayCoordinator>,
    executor: Arc<RecordingExecutor>,
    monitor: ConnectivityMonitor,
}

fn harness(online: bool, executor: RecordingExecutor) -> Harness {
    let signal = ConnectivitySignal::new(online);
    let queue = ActionQueue::shared(Arc::new(MemoryKeyValueStore::new()), RetryPolicy::default());
    let coordinator = ReplayCoordinator::shared(Arc::clone(&queue), ReplayOptions::default());
    let executor = Arc::new(executor);
    let monitor = ConnectivityMonitor::new(
        signal.clone(),
        Arc::clone(&coordinator),
        Arc::clone(&executor) as Arc<dyn ActionExecutor>,
    );
    Harness {
        signal,
        queue,
        coordinator,
        executor,
        monitor,
    }
}

#[tokio::test]
async fn test_online_transition_drains_queue() {
    let h = harness(false, RecordingExecutor::new());
    let subscription = h.monitor.start();
    assert!(!h.monitor.status());

    h.queue.add_pending_action("like", json!({"postId": 1}));
    h.queue.add_pending_action("like", json!({"postId": 2}));

    assert!(h.signal.set_online(true));
    assert!(wait_until(Duration::from_secs(5), || h.coordinator.drains_completed() == 1).await);

    assert!(h.queue.is_empty());
    assert_eq!(h.executor.calls().len(), 2);
    assert_eq!(subscription.drains_triggered(), 1);
    assert!(subscription.is_active());
}

#[tokio::test]
async fn test_offline_transition_and_repeated_online_do_not_drain() {
    let h = harness(true, RecordingExecutor::new());
    let subscription = h.monitor.start();
    h.queue.add_pending_action("like", json!(null));

    // Already online: a repeated report is not a transition
    assert!(!h.signal.set_online(true));
    assert!(h.signal.set_online(false));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(subscription.drains_triggered(), 0);
    assert_eq!(h.coordinator.drains_completed(), 0);
    assert_eq!(h.queue.len(), 1);
    assert!(h.executor.calls().is_empty());
}

#[tokio::test]
async fn test_unsubscribed_monitor_no_longer_drains() {
    let h = harness(false, RecordingExecutor::new());
    let subscription = h.monitor.start();
    subscription.unsubscribe();

    h.queue.add_pending_action("like", json!(null));
    h.signal.set_online(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.coordinator.drains_completed(), 0);
    assert_eq!(h.queue.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rapid_flapping_never_overlaps_executions() {
    let h = harness(false, RecordingExecutor::with_delay(Duration::from_millis(2)));
    let _subscription = h.monitor.start();

    let ids: HashSet<_> = (0..20)
        .map(|i| h.queue.add_pending_action("like", json!({ "n": i })).id)
        .collect();

    for _ in 0..10 {
        h.signal.set_online(true);
        tokio::task::yield_now().await;
        h.signal.set_online(false);
        tokio::task::yield_now().await;
    }
    h.signal.set_online(true);

    assert!(
        wait_until(Duration::from_secs(10), || {
            h.queue.is_empty() && !h.coordinator.is_draining()
        })
        .await
    );

    let calls = h.executor.calls();
    assert_eq!(calls.len(), ids.len(), "each action executes exactly once");
    assert_eq!(calls.iter().cloned().collect::<HashSet<_>>(), ids);
    assert_eq!(h.executor.max_concurrency(), 1);
}

#[tokio::test]
async fn test_pending_count_watch_tracks_queue() {
    let h = harness(false, RecordingExecutor::new());
    let _subscription = h.monitor.start();
    let mut count = h.queue.subscribe_count();
    assert_eq!(*count.borrow_and_update(), 0);

    h.queue.add_pending_action("like", json!(null));
    count.changed().await.unwrap();
    assert_eq!(*count.borrow_and_update(), 1);

    h.signal.set_online(true);
    assert!(wait_until(Duration::from_secs(5), || *count.borrow() == 0).await);
}

#[tokio::test]
async fn test_online_immediately_after_start_triggers_drain() {
    let h = harness(false, RecordingExecutor::new());
    let queued = h.queue.add_pending_action("like", json!({"postId": 3}));

    // No yield between start and the transition
    let subscription = h.monitor.start();
    h.signal.set_online(true);

    assert!(wait_until(Duration::from_secs(5), || h.coordinator.drains_completed() == 1).await);
    assert!(h.queue.is_empty());
    assert_eq!(h.executor.calls(), vec![queued.id]);
    assert_eq!(subscription.drains_triggered(), 1);
}

#[tokio::test]
async fn test_cycle_before_listener_runs_triggers_exactly_one_drain() {
    let h = harness(true, RecordingExecutor::new());
    h.queue.add_pending_action("like", json!(null));
    h.queue.add_pending_action("follow", json!(null));

    let subscription = h.monitor.start();
    assert!(h.signal.set_online(false));
    assert!(h.signal.set_online(true));

    assert!(wait_until(Duration::from_secs(5), || h.coordinator.drains_completed() == 1).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(subscription.drains_triggered(), 1);
    assert_eq!(h.coordinator.drains_completed(), 1);
    assert!(h.queue.is_empty());
    assert_eq!(h.executor.calls().len(), 2);
}
