//! Queue durability against a real sled store

use crate::integration::test_utils::open_queue;
use serde_json::json;
use standby::queue::RetryPolicy;
use standby::store::{KeyValueStore, SledKeyValueStore, PENDING_ACTIONS_KEY};
use tempfile::TempDir;

#[test]
fn test_queue_survives_restart() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");

    let before = {
        let queue = open_queue(&store_dir, RetryPolicy::default());
        queue.add_pending_action("post_comment", json!({"postId": 7, "text": "hello"}));
        queue.add_pending_action("like", json!({"postId": 7}));
        queue.add_pending_action("follow", json!(null));
        queue.snapshot()
    };

    let queue = open_queue(&store_dir, RetryPolicy::default());
    assert_eq!(queue.snapshot(), before);
    assert_eq!(queue.snapshot()[0].payload["text"], "hello");
}

#[test]
fn test_removal_and_clear_are_durable() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");

    let kept = {
        let queue = open_queue(&store_dir, RetryPolicy::default());
        let a = queue.add_pending_action("a", json!(1));
        let b = queue.add_pending_action("b", json!(2));
        assert!(queue.remove_action(&a.id));
        b
    };

    {
        let queue = open_queue(&store_dir, RetryPolicy::default());
        assert_eq!(queue.snapshot(), vec![kept]);
        queue.clear_pending_actions();
        queue.clear_pending_actions();
        assert!(queue.is_empty());
    }

    let queue = open_queue(&store_dir, RetryPolicy::default());
    assert!(queue.is_empty());
    assert_eq!(queue.persist_failures(), 0);
}

#[test]
fn test_malformed_snapshot_loads_empty_and_is_overwritten() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");

    {
        let store = SledKeyValueStore::new(&store_dir).unwrap();
        store
            .set(PENDING_ACTIONS_KEY, b"{ definitely not a queue".to_vec())
            .unwrap();
    }

    {
        let queue = open_queue(&store_dir, RetryPolicy::default());
        assert!(queue.is_empty());
        queue.add_pending_action("like", json!({"postId": 1}));
    }

    let queue = open_queue(&store_dir, RetryPolicy::default());
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.snapshot()[0].kind, "like");
}

#[test]
fn test_dead_letters_persist_separately() {
    let temp = TempDir::new().unwrap();
    let store_dir = temp.path().join("store");
    let policy = RetryPolicy {
        max_attempts: Some(1),
    };

    {
        let queue = open_queue(&store_dir, policy);
        let doomed = queue.add_pending_action("like", json!(null));
        queue.add_pending_action("follow", json!(null));
        queue.record_failure(&doomed.id, "410 Gone");
    }

    let queue = open_queue(&store_dir, policy);
    assert_eq!(queue.len(), 1);
    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].last_error.as_deref(), Some("410 Gone"));

    assert_eq!(queue.requeue_dead_letters(), 1);
    let kinds: Vec<String> = queue.snapshot().into_iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec!["follow".to_string(), "like".to_string()]);
    assert_eq!(queue.snapshot()[1].attempts, 0);
}
