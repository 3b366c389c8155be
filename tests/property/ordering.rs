//! Property-based tests for FIFO ordering and snapshot round-trips

use proptest::prelude::*;
use serde_json::json;
use standby::queue::{ActionQueue, RetryPolicy};
use standby::store::{KeyValueStore, MemoryKeyValueStore};
use standby::types::ActionId;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Add(String),
    /// Remove the nth live action (modulo queue length)
    Remove(usize),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => "[a-z_]{1,12}".prop_map(Op::Add),
        3 => any::<usize>().prop_map(Op::Remove),
        1 => Just(Op::Clear),
    ]
}

/// Queue contents always match a plain Vec model, in order
#[test]
fn test_queue_matches_fifo_model() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(op_strategy(), 0..40), |ops| {
            let queue = ActionQueue::open(Arc::new(MemoryKeyValueStore::new()), RetryPolicy::default());
            let mut model: Vec<(ActionId, String)> = Vec::new();

            for op in ops {
                match op {
                    Op::Add(kind) => {
                        let action = queue.add_pending_action(kind.clone(), json!({ "kind": kind }));
                        model.push((action.id, kind));
                    }
                    Op::Remove(n) => {
                        if model.is_empty() {
                            continue;
                        }
                        let (id, _) = model.remove(n % model.len());
                        prop_assert!(queue.remove_action(&id));
                        prop_assert!(!queue.remove_action(&id));
                    }
                    Op::Clear => {
                        queue.clear_pending_actions();
                        model.clear();
                    }
                }

                let actual: Vec<(ActionId, String)> = queue
                    .snapshot()
                    .into_iter()
                    .map(|a| (a.id, a.kind))
                    .collect();
                prop_assert_eq!(&actual, &model);
            }

            Ok(())
        })
        .unwrap();
}

/// Reopening over the same backing store yields the same queue
#[test]
fn test_reopen_preserves_queue() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &prop::collection::vec(("[a-z]{1,8}", any::<i64>()), 0..25),
            |entries| {
                let backing = MemoryKeyValueStore::new();
                let first = ActionQueue::open(
                    Arc::new(backing.clone()) as Arc<dyn KeyValueStore>,
                    RetryPolicy::default(),
                );
                for (kind, value) in &entries {
                    first.add_pending_action(kind.clone(), json!({ "value": value }));
                }

                let reopened = ActionQueue::open(Arc::new(backing), RetryPolicy::default());
                prop_assert_eq!(reopened.snapshot(), first.snapshot());
                Ok(())
            },
        )
        .unwrap();
}
