//! Pending action record
//!
//! A recorded, not-yet-confirmed user effect awaiting replay against the backend.
//! The serialized field names are part of the persisted snapshot format.

use crate::types::{now_millis, ActionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAction {
    /// Unique id, assigned at enqueue time
    pub id: ActionId,
    /// Tag the executor dispatches on
    pub kind: String,
    /// Opaque replay data
    pub payload: Value,
    /// Creation time, milliseconds since Unix epoch
    pub enqueued_at: u64,
    /// Failed replay attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Most recent failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingAction {
    /// Build a fresh action with a new id and the current timestamp.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: ActionId::generate(),
            kind: kind.into(),
            payload,
            enqueued_at: now_millis(),
            attempts: 0,
            last_error: None,
        }
    }

    /// Age of the action relative to `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.enqueued_at)
    }
}
