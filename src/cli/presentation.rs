//! CLI presentation: text and json formatters per command family.

use crate::action::PendingAction;
use crate::error::{ApiError, StorageError};
use crate::queue::FailureDisposition;
use crate::replay::{ActionOutcome, DrainReport};
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

/// Queue summary shown by `standby status`
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub store_path: PathBuf,
    pub pending: usize,
    pub dead_letters: usize,
    pub oldest_enqueued_at: Option<u64>,
    pub endpoints: Vec<String>,
    pub max_attempts: Option<u32>,
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(StorageError::Encoding(e)))
}

fn format_age(ms: u64) -> String {
    let secs = ms / 1000;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86_400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86_400)
    }
}

fn format_timestamp(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub fn format_actions_text(actions: &[PendingAction], now_ms: u64, empty_message: &str) -> String {
    if actions.is_empty() {
        return empty_message.to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "ID", "Kind", "Enqueued", "Age", "Attempts", "Last Error"]);
    for (position, action) in actions.iter().enumerate() {
        table.add_row(vec![
            (position + 1).to_string(),
            action.id.to_string(),
            action.kind.clone(),
            format_timestamp(action.enqueued_at),
            format_age(action.age_ms(now_ms)),
            action.attempts.to_string(),
            action
                .last_error
                .as_deref()
                .map(|e| truncate(e, 48))
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    format!("{}\n\nTotal: {} action(s)", table, actions.len())
}

pub fn format_actions_json(actions: &[PendingAction]) -> Result<String, ApiError> {
    to_pretty_json(&json!({ "actions": actions, "total": actions.len() }))
}

pub fn format_status_text(status: &QueueStatus, now_ms: u64) -> String {
    let mut output = format!("Store: {}\n", status.store_path.display());
    output.push_str(&format!("Pending actions: {}\n", status.pending));
    if let Some(oldest) = status.oldest_enqueued_at {
        output.push_str(&format!(
            "Oldest pending: {} ({} ago)\n",
            format_timestamp(oldest),
            format_age(now_ms.saturating_sub(oldest))
        ));
    }
    output.push_str(&format!("Dead letters: {}\n", status.dead_letters));
    match status.max_attempts {
        Some(max) => output.push_str(&format!("Max attempts: {}\n", max)),
        None => output.push_str("Max attempts: unlimited\n"),
    }
    if status.endpoints.is_empty() {
        output.push_str("Endpoints: (none configured)");
    } else {
        output.push_str(&format!("Endpoints: {}", status.endpoints.join(", ")));
    }
    output
}

pub fn format_status_json(status: &QueueStatus) -> Result<String, ApiError> {
    to_pretty_json(status)
}

fn outcome_label(outcome: &ActionOutcome) -> String {
    match outcome {
        ActionOutcome::Succeeded => "ok".to_string(),
        ActionOutcome::Failed {
            disposition: FailureDisposition::DeadLettered { .. },
            ..
        } => "dead-lettered".to_string(),
        ActionOutcome::Failed { .. } => "retained".to_string(),
    }
}

pub fn format_drain_report_text(report: &DrainReport, remaining: usize) -> String {
    if report.actions.is_empty() {
        return "Nothing to replay.".to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["ID", "Kind", "Attempt", "Duration", "Result", "Error"]);
    for entry in &report.actions {
        let error = match &entry.outcome {
            ActionOutcome::Failed { error, .. } => truncate(&error.to_string(), 48),
            ActionOutcome::Succeeded => "-".to_string(),
        };
        table.add_row(vec![
            entry.action_id.to_string(),
            entry.kind.clone(),
            entry.attempt.to_string(),
            format!("{}ms", entry.duration_ms),
            outcome_label(&entry.outcome),
            error,
        ]);
    }
    format!(
        "{}\n\nReplayed: {}  Failed: {}  Dead-lettered: {}  Remaining: {}",
        table,
        report.succeeded(),
        report.failed(),
        report.dead_lettered(),
        remaining
    )
}

pub fn format_drain_report_json(report: &DrainReport, remaining: usize) -> Result<String, ApiError> {
    let actions: Vec<_> = report
        .actions
        .iter()
        .map(|entry| {
            let error = match &entry.outcome {
                ActionOutcome::Failed { error, .. } => Some(error.to_string()),
                ActionOutcome::Succeeded => None,
            };
            json!({
                "id": entry.action_id,
                "kind": entry.kind,
                "attempt": entry.attempt,
                "duration_ms": entry.duration_ms,
                "result": outcome_label(&entry.outcome),
                "error": error,
            })
        })
        .collect();
    to_pretty_json(&json!({
        "started_at": report.started_at_ms,
        "finished_at": report.finished_at_ms,
        "passes": report.passes,
        "succeeded": report.succeeded(),
        "failed": report.failed(),
        "dead_lettered": report.dead_lettered(),
        "remaining": remaining,
        "actions": actions,
    }))
}
