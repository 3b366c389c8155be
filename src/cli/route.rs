//! CLI route: single route table and run context. Dispatches to the queue and presentation.

use crate::config::{ConfigLoader, StandbyConfig};
use crate::error::ApiError;
use crate::queue::ActionQueue;
use crate::replay::ReplayCoordinator;
use crate::store::{KeyValueStore, SledKeyValueStore};
use crate::transport::dispatch_table_from_endpoints;
use crate::types::{now_millis, ActionId};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::cli::parse::{Commands, DeadLetterCommands};
use crate::cli::presentation::{
    format_actions_json, format_actions_text, format_drain_report_json,
    format_drain_report_text, format_status_json, format_status_text, QueueStatus,
};

/// Runtime context for CLI execution: config, store location, and the opened queue.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    config: StandbyConfig,
    store_path: PathBuf,
    queue: Arc<ActionQueue>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::from_config(config, &workspace_root)
    }

    /// Create run context from an already-loaded configuration.
    pub fn from_config(config: StandbyConfig, workspace_root: &Path) -> Result<Self, ApiError> {
        let store_path = config.resolved_store_path(workspace_root);
        let backing: Arc<dyn KeyValueStore> = Arc::new(SledKeyValueStore::new(&store_path)?);
        let queue = ActionQueue::shared(backing, config.replay.retry_policy());
        debug!(store = %store_path.display(), pending = queue.len(), "Run context ready");

        Ok(Self {
            config,
            store_path,
            queue,
        })
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Enqueue { kind, payload } => self.handle_enqueue(kind, payload.as_deref()),
            Commands::List { format } => {
                let actions = self.queue.snapshot();
                if format == "json" {
                    format_actions_json(&actions)
                } else {
                    Ok(format_actions_text(&actions, now_millis(), "Queue is empty."))
                }
            }
            Commands::Status { format } => {
                let status = self.status();
                if format == "json" {
                    format_status_json(&status)
                } else {
                    Ok(format_status_text(&status, now_millis()))
                }
            }
            Commands::Remove { id } => {
                let id = ActionId::from(id.as_str());
                if self.queue.remove_action(&id) {
                    Ok(format!("Removed {}", id))
                } else {
                    Err(ApiError::ActionNotFound(id.to_string()))
                }
            }
            Commands::Clear => {
                let count = self.queue.len();
                self.queue.clear_pending_actions();
                Ok(format!("Cleared {} pending action(s)", count))
            }
            Commands::Drain { format } => self.handle_drain(format),
            Commands::DeadLetters { command } => self.handle_dead_letter_command(command),
        }
    }

    fn handle_enqueue(&self, kind: &str, payload: Option<&str>) -> Result<String, ApiError> {
        if kind.trim().is_empty() {
            return Err(ApiError::InvalidPayload(
                "Action kind must not be empty".to_string(),
            ));
        }
        let payload = match payload {
            Some(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|e| ApiError::InvalidPayload(format!("Payload is not JSON: {}", e)))?,
            None => Value::Null,
        };
        let action = self.queue.add_pending_action(kind, payload);
        Ok(format!(
            "Queued {} ({}), {} pending",
            action.id,
            action.kind,
            self.queue.len()
        ))
    }

    fn handle_drain(&self, format: &str) -> Result<String, ApiError> {
        if self.config.endpoints.is_empty() && !self.queue.is_empty() {
            return Err(ApiError::ConfigError(
                "No endpoints configured; add an [endpoints.<kind>] table to replay actions"
                    .to_string(),
            ));
        }
        let table = dispatch_table_from_endpoints(&self.config.endpoints)?;
        let coordinator =
            ReplayCoordinator::new(Arc::clone(&self.queue), self.config.replay.replay_options());

        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create runtime: {}", e)))?;
        rt.block_on(coordinator.drain(&table));

        let report = coordinator.last_report().unwrap_or_default();
        let remaining = self.queue.len();
        if format == "json" {
            format_drain_report_json(&report, remaining)
        } else {
            Ok(format_drain_report_text(&report, remaining))
        }
    }

    fn handle_dead_letter_command(&self, command: &DeadLetterCommands) -> Result<String, ApiError> {
        match command {
            DeadLetterCommands::List { format } => {
                let actions = self.queue.dead_letters();
                if format == "json" {
                    format_actions_json(&actions)
                } else {
                    Ok(format_actions_text(
                        &actions,
                        now_millis(),
                        "No dead-lettered actions.",
                    ))
                }
            }
            DeadLetterCommands::Requeue => {
                let count = self.queue.requeue_dead_letters();
                Ok(format!("Requeued {} action(s)", count))
            }
            DeadLetterCommands::Purge => {
                let count = self.queue.purge_dead_letters();
                Ok(format!("Purged {} dead-lettered action(s)", count))
            }
        }
    }

    fn status(&self) -> QueueStatus {
        let pending = self.queue.snapshot();
        let mut endpoints: Vec<String> = self.config.endpoints.keys().cloned().collect();
        endpoints.sort();
        QueueStatus {
            store_path: self.store_path.clone(),
            pending: pending.len(),
            dead_letters: self.queue.dead_letters().len(),
            oldest_enqueued_at: pending.first().map(|a| a.enqueued_at),
            endpoints,
            max_attempts: self.config.replay.max_attempts,
        }
    }
}

/// Stable command name for logs
pub fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Enqueue { .. } => "enqueue",
        Commands::List { .. } => "list",
        Commands::Status { .. } => "status",
        Commands::Remove { .. } => "remove",
        Commands::Clear => "clear",
        Commands::Drain { .. } => "drain",
        Commands::DeadLetters { command } => match command {
            DeadLetterCommands::List { .. } => "dead-letters list",
            DeadLetterCommands::Requeue => "dead-letters requeue",
            DeadLetterCommands::Purge => "dead-letters purge",
        },
    }
}
