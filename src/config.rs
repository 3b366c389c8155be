//! Configuration System
//!
//! Layered configuration: built-in defaults, the global config file, workspace config
//! files, then `STANDBY__*` environment variables (e.g. `STANDBY__REPLAY__MAX_ATTEMPTS`).

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::queue::RetryPolicy;
use crate::replay::ReplayOptions;
use config::Environment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod merge;
mod sources;

use merge::merge_policy;
use sources::{global_file, workspace_file};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandbyConfig {
    /// Durable store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Replay policy
    #[serde(default)]
    pub replay: ReplayConfig,

    /// HTTP endpoint per action kind, used by the reference transport
    #[serde(default)]
    pub endpoints: HashMap<String, EndpointConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Sled database directory. Relative paths resolve against the workspace root.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Default store location: `<platform data dir>/queue`, falling back to `.standby/queue`.
pub fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "standby")
        .map(|dirs| dirs.data_dir().join("queue"))
        .unwrap_or_else(|| PathBuf::from(".standby/queue"))
}

/// Replay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Per-action executor timeout in milliseconds (none = wait indefinitely)
    #[serde(default)]
    pub executor_timeout_ms: Option<u64>,

    /// Failed attempts before an action is dead-lettered (none = retry forever)
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

impl ReplayConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
        }
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            executor_timeout: self.executor_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Endpoint for one action kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_endpoint_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_endpoint_timeout_ms() -> u64 {
    30_000
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    Storage(String),
    Replay(String),
    Endpoint(String, String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Replay(msg) => write!(f, "Replay: {}", msg),
            ValidationError::Endpoint(kind, msg) => write!(f, "Endpoint '{}': {}", kind, msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StandbyConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Store path cannot be empty".to_string(),
            ));
        }
        if self.replay.max_attempts == Some(0) {
            errors.push(ValidationError::Replay(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.replay.executor_timeout_ms == Some(0) {
            errors.push(ValidationError::Replay(
                "executor_timeout_ms must be greater than 0".to_string(),
            ));
        }

        for (kind, endpoint) in &self.endpoints {
            if kind.trim().is_empty() {
                errors.push(ValidationError::Endpoint(
                    kind.clone(),
                    "Action kind cannot be empty".to_string(),
                ));
            }
            if !(endpoint.url.starts_with("http://") || endpoint.url.starts_with("https://")) {
                errors.push(ValidationError::Endpoint(
                    kind.clone(),
                    format!("URL must be http(s): {}", endpoint.url),
                ));
            }
            if endpoint.timeout_ms == 0 {
                errors.push(ValidationError::Endpoint(
                    kind.clone(),
                    "timeout_ms must be greater than 0".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Store path with relative paths resolved against `workspace_root`
    pub fn resolved_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.store_path.is_absolute() {
            self.storage.store_path.clone()
        } else {
            workspace_root.join(&self.storage.store_path)
        }
    }
}

/// Loads layered configuration
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load defaults, global file, workspace files, then environment overrides.
    pub fn load(workspace_root: &Path) -> Result<StandbyConfig, ApiError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = builder.add_source(Self::environment());

        let config: StandbyConfig = builder.build()?.try_deserialize()?;
        Self::validated(config)
    }

    /// Load a single explicit file on top of defaults and environment overrides.
    pub fn load_from_file(path: &Path) -> Result<StandbyConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }
        let config: StandbyConfig = merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Self::validated(config)
    }

    /// Path of the global config file, if a home directory is known
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn environment() -> Environment {
        Environment::with_prefix("STANDBY")
            .separator("__")
            .try_parsing(true)
    }

    fn validated(config: StandbyConfig) -> Result<StandbyConfig, ApiError> {
        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;
        Ok(config)
    }
}
