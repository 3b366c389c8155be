//! Error types for the Standby offline action queue.

use std::path::PathBuf;
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to open store at {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Outcome of a single failed replay attempt.
///
/// Executors return these for expected failure modes; none of them escape a drain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("No handler registered for action kind '{0}'")]
    UnknownKind(String),

    #[error("Remote rejected action: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Executor timed out after {0} ms")]
    Timeout(u64),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

/// Dispatch table registration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Action kind must not be empty")]
    EmptyKind,

    #[error("A handler is already registered for action kind '{0}'")]
    DuplicateKind(String),

    #[error("Invalid endpoint for action kind '{kind}': {message}")]
    InvalidEndpoint { kind: String, message: String },
}

/// Top-level errors surfaced by the configuration and CLI layers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Registration error: {0}")]
    RegistrationError(#[from] RegistrationError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
