//! Action executors
//!
//! The replay coordinator knows nothing about transports. It hands each action to an
//! [`ActionExecutor`]; the host application supplies one, usually a [`DispatchTable`]
//! keyed by action kind. Expected failures (network errors, rejections) come back as
//! [`ExecutionError`] values rather than panics.

use crate::action::PendingAction;
use crate::error::{ExecutionError, RegistrationError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Performs the remote effect for a pending action
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &PendingAction) -> Result<(), ExecutionError>;
}

/// Performs the remote effect for one action kind
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, action: &PendingAction) -> Result<(), ExecutionError>;
}

type HandlerFn =
    dyn Fn(PendingAction) -> BoxFuture<'static, Result<(), ExecutionError>> + Send + Sync;

/// Closure-backed handler
struct FnHandler {
    f: Box<HandlerFn>,
}

#[async_trait]
impl ActionHandler for FnHandler {
    async fn handle(&self, action: &PendingAction) -> Result<(), ExecutionError> {
        (self.f)(action.clone()).await
    }
}

/// Executor that dispatches on `PendingAction::kind`.
///
/// Unregistered kinds fail with [`ExecutionError::UnknownKind`] so the action stays
/// queued until a handler for it is registered.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`. Kinds must be non-empty and unique.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<&mut Self, RegistrationError> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(RegistrationError::EmptyKind);
        }
        if self.handlers.contains_key(&kind) {
            return Err(RegistrationError::DuplicateKind(kind));
        }
        debug!(kind = %kind, "Registered action handler");
        self.handlers.insert(kind, handler);
        Ok(self)
    }

    /// Register an async closure as the handler for `kind`.
    pub fn register_fn<F>(
        &mut self,
        kind: impl Into<String>,
        f: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(PendingAction) -> BoxFuture<'static, Result<(), ExecutionError>>
            + Send
            + Sync
            + 'static,
    {
        self.register(kind, Arc::new(FnHandler { f: Box::new(f) }))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl ActionExecutor for DispatchTable {
    async fn execute(&self, action: &PendingAction) -> Result<(), ExecutionError> {
        let Some(handler) = self.handlers.get(&action.kind) else {
            return Err(ExecutionError::UnknownKind(action.kind.clone()));
        };
        handler.handle(action).await
    }
}
