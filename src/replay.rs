//! Replay Coordinator
//!
//! Drains the action queue against an injected executor. Each pass works from a
//! snapshot taken when the pass starts, so actions enqueued mid-pass wait for the
//! next one. A failing action stays in place and never blocks the rest of the pass.
//!
//! Only one pass runs at a time. A drain requested while another is in flight is
//! coalesced: the caller returns immediately and the in-flight drain runs one more
//! pass once its current pass completes.

use crate::action::PendingAction;
use crate::error::ExecutionError;
use crate::executor::ActionExecutor;
use crate::queue::{ActionQueue, FailureDisposition};
use crate::types::{now_millis, ActionId};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Coordinator options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Per-action executor timeout. Expiry counts as a failed attempt.
    pub executor_timeout: Option<Duration>,
}

/// Result of a drain call from the caller's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// This call ran at least one pass
    Ran,
    /// Another drain was in flight; it will run a follow-up pass
    Coalesced,
}

/// Outcome of one replay attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Succeeded,
    Failed {
        error: ExecutionError,
        disposition: FailureDisposition,
    },
}

/// Diagnostic record of one replay attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub action_id: ActionId,
    pub kind: String,
    pub attempt: u32,
    pub duration_ms: u64,
    pub outcome: ActionOutcome,
}

/// Diagnostic record of one drain call (one or more passes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub started_at_ms: u64,
    pub finished_at_ms: u64,
    pub passes: u32,
    pub actions: Vec<ActionReport>,
}

impl DrainReport {
    pub fn succeeded(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.outcome == ActionOutcome::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.actions.len() - self.succeeded()
    }

    pub fn dead_lettered(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| {
                matches!(
                    a.outcome,
                    ActionOutcome::Failed {
                        disposition: FailureDisposition::DeadLettered { .. },
                        ..
                    }
                )
            })
            .count()
    }
}

/// Clears the in-flight flag even if the drain future is dropped mid-pass.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ReplayCoordinator {
    queue: Arc<ActionQueue>,
    options: ReplayOptions,
    running: AtomicBool,
    rerun_requested: AtomicBool,
    drains_completed: AtomicU64,
    last_report: Mutex<Option<DrainReport>>,
}

impl ReplayCoordinator {
    pub fn new(queue: Arc<ActionQueue>, options: ReplayOptions) -> Self {
        Self {
            queue,
            options,
            running: AtomicBool::new(false),
            rerun_requested: AtomicBool::new(false),
            drains_completed: AtomicU64::new(0),
            last_report: Mutex::new(None),
        }
    }

    pub fn shared(queue: Arc<ActionQueue>, options: ReplayOptions) -> Arc<Self> {
        Arc::new(Self::new(queue, options))
    }

    pub fn queue(&self) -> &Arc<ActionQueue> {
        &self.queue
    }

    pub fn is_draining(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of drain calls that ran to completion
    pub fn drains_completed(&self) -> u64 {
        self.drains_completed.load(Ordering::Relaxed)
    }

    /// Report of the most recent completed drain
    pub fn last_report(&self) -> Option<DrainReport> {
        self.last_report.lock().clone()
    }

    /// Attempt every queued action once, in FIFO order. Never fails.
    ///
    /// A call that arrives while another drain is in flight returns
    /// [`DrainStatus::Coalesced`] without using its `executor`: the follow-up pass
    /// runs on the in-flight caller's executor.
    pub async fn drain(&self, executor: &dyn ActionExecutor) -> DrainStatus {
        if self.running.swap(true, Ordering::AcqRel) {
            self.rerun_requested.store(true, Ordering::Release);
            debug!("Drain already in progress, coalescing request");
            return DrainStatus::Coalesced;
        }

        let mut report = DrainReport {
            started_at_ms: now_millis(),
            ..DrainReport::default()
        };

        loop {
            let guard = RunningGuard(&self.running);
            loop {
                self.rerun_requested.store(false, Ordering::Release);
                self.run_pass(executor, &mut report).await;
                report.passes += 1;
                if !self.rerun_requested.load(Ordering::Acquire) {
                    break;
                }
                debug!(pass = report.passes + 1, "Running coalesced follow-up pass");
            }
            drop(guard);

            // A request may land between the last check and releasing the flag.
            if !self.rerun_requested.load(Ordering::Acquire)
                || self.running.swap(true, Ordering::AcqRel)
            {
                break;
            }
        }

        report.finished_at_ms = now_millis();
        info!(
            passes = report.passes,
            attempted = report.actions.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            dead_lettered = report.dead_lettered(),
            remaining = self.queue.len(),
            duration_ms = report.finished_at_ms.saturating_sub(report.started_at_ms),
            "Drain completed"
        );
        *self.last_report.lock() = Some(report);
        self.drains_completed.fetch_add(1, Ordering::Relaxed);
        DrainStatus::Ran
    }

    async fn run_pass(&self, executor: &dyn ActionExecutor, report: &mut DrainReport) {
        let snapshot = self.queue.snapshot();
        debug!(actions = snapshot.len(), "Starting drain pass");

        for action in snapshot {
            // Removed or cleared since the pass started
            if self.queue.get(&action.id).is_none() {
                continue;
            }

            let attempt = action.attempts + 1;
            let start = Instant::now();
            let result = self.execute_guarded(executor, &action).await;
            let duration_ms = start.elapsed().as_millis() as u64;

            let outcome = match result {
                Ok(()) => {
                    self.queue.remove_action(&action.id);
                    debug!(
                        action_id = %action.id,
                        kind = %action.kind,
                        attempt,
                        duration_ms,
                        "Replayed action"
                    );
                    ActionOutcome::Succeeded
                }
                Err(err) => {
                    let disposition = self.queue.record_failure(&action.id, &err.to_string());
                    warn!(
                        action_id = %action.id,
                        kind = %action.kind,
                        attempt,
                        duration_ms,
                        error = %err,
                        "Replay attempt failed, action retained"
                    );
                    ActionOutcome::Failed {
                        error: err,
                        disposition,
                    }
                }
            };

            report.actions.push(ActionReport {
                action_id: action.id,
                kind: action.kind,
                attempt,
                duration_ms,
                outcome,
            });
        }
    }

    /// Run the executor with panic isolation and the optional timeout.
    async fn execute_guarded(
        &self,
        executor: &dyn ActionExecutor,
        action: &PendingAction,
    ) -> Result<(), ExecutionError> {
        let call = AssertUnwindSafe(executor.execute(action)).catch_unwind();
        let caught = match self.options.executor_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(caught) => caught,
                Err(_) => return Err(ExecutionError::Timeout(limit.as_millis() as u64)),
            },
            None => call.await,
        };

        caught.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(
                action_id = %action.id,
                kind = %action.kind,
                panic = %message,
                "Executor panicked"
            );
            Err(ExecutionError::Panicked(message))
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
