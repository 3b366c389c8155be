//! Standby: a durable queue for actions taken while offline.
//!
//! Actions are appended to an [`ActionQueue`](queue::ActionQueue) that persists its
//! full contents on every mutation. When connectivity returns, the
//! [`ConnectivityMonitor`](connectivity::ConnectivityMonitor) asks the
//! [`ReplayCoordinator`](replay::ReplayCoordinator) to drain the queue in FIFO order
//! against an [`ActionExecutor`](executor::ActionExecutor).

pub mod action;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod executor;
pub mod logging;
pub mod queue;
pub mod replay;
pub mod store;
pub mod transport;
pub mod types;

pub use action::PendingAction;
pub use connectivity::{ConnectivityMonitor, ConnectivitySignal, MonitorSubscription};
pub use error::{ApiError, ExecutionError, RegistrationError, StorageError};
pub use executor::{ActionExecutor, ActionHandler, DispatchTable};
pub use queue::{ActionQueue, FailureDisposition, RetryPolicy};
pub use replay::{DrainReport, DrainStatus, ReplayCoordinator, ReplayOptions};
pub use types::ActionId;
