//! Connectivity Monitor
//!
//! The host environment publishes its online/offline state through a
//! [`ConnectivitySignal`]. A [`ConnectivityMonitor`] listens for transitions and
//! starts one drain per offline-to-online transition. There is no polling.

use crate::executor::ActionExecutor;
use crate::replay::ReplayCoordinator;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Host-side online/offline source. Clones publish to the same subscribers.
#[derive(Clone)]
pub struct ConnectivitySignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivitySignal {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Publish the current state. Subscribers are only notified on an actual
    /// change; returns whether this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Reacts to connectivity transitions by draining the queue.
pub struct ConnectivityMonitor {
    signal: ConnectivitySignal,
    coordinator: Arc<ReplayCoordinator>,
    executor: Arc<dyn ActionExecutor>,
}

impl ConnectivityMonitor {
    pub fn new(
        signal: ConnectivitySignal,
        coordinator: Arc<ReplayCoordinator>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            signal,
            coordinator,
            executor,
        }
    }

    /// Current online state at call time
    pub fn status(&self) -> bool {
        self.signal.is_online()
    }

    /// Start listening for transitions. Must be called within a tokio runtime.
    ///
    /// Each online transition spawns one drain; overlapping drains are coalesced by
    /// the coordinator. The listener stops when the returned subscription is
    /// unsubscribed or dropped.
    pub fn start(&self) -> MonitorSubscription {
        // Baseline is taken here, not in the task, so a transition published before
        // the task is first polled still wakes it.
        let mut rx = self.signal.subscribe();
        let initially_online = *rx.borrow_and_update();
        let coordinator = Arc::clone(&self.coordinator);
        let executor = Arc::clone(&self.executor);
        let drains_triggered = Arc::new(AtomicU64::new(0));
        let triggered = Arc::clone(&drains_triggered);

        let handle = tokio::spawn(async move {
            debug!(online = initially_online, "Connectivity listener started");

            // The signal only publishes real changes, so a wake-up that lands on
            // online always follows an offline period, even when the watch merged
            // the offline and online updates into one.
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if !online {
                    info!("Connectivity lost");
                    continue;
                }

                info!(
                    pending = coordinator.queue().len(),
                    "Connectivity restored, draining pending actions"
                );
                triggered.fetch_add(1, Ordering::Relaxed);
                let coordinator = Arc::clone(&coordinator);
                let executor = Arc::clone(&executor);
                tokio::spawn(async move {
                    coordinator.drain(executor.as_ref()).await;
                });
            }

            debug!("Connectivity listener stopped");
        });

        MonitorSubscription {
            handle: Some(handle),
            drains_triggered,
        }
    }
}

/// Handle to a running connectivity listener
pub struct MonitorSubscription {
    handle: Option<JoinHandle<()>>,
    drains_triggered: Arc<AtomicU64>,
}

impl MonitorSubscription {
    /// Number of online transitions that triggered a drain
    pub fn drains_triggered(&self) -> u64 {
        self.drains_triggered.load(Ordering::Relaxed)
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop listening. Drains already started run to completion.
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for MonitorSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
