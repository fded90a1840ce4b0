//! Cooperative shutdown for a running tailer
//!
//! ## Ordering
//!
//! 1. Request stop; an interruptible sleep wakes immediately
//! 2. Wait for the in-flight cycle (if any) to finish
//! 3. Force one offset flush
//! 4. Release `wait_exit` callers
//! 5. Close the log handle
//!
//! Because no cycle can start after step 1, nothing is emitted between the
//! forced flush and exit.

use std::sync::Arc;

use evtail_core::EventLogHandle;
use evtail_storage::{FlushOutcome, OffsetStore};
use tracing::{info, instrument, warn};

use crate::lifecycle::TailerLifecycle;

/// Result of a [`ShutdownCoordinator::shutdown`] call
#[derive(Debug)]
pub enum ShutdownOutcome {
    /// This call performed the teardown
    Completed {
        /// Outcome of the forced flush
        flush: FlushOutcome,
    },
    /// A teardown was already running or finished; nothing was done
    AlreadyRequested,
}

impl ShutdownOutcome {
    /// Whether the forced flush reached disk
    pub fn flushed(&self) -> bool {
        matches!(self, Self::Completed { flush } if flush.is_written())
    }
}

/// Stops a tailer and makes its final offset durable
#[derive(Clone)]
pub struct ShutdownCoordinator {
    channel: String,
    lifecycle: Arc<TailerLifecycle>,
    store: Arc<OffsetStore>,
    handle: Arc<dyn EventLogHandle>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("channel", &self.channel)
            .field("phase", &self.lifecycle.phase())
            .finish()
    }
}

impl ShutdownCoordinator {
    pub fn new(
        channel: String,
        lifecycle: Arc<TailerLifecycle>,
        store: Arc<OffsetStore>,
        handle: Arc<dyn EventLogHandle>,
    ) -> Self {
        Self {
            channel,
            lifecycle,
            store,
            handle,
        }
    }

    pub fn lifecycle(&self) -> &Arc<TailerLifecycle> {
        &self.lifecycle
    }

    /// Stop the tailer, flush once, then close the handle
    ///
    /// Safe to call from several tasks; only the first call tears down.
    #[instrument(skip(self), fields(channel = %self.channel))]
    pub async fn shutdown(&self) -> ShutdownOutcome {
        if !self.lifecycle.begin_teardown() {
            warn!("Shutdown already requested");
            return ShutdownOutcome::AlreadyRequested;
        }

        info!("Stopping tailer");
        self.lifecycle.request_stop();
        self.lifecycle.wait_not_polling().await;

        let flush = self.store.flush(true).await;
        match &flush {
            FlushOutcome::Written => {
                info!(offset = ?self.store.get(&self.channel).map(|n| n.value()), "Final offsets written");
            }
            other => warn!(outcome = ?other, "Final offset flush did not complete"),
        }

        self.lifecycle.allow_exit();
        self.handle.close().await;

        info!("Tailer shut down");
        ShutdownOutcome::Completed { flush }
    }
}
