//! # evtail tailer
//!
//! Incremental, restart-safe tailing of event log channels.
//!
//! This crate ties together:
//! - Read cursor resolution (saved offset, rollover, first-contact policy)
//! - The per-channel poll loop ([`ChannelTailer`])
//! - Cooperative shutdown with a single forced offset flush
//!
//! ## Example
//!
//! ```rust,ignore
//! use evtail_core::{ChannelSink, MockEventLog};
//! use evtail_tailer::{ChannelTailer, StartPosition, TailerConfig};
//!
//! let log = MockEventLog::new("Application");
//! let (sink, mut events) = ChannelSink::new(1024);
//!
//! let config = TailerConfig::new("Application")
//!     .with_start_position(StartPosition::Beginning);
//! let tailer = ChannelTailer::open(&log, sink, config).await?;
//! let handle = tailer.spawn();
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event.record_number);
//! }
//!
//! handle.shutdown().await;
//! ```

pub mod config;
pub mod cursor;
pub mod error;
pub mod lifecycle;
pub mod shutdown;
pub mod tailer;

pub use config::{StartPosition, TailerConfig};
pub use cursor::{ReadCursor, Reconciled, StartDecision, decide_start};
pub use error::{TailerError, TailerResult};
pub use lifecycle::{TailerLifecycle, TailerPhase};
pub use shutdown::{ShutdownCoordinator, ShutdownOutcome};
pub use tailer::ChannelTailer;

use std::sync::Arc;

use evtail_storage::OffsetStore;
use tokio::task::{JoinError, JoinHandle};

/// Handle to a spawned tailer
///
/// Dropping the handle does not stop the tailer; call
/// [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct TailerHandle {
    coordinator: ShutdownCoordinator,
    store: Arc<OffsetStore>,
    task: JoinHandle<()>,
}

impl TailerHandle {
    pub(crate) fn new(
        coordinator: ShutdownCoordinator,
        store: Arc<OffsetStore>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            coordinator,
            store,
            task,
        }
    }

    /// Coordinator usable from other tasks (signal handlers, supervisors)
    pub fn coordinator(&self) -> ShutdownCoordinator {
        self.coordinator.clone()
    }

    pub fn store(&self) -> &Arc<OffsetStore> {
        &self.store
    }

    pub fn phase(&self) -> TailerPhase {
        self.coordinator.lifecycle().phase()
    }

    /// Request shutdown and run the teardown
    pub async fn shutdown(&self) -> ShutdownOutcome {
        self.coordinator.shutdown().await
    }

    /// Wait until the final offset flush has happened
    pub async fn wait_exit(&self) {
        self.coordinator.lifecycle().wait_exit().await
    }

    /// Wait for the poll loop task to finish
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }
}
