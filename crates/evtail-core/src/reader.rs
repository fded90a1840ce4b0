//! Event log reader abstraction
//!
//! The [`EventLogSource`] and [`EventLogHandle`] traits are the only way the
//! tailer touches an event log. A native binding implements them on top of
//! the host API; [`MockEventLog`](crate::MockEventLog) implements them in
//! memory for tests and simulation.

use async_trait::async_trait;

use crate::error::EventLogError;
use crate::record::{LogMetadata, RawRecord, RecordNumber};

/// Opens event log channels
///
/// # Example
///
/// ```rust,ignore
/// use evtail_core::{EventLogHandle, EventLogSource, MockEventLog};
///
/// let log = MockEventLog::new("Application");
/// let handle = log.open("Application").await?;
/// let meta = handle.metadata().await?;
/// ```
#[async_trait]
pub trait EventLogSource: Send + Sync {
    /// Handle type returned by [`open`](Self::open)
    type Handle: EventLogHandle;

    /// Open a channel by name
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::AccessDenied`] when the process lacks the
    /// privilege to read the channel (commonly `Security`), or
    /// [`EventLogError::ChannelNotFound`] for an unknown channel.
    async fn open(&self, channel: &str) -> Result<Self::Handle, EventLogError>;
}

/// An open channel
///
/// Handles are shared between the poll loop and the shutdown coordinator,
/// so every method takes `&self`.
#[async_trait]
pub trait EventLogHandle: Send + Sync + 'static {
    /// Oldest retained record number and retained record count
    async fn metadata(&self) -> Result<LogMetadata, EventLogError>;

    /// Read records with number `>= from`, in ascending order
    ///
    /// If `from` has already been evicted the read starts at the oldest
    /// retained record instead of failing.
    async fn read_forward(&self, from: RecordNumber) -> Result<Vec<RawRecord>, EventLogError>;

    /// The newest record, or `None` for an empty channel
    async fn read_last(&self) -> Result<Option<RawRecord>, EventLogError>;

    /// Release the handle. Later calls fail with [`EventLogError::Closed`].
    async fn close(&self);
}
