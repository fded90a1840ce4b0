//! Error types for evtail

use thiserror::Error;

/// Errors raised by an event log binding
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventLogError {
    /// The process lacks the privilege required to open the channel
    #[error("Access denied opening channel: {0}")]
    AccessDenied(String),

    /// No channel with this name is registered on the host
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// A metadata query or read failed
    #[error("Read failed: {0}")]
    Read(String),

    /// The handle was closed before the operation
    #[error("Event log handle is closed")]
    Closed,
}

impl EventLogError {
    /// Create a new Read error
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read(message.into())
    }

    /// Whether retrying cannot help.
    ///
    /// Only a missing privilege is fatal; everything else may clear up on
    /// a later attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

/// Errors raised while delivering an emitted record
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    /// The downstream queue has been dropped
    #[error("Sink is closed")]
    Closed,

    /// The sink refused the record
    #[error("Sink rejected record: {0}")]
    Rejected(String),
}
