//! Error types for the tailer

use evtail_core::{EventLogError, SinkError};
use thiserror::Error;

/// Errors that can occur while tailing a channel
#[derive(Debug, Error)]
pub enum TailerError {
    /// The channel could not be opened; startup is aborted
    #[error("Failed to open channel: {0}")]
    Open(#[source] EventLogError),

    /// A metadata query or read failed during a poll cycle
    #[error("Event log read failed: {0}")]
    Read(#[from] EventLogError),

    /// The sink refused a record
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TailerError {
    /// Whether this error aborts the tailer instead of being retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Open(_) | Self::Config(_))
    }
}

/// Result type alias for tailer operations
pub type TailerResult<T> = Result<T, TailerError>;
