//! Error types for evtail-storage

use thiserror::Error;

/// Errors that can occur while reading or writing the offset file
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// The temporary file was written but could not replace the durable file
    #[error("Rename failed: {0}")]
    Rename(String),

    /// A line of the offset file could not be parsed
    #[error("Malformed offset line {line}: {reason}")]
    Parse { line: usize, reason: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new Parse error
    pub fn parse(line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            line,
            reason: reason.into(),
        }
    }
}
