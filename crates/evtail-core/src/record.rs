//! Record types shared by every event log binding
//!
//! Native APIs disagree on field names and encodings for the same concept.
//! Bindings normalize what they read into [`RawRecord`] so the tailing
//! logic only ever sees one shape.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a record within a single channel
///
/// Record numbers increase monotonically until the log's retention policy
/// evicts old records. They are not unique across channels.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordNumber(pub u64);

impl RecordNumber {
    /// Create a record number
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub const fn value(self) -> u64 {
        self.0
    }

    /// The record number immediately after this one
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for RecordNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RecordNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Severity class of an event log record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Success,
    Error,
    Warning,
    Information,
    AuditSuccess,
    AuditFailure,
    /// A type code the binding does not recognize
    Unknown(u16),
}

impl EventType {
    pub const SUCCESS: u16 = 0x0000;
    pub const ERROR: u16 = 0x0001;
    pub const WARNING: u16 = 0x0002;
    pub const INFORMATION: u16 = 0x0004;
    pub const AUDIT_SUCCESS: u16 = 0x0008;
    pub const AUDIT_FAILURE: u16 = 0x0010;

    /// Decode the native event type code
    pub fn from_code(code: u16) -> Self {
        match code {
            Self::SUCCESS => Self::Success,
            Self::ERROR => Self::Error,
            Self::WARNING => Self::Warning,
            Self::INFORMATION => Self::Information,
            Self::AUDIT_SUCCESS => Self::AuditSuccess,
            Self::AUDIT_FAILURE => Self::AuditFailure,
            other => Self::Unknown(other),
        }
    }

    /// The native event type code
    pub fn code(self) -> u16 {
        match self {
            Self::Success => Self::SUCCESS,
            Self::Error => Self::ERROR,
            Self::Warning => Self::WARNING,
            Self::Information => Self::INFORMATION,
            Self::AuditSuccess => Self::AUDIT_SUCCESS,
            Self::AuditFailure => Self::AUDIT_FAILURE,
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Information => write!(f, "information"),
            Self::AuditSuccess => write!(f, "audit_success"),
            Self::AuditFailure => write!(f, "audit_failure"),
            Self::Unknown(code) => write!(f, "unknown({code:#06x})"),
        }
    }
}

/// A record as read from the host event log API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub record_number: RecordNumber,
    pub time_generated: DateTime<Utc>,
    pub time_written: DateTime<Utc>,
    pub event_id: u32,
    pub event_type: EventType,
    pub category: u16,
    pub source: String,
    pub computer: String,
    /// Account name, when the record carries a SID that resolved
    pub user: Option<String>,
    /// Formatted message from the source's message file
    pub description: Option<String>,
    /// Substitution strings; entries the API could not decode are `None`
    pub string_inserts: Vec<Option<String>>,
    /// Binary event data
    pub data: Option<Bytes>,
}

impl RawRecord {
    /// Create a record with the given number and neutral defaults
    ///
    /// Bindings fill in the remaining fields through the `with_*` setters.
    pub fn new(record_number: RecordNumber, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            record_number,
            time_generated: now,
            time_written: now,
            event_id: 0,
            event_type: EventType::Information,
            category: 0,
            source: source.into(),
            computer: String::new(),
            user: None,
            description: None,
            string_inserts: Vec::new(),
            data: None,
        }
    }

    pub fn with_event_id(mut self, event_id: u32) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_event_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_computer(mut self, computer: impl Into<String>) -> Self {
        self.computer = computer.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_string_inserts(mut self, inserts: Vec<Option<String>>) -> Self {
        self.string_inserts = inserts;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_times(mut self, generated: DateTime<Utc>, written: DateTime<Utc>) -> Self {
        self.time_generated = generated;
        self.time_written = written;
        self
    }
}

/// Snapshot of a channel's retention window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    /// Number of the oldest record still retained
    pub oldest: RecordNumber,
    /// Count of records currently retained
    pub total: u64,
}

impl LogMetadata {
    pub fn new(oldest: RecordNumber, total: u64) -> Self {
        Self { oldest, total }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of the newest retained record, if any
    pub fn newest(&self) -> Option<RecordNumber> {
        if self.total == 0 {
            None
        } else {
            Some(RecordNumber(self.oldest.0 + self.total - 1))
        }
    }

    /// The number the next appended record will receive
    pub fn next_record(&self) -> RecordNumber {
        RecordNumber(self.oldest.0 + self.total)
    }
}
