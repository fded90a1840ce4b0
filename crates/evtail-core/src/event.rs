//! Emitted event shape
//!
//! Every record read from a channel is mapped into an [`EventRecord`]
//! before it reaches the sink. Field names on the wire follow the event
//! log's own naming (`ComputerName`, `EventId`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{EventType, RawRecord, RecordNumber};

/// A structured event produced from one event log record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventRecord {
    /// Host the tailer runs on
    #[serde(rename = "host")]
    pub host: String,
    /// Event time; the time the record was generated
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Channel the record was read from
    #[serde(rename = "Logfile")]
    pub channel: String,
    pub category: u16,
    pub computer_name: String,
    /// Binary data as lowercase hex
    pub data: Option<String>,
    pub description: Option<String>,
    pub event_id: u32,
    /// Same value as `EventId`, under the name WMI consumers expect
    pub event_identifier: u32,
    /// Same value as `EventId`
    pub event_code: u32,
    pub event_type: EventType,
    /// Same value as `EventType`
    #[serde(rename = "Type")]
    pub kind: EventType,
    pub insertion_strings: Vec<Option<String>>,
    /// Description, or the insertion strings when no description resolved
    #[serde(rename = "message")]
    pub message: Option<String>,
    pub record_number: RecordNumber,
    pub source_name: String,
    pub time_generated: DateTime<Utc>,
    pub time_written: DateTime<Utc>,
    pub user: Option<String>,
}

impl EventRecord {
    /// Map a raw record read from `channel` on `host`
    pub fn from_raw(host: &str, channel: &str, raw: &RawRecord) -> Self {
        let data = raw.data.as_ref().map(hex::encode);
        let message = raw.description.clone().or_else(|| {
            let present: Vec<&str> = raw
                .string_inserts
                .iter()
                .filter_map(|s| s.as_deref())
                .collect();
            (!present.is_empty()).then(|| present.join(" "))
        });

        Self {
            host: host.to_string(),
            timestamp: raw.time_generated,
            channel: channel.to_string(),
            category: raw.category,
            computer_name: raw.computer.clone(),
            data,
            description: raw.description.clone(),
            event_id: raw.event_id,
            event_identifier: raw.event_id,
            event_code: raw.event_id,
            event_type: raw.event_type,
            kind: raw.event_type,
            insertion_strings: raw.string_inserts.clone(),
            message,
            record_number: raw.record_number,
            source_name: raw.source.clone(),
            time_generated: raw.time_generated,
            time_written: raw.time_written,
            user: raw.user.clone(),
        }
    }
}
