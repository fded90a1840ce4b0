//! Emission sink abstraction
//!
//! The tailer hands every new record to an [`EventSink`] exactly in
//! ascending record-number order. Delivery is at-least-once: a crash
//! between delivery and offset persistence redelivers the record after
//! restart, so sinks must tolerate duplicates.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SinkError;
use crate::event::EventRecord;

/// Destination for emitted records
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one record
    ///
    /// # Errors
    ///
    /// A failed delivery leaves the record un-acknowledged; the tailer
    /// retries it on its next cycle.
    async fn emit(&self, event: EventRecord) -> Result<(), SinkError>;
}

/// Sink that pushes records onto a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<EventRecord>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<EventRecord>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Wrap an existing sender
    pub fn from_sender(tx: mpsc::Sender<EventRecord>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: EventRecord) -> Result<(), SinkError> {
        self.tx.send(event).await.map_err(|_| SinkError::Closed)
    }
}
