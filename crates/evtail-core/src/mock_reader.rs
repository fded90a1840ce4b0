//! In-memory event log for testing
//!
//! Provides a channel that can be appended to, rolled over, cleared, and
//! made to fail, so tailing logic can be exercised without the host API.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use evtail_core::{EventLogHandle, EventLogSource, MockEventLog, RecordNumber};
//!
//! let log = MockEventLog::with_capacity("Application", 100);
//! log.append_message("MsiInstaller", "Installation completed");
//!
//! let handle = log.open("Application").await?;
//! let records = handle.read_forward(RecordNumber(1)).await?;
//! assert_eq!(records.len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::EventLogError;
use crate::reader::{EventLogHandle, EventLogSource};
use crate::record::{LogMetadata, RawRecord, RecordNumber};

#[derive(Debug)]
struct MockState {
    records: VecDeque<RawRecord>,
    /// Number assigned to the next appended record
    next_number: u64,
    /// Maximum retained records; older ones are evicted on append
    capacity: Option<usize>,
    /// Remaining operations that fail with a read error
    failures_remaining: usize,
    access_denied: bool,
}

impl MockState {
    fn oldest(&self) -> RecordNumber {
        self.records
            .front()
            .map(|r| r.record_number)
            .unwrap_or(RecordNumber(self.next_number))
    }

    fn take_failure(&mut self) -> Result<(), EventLogError> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(EventLogError::read("injected failure"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockCounters {
    opens: AtomicUsize,
    metadata_calls: AtomicUsize,
    forward_reads: AtomicUsize,
    closes: AtomicUsize,
}

/// An in-memory event log channel
///
/// Cloning yields another view of the same channel.
#[derive(Debug, Clone)]
pub struct MockEventLog {
    channel: String,
    state: Arc<Mutex<MockState>>,
    counters: Arc<MockCounters>,
}

impl MockEventLog {
    /// Create an empty, unbounded channel
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            state: Arc::new(Mutex::new(MockState {
                records: VecDeque::new(),
                next_number: 1,
                capacity: None,
                failures_remaining: 0,
                access_denied: false,
            })),
            counters: Arc::new(MockCounters::default()),
        }
    }

    /// Create an empty channel retaining at most `capacity` records
    pub fn with_capacity(channel: impl Into<String>, capacity: usize) -> Self {
        let log = Self::new(channel);
        log.state.lock().capacity = Some(capacity);
        log
    }

    /// Channel name
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Append a record, assigning it the next record number
    ///
    /// The record number on `record` is overwritten.
    pub fn append(&self, mut record: RawRecord) -> RecordNumber {
        let mut state = self.state.lock();
        let number = RecordNumber(state.next_number);
        state.next_number += 1;
        record.record_number = number;
        state.records.push_back(record);

        if let Some(capacity) = state.capacity {
            while state.records.len() > capacity {
                state.records.pop_front();
            }
        }
        number
    }

    /// Append a record with a source and description
    pub fn append_message(
        &self,
        source: impl Into<String>,
        description: impl Into<String>,
    ) -> RecordNumber {
        self.append(
            RawRecord::new(RecordNumber::default(), source)
                .with_computer("MOCKHOST")
                .with_description(description),
        )
    }

    /// Append `count` generic records, returning the last number assigned
    pub fn append_many(&self, count: usize) -> Option<RecordNumber> {
        (0..count)
            .map(|i| self.append_message("mock", format!("record {i}")))
            .last()
    }

    /// Drop every record with a number below `number`
    pub fn evict_before(&self, number: RecordNumber) {
        let mut state = self.state.lock();
        while state
            .records
            .front()
            .is_some_and(|r| r.record_number < number)
        {
            state.records.pop_front();
        }
        if state.next_number < number.0 {
            state.next_number = number.0;
        }
    }

    /// Remove all records and restart numbering at 1
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.next_number = 1;
    }

    /// Make the next `count` metadata or read calls fail
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures_remaining = count;
    }

    /// Make `open` fail with [`EventLogError::AccessDenied`]
    pub fn deny_access(&self) {
        self.state.lock().access_denied = true;
    }

    /// Current retention window
    pub fn metadata(&self) -> LogMetadata {
        let state = self.state.lock();
        LogMetadata::new(state.oldest(), state.records.len() as u64)
    }

    pub fn open_count(&self) -> usize {
        self.counters.opens.load(Ordering::SeqCst)
    }

    pub fn metadata_calls(&self) -> usize {
        self.counters.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn forward_reads(&self) -> usize {
        self.counters.forward_reads.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.counters.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventLogSource for MockEventLog {
    type Handle = MockEventLogHandle;

    async fn open(&self, channel: &str) -> Result<Self::Handle, EventLogError> {
        if channel != self.channel {
            return Err(EventLogError::ChannelNotFound(channel.to_string()));
        }
        if self.state.lock().access_denied {
            return Err(EventLogError::AccessDenied(channel.to_string()));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        Ok(MockEventLogHandle {
            state: Arc::clone(&self.state),
            counters: Arc::clone(&self.counters),
            closed: AtomicBool::new(false),
        })
    }
}

/// Open handle on a [`MockEventLog`]
#[derive(Debug)]
pub struct MockEventLogHandle {
    state: Arc<Mutex<MockState>>,
    counters: Arc<MockCounters>,
    closed: AtomicBool,
}

impl MockEventLogHandle {
    fn ensure_open(&self) -> Result<(), EventLogError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(EventLogError::Closed)
        } else {
            Ok(())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventLogHandle for MockEventLogHandle {
    async fn metadata(&self) -> Result<LogMetadata, EventLogError> {
        self.ensure_open()?;
        self.counters.metadata_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(LogMetadata::new(state.oldest(), state.records.len() as u64))
    }

    async fn read_forward(&self, from: RecordNumber) -> Result<Vec<RawRecord>, EventLogError> {
        self.ensure_open()?;
        self.counters.forward_reads.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state
            .records
            .iter()
            .filter(|r| r.record_number >= from)
            .cloned()
            .collect())
    }

    async fn read_last(&self) -> Result<Option<RawRecord>, EventLogError> {
        self.ensure_open()?;

        let mut state = self.state.lock();
        state.take_failure()?;
        Ok(state.records.back().cloned())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
