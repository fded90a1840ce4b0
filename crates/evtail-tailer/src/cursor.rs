//! Read cursor and start-position resolution
//!
//! The cursor tracks the lowest record number that has not been emitted
//! yet. Deciding where it starts, and pulling it forward when the log has
//! evicted or renumbered records, are pure functions of the saved offset
//! and the log's retention window.

use evtail_core::{LogMetadata, RecordNumber};

use crate::config::StartPosition;

/// How a tailer begins reading a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// The saved offset is still retained; continue after it
    Resume { next: RecordNumber },
    /// Rollover evicted the saved offset; continue from the oldest record
    RolledOver {
        saved: RecordNumber,
        oldest: RecordNumber,
    },
    /// First contact, emit everything from the oldest record
    Beginning { oldest: RecordNumber },
    /// First contact, skip everything already in the channel
    End,
}

impl StartDecision {
    /// Cursor for every decision that does not need the newest record
    pub fn cursor(self) -> Option<ReadCursor> {
        match self {
            Self::Resume { next } => Some(ReadCursor::at(next)),
            Self::RolledOver { oldest, .. } => Some(ReadCursor::at(oldest)),
            Self::Beginning { oldest } => Some(ReadCursor::at(oldest)),
            Self::End => None,
        }
    }
}

/// Decide where to start reading
pub fn decide_start(
    saved: Option<RecordNumber>,
    metadata: LogMetadata,
    policy: StartPosition,
) -> StartDecision {
    match saved {
        Some(saved) if saved >= metadata.oldest => StartDecision::Resume { next: saved.next() },
        Some(saved) => StartDecision::RolledOver {
            saved,
            oldest: metadata.oldest,
        },
        None => match policy {
            StartPosition::Beginning => StartDecision::Beginning {
                oldest: metadata.oldest,
            },
            StartPosition::End => StartDecision::End,
        },
    }
}

/// What [`ReadCursor::reconcile`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The cursor is inside the retention window
    InRange,
    /// Records the cursor had not reached were evicted
    Wrapped { lost: u64 },
    /// The newest record is behind the cursor: the log was cleared or renumbered
    Truncated { newest: Option<RecordNumber> },
}

/// Position of the next record to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadCursor {
    next: RecordNumber,
}

impl ReadCursor {
    /// Cursor whose next record is `next`
    pub fn at(next: RecordNumber) -> Self {
        Self { next }
    }

    /// Cursor placed after `last`
    pub fn after(last: RecordNumber) -> Self {
        Self { next: last.next() }
    }

    /// Lowest record number not yet emitted
    pub fn next(&self) -> RecordNumber {
        self.next
    }

    /// Whether `number` is new to this cursor
    pub fn is_new(&self, number: RecordNumber) -> bool {
        number >= self.next
    }

    /// Move past an emitted record
    pub fn advance(&mut self, emitted: RecordNumber) {
        if emitted >= self.next {
            self.next = emitted.next();
        }
    }

    /// Pull the cursor back into the retention window
    ///
    /// After a wrap the cursor moves to the oldest retained record rather
    /// than the arithmetic successor of the last emitted one.
    pub fn reconcile(&mut self, metadata: LogMetadata) -> Reconciled {
        if metadata.next_record() < self.next {
            self.next = metadata.oldest;
            return Reconciled::Truncated {
                newest: metadata.newest(),
            };
        }
        if metadata.oldest > self.next {
            let lost = metadata.oldest.value() - self.next.value();
            self.next = metadata.oldest;
            return Reconciled::Wrapped { lost };
        }
        Reconciled::InRange
    }
}
