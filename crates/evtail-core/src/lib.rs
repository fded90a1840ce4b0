//! # Evtail Core
//!
//! Core traits, types, and errors for tailing Windows event log channels.
//!
//! The tailing logic in `evtail-tailer` is written once against the
//! abstractions defined here, so it runs unchanged against the native
//! event log binding and against the in-memory [`MockEventLog`] used by
//! tests and the simulation.
//!
//! ## Key Traits
//!
//! - [`EventLogSource`]: Opens a channel, yielding an [`EventLogHandle`]
//! - [`EventLogHandle`]: Metadata queries and forward reads on an open channel
//! - [`EventSink`]: Destination for mapped [`EventRecord`]s
//!
//! ## Key Types
//!
//! - [`RecordNumber`]: Position of a record within one channel
//! - [`RawRecord`]: Normalized record as returned by the platform API
//! - [`EventRecord`]: Fixed output shape emitted for every record
//! - [`LogMetadata`]: Oldest record number and total count of a channel

pub mod error;
pub mod event;
pub mod mock_reader;
pub mod reader;
pub mod record;
pub mod sink;

// Re-export main types
pub use error::*;
pub use event::*;
pub use mock_reader::*;
pub use reader::*;
pub use record::*;
pub use sink::*;
