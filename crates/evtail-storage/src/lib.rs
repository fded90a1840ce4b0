//! # Evtail Storage
//!
//! Durable read positions for tailed event log channels.
//!
//! The [`OffsetStore`] keeps the last emitted record number for every
//! channel in memory and mirrors it to a small text file (the "sincedb"):
//!
//! ```text
//! Application 4711
//! System 982
//! ```
//!
//! Writes are coalesced: a non-forced [`flush`](OffsetStore::flush) within
//! the configured write interval only marks a write as pending. Each write
//! goes to `<path>.new` and is renamed over the durable file, so a crash
//! never leaves a half-written sincedb behind.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use evtail_core::RecordNumber;
//! use evtail_storage::OffsetStore;
//!
//! let store = OffsetStore::load("eventlog.sincedb", Duration::from_secs(15)).await;
//! store.record("Application", RecordNumber(42));
//! store.flush(true).await;
//! ```

pub mod error;
pub mod offset_store;

pub use error::StorageError;
pub use offset_store::{FlushOutcome, OffsetStore, parse_line};
