//! Coalescing, crash-safe offset store
//!
//! The in-memory map is authoritative while the process runs. The file on
//! disk trails it by at most one write interval, and is only ever replaced
//! whole through a rename.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use evtail_core::RecordNumber;
use parking_lot::Mutex;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// Result of a [`OffsetStore::flush`] request
#[derive(Debug)]
pub enum FlushOutcome {
    /// The snapshot was written and renamed into place
    Written,
    /// Within the write interval; the write is pending until a later flush
    Deferred,
    /// Another flush was in progress; this request was dropped
    Busy,
    /// The write or rename failed; the previous file is still in place
    Failed(StorageError),
}

impl FlushOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Clears the writing flag when a flush finishes, on every path
struct WritingGuard<'a>(&'a AtomicBool);

impl Drop for WritingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Durable mapping from channel name to last emitted record number
#[derive(Debug)]
pub struct OffsetStore {
    /// Path of the durable offset file
    path: PathBuf,
    /// Last emitted record per channel
    offsets: DashMap<String, RecordNumber>,
    /// Minimum time between non-forced writes
    write_interval: Duration,
    /// Time of the last successful write (or of load)
    last_write: Mutex<Instant>,
    /// A deferred write has not been satisfied yet
    pending: AtomicBool,
    /// A flush is currently running
    writing: AtomicBool,
    /// Successful writes since load
    write_count: AtomicUsize,
}

impl OffsetStore {
    /// Load the offset file at `path`
    ///
    /// A missing or unreadable file is a first run, not an error: the store
    /// starts empty and the problem is logged.
    pub async fn load(path: impl AsRef<Path>, write_interval: Duration) -> Self {
        let path = path.as_ref().to_path_buf();
        let store = Self::empty(path, write_interval);

        match store.read_file().await {
            Ok(loaded) => {
                info!(
                    path = %store.path.display(),
                    channels = loaded,
                    "Loaded offsets"
                );
            }
            Err(e) => {
                debug!(
                    path = %store.path.display(),
                    error = %e,
                    "No usable offset file, starting fresh"
                );
            }
        }

        store
    }

    /// Create an empty store that will write to `path`
    pub fn empty(path: impl Into<PathBuf>, write_interval: Duration) -> Self {
        Self {
            path: path.into(),
            offsets: DashMap::new(),
            write_interval,
            last_write: Mutex::new(Instant::now()),
            pending: AtomicBool::new(false),
            writing: AtomicBool::new(false),
            write_count: AtomicUsize::new(0),
        }
    }

    async fn read_file(&self) -> Result<usize, StorageError> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut lineno = 0;

        while let Some(line) = lines.next_line().await? {
            lineno += 1;
            match parse_line(lineno, &line) {
                Ok(Some((channel, number))) => {
                    debug!(channel = %channel, record = %number, "Restored offset");
                    self.offsets.insert(channel, number);
                }
                Ok(None) => {}
                Err(e) => warn!(path = %self.path.display(), error = %e, "Skipping offset line"),
            }
        }

        Ok(self.offsets.len())
    }

    /// Path of the durable offset file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the temporary file each write goes through
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".new");
        PathBuf::from(name)
    }

    /// Last emitted record for `channel`
    pub fn get(&self, channel: &str) -> Option<RecordNumber> {
        self.offsets.get(channel).map(|entry| *entry.value())
    }

    /// Remember that `number` was emitted on `channel`
    ///
    /// Only updates memory; persisting is up to [`flush`](Self::flush).
    pub fn record(&self, channel: &str, number: RecordNumber) {
        self.offsets.insert(channel.to_string(), number);
    }

    /// Copy of the full mapping, ordered by channel
    pub fn snapshot(&self) -> BTreeMap<String, RecordNumber> {
        self.offsets
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Whether a deferred write is outstanding
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// Number of successful writes since load
    pub fn write_count(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Persist the mapping, subject to coalescing
    ///
    /// With `force == false` the write is skipped (and marked pending) when
    /// the last successful write is younger than the write interval. A
    /// flush arriving while another runs is dropped, not queued.
    pub async fn flush(&self, force: bool) -> FlushOutcome {
        if self
            .writing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(path = %self.path.display(), "Offset flush already in progress");
            self.pending.store(true, Ordering::SeqCst);
            return FlushOutcome::Busy;
        }
        let _guard = WritingGuard(&self.writing);

        let since_last = self.last_write.lock().elapsed();
        if !force && since_last < self.write_interval {
            self.pending.store(true, Ordering::SeqCst);
            return FlushOutcome::Deferred;
        }

        debug!(
            path = %self.path.display(),
            force,
            since_last_ms = since_last.as_millis() as u64,
            "Writing offsets"
        );

        match self.write_snapshot().await {
            Ok(()) => {
                *self.last_write.lock() = Instant::now();
                self.pending.store(false, Ordering::SeqCst);
                self.write_count.fetch_add(1, Ordering::SeqCst);
                FlushOutcome::Written
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Offset write failed");
                // Retried by the next flush, forced or not
                self.pending.store(true, Ordering::SeqCst);
                FlushOutcome::Failed(e)
            }
        }
    }

    async fn write_snapshot(&self) -> Result<(), StorageError> {
        let tmp = self.temp_path();
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).await?;

        let mut contents = String::new();
        for (channel, number) in self.snapshot() {
            contents.push_str(&channel);
            contents.push(' ');
            contents.push_str(&number.to_string());
            contents.push('\n');
        }

        {
            let mut file = File::create(&tmp).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
        }

        fs::rename(&tmp, &self.path).await.map_err(|e| {
            StorageError::Rename(format!("{} -> {}: {}", tmp.display(), self.path.display(), e))
        })?;

        sync_dir(parent).await?;
        Ok(())
    }
}

/// Make a rename inside `dir` durable
///
/// Directory handles cannot be synced on Windows; NTFS journals the rename.
async fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    #[cfg(unix)]
    File::open(dir).await?.sync_all().await?;
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Parse one line of an offset file
///
/// The channel name is everything before the first whitespace run, the
/// record number everything after it. Blank lines yield `Ok(None)`.
pub fn parse_line(
    lineno: usize,
    line: &str,
) -> Result<Option<(String, RecordNumber)>, StorageError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (channel, rest) = line
        .split_once(char::is_whitespace)
        .ok_or_else(|| StorageError::parse(lineno, "missing record number"))?;

    let number = rest
        .trim_start()
        .parse::<u64>()
        .map_err(|e| StorageError::parse(lineno, e.to_string()))?;

    Ok(Some((channel.to_string(), RecordNumber(number))))
}
