//! Configuration for a channel tailer

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TailerError, TailerResult};

/// Where to start reading a channel that has no saved offset
///
/// Only affects first contact. Once a channel has an offset, reading
/// always resumes from it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartPosition {
    /// Emit every record already in the channel, oldest first
    Beginning,
    /// Treat the channel as a live stream; emit only new records
    #[default]
    End,
}

impl fmt::Display for StartPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Beginning => write!(f, "beginning"),
            Self::End => write!(f, "end"),
        }
    }
}

impl FromStr for StartPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginning" => Ok(Self::Beginning),
            "end" => Ok(Self::End),
            other => Err(format!(
                "invalid start position '{other}', expected 'beginning' or 'end'"
            )),
        }
    }
}

/// Configuration for tailing one channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TailerConfig {
    /// Event log channel name
    /// Default: "Application"
    #[serde(default = "default_channel")]
    pub channel: String,

    /// How often to check the channel for new records (milliseconds)
    /// Default: 1000
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Offset file path
    /// Default: `eventlog-<channel>.sincedb` in the working directory
    #[serde(default)]
    pub offset_path: Option<PathBuf>,

    /// Minimum time between offset file writes (milliseconds)
    /// Default: 15000
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// First-contact start position
    #[serde(default)]
    pub start_position: StartPosition,

    /// Delay before retrying after a failed poll cycle (milliseconds)
    /// Default: 1000
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Host name stamped on emitted events
    /// Default: COMPUTERNAME / HOSTNAME, else "localhost"
    #[serde(default)]
    pub host: Option<String>,
}

fn default_channel() -> String {
    "Application".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_flush_interval_ms() -> u64 {
    15_000
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            poll_interval_ms: default_poll_interval_ms(),
            offset_path: None,
            flush_interval_ms: default_flush_interval_ms(),
            start_position: StartPosition::default(),
            retry_backoff_ms: default_retry_backoff_ms(),
            host: None,
        }
    }
}

impl TailerConfig {
    /// Create a configuration for a channel with default settings
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_offset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.offset_path = Some(path.into());
        self
    }

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_start_position(mut self, position: StartPosition) -> Self {
        self.start_position = position;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Offset file path, derived from the channel name when unset
    pub fn resolved_offset_path(&self) -> PathBuf {
        self.offset_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("eventlog-{}.sincedb", self.channel)))
    }

    /// Host name, from configuration or the environment
    pub fn resolved_host(&self) -> String {
        self.host
            .clone()
            .or_else(|| std::env::var("COMPUTERNAME").ok())
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Check the configuration before opening the channel
    ///
    /// Channel names are stored unescaped in the offset file, one
    /// `<channel> <record>` pair per line, so they may not contain
    /// whitespace.
    pub fn validate(&self) -> TailerResult<()> {
        if self.channel.is_empty() {
            return Err(TailerError::Config("channel name is empty".into()));
        }
        if self.channel.chars().any(char::is_whitespace) {
            return Err(TailerError::Config(format!(
                "channel name '{}' contains whitespace",
                self.channel
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(TailerError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}
