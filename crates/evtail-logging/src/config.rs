//! Logging configuration
//!
//! A tailer runs either interactively (console) or unattended as a service
//! (rotating files). Event data may be written to stdout, so console logs
//! always go to stderr.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How log lines reach the console
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleOutput {
    /// No console output
    Off,
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Human-readable lines
    Pretty { ansi: bool },
}

/// Which extra fields appear in JSONL output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOptions {
    /// Enclosing spans, which carry the `channel` field of a tailer
    pub spans: bool,
    /// Source file and line
    pub location: bool,
    /// Thread ids and names
    pub threads: bool,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            spans: true,
            location: false,
            threads: false,
        }
    }
}

/// Rolling log file output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutput {
    pub directory: PathBuf,
    /// File name prefix; dated suffixes are added when rotating
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: RotationStrategy,
}

fn default_prefix() -> String {
    "evtail".to_string()
}

impl FileOutput {
    /// Daily-rotated `evtail.*` files in `directory`
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: default_prefix(),
            rotation: RotationStrategy::default(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}

/// When a log file is rolled over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// A single `<prefix>.log`, truncated on start
    Never,
}

/// Subscriber configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub console: ConsoleOutput,
    pub file: Option<FileOutput>,
    pub fields: FieldOptions,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: ConsoleOutput::Jsonl,
            file: None,
            fields: FieldOptions::default(),
        }
    }
}

impl LogConfig {
    /// Pretty, colored console output at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleOutput::Pretty { ansi: true },
            fields: FieldOptions {
                location: true,
                ..FieldOptions::default()
            },
            ..Self::default()
        }
    }

    /// Unattended operation: JSONL files in `log_dir`, no console
    pub fn service(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            console: ConsoleOutput::Off,
            file: Some(FileOutput::new(log_dir)),
            ..Self::default()
        }
    }

    /// Warnings and errors only, for test binaries
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            ..Self::default()
        }
    }
}
