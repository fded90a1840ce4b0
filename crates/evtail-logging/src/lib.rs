//! Structured logging setup for evtail
//!
//! Tailers log through `tracing` with structured fields (`channel`,
//! `record`, `error`). This crate installs the global subscriber that
//! renders them.
//!
//! # Features
//!
//! - **JSONL Output**: Structured JSON lines for log aggregation (default)
//! - **Pretty Console**: Human-readable output for development
//! - **File Rotation**: Daily/hourly log rotation via tracing-appender
//! - **RUST_LOG**: `EnvFilter` overrides the configured level
//!
//! # Quick Start
//!
//! ```ignore
//! use evtail_logging::{EvtailSubscriberBuilder, LogConfig};
//!
//! // JSONL to console
//! let _guard = EvtailSubscriberBuilder::new().init();
//!
//! // Pretty output while developing
//! let _guard = EvtailSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init();
//! ```

pub mod config;
pub mod layers;

pub use config::{ConsoleOutput, FieldOptions, FileOutput, LogConfig, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use thiserror::Error;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::layers::BoxedLayer;

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory or file could not be created
    #[error("Failed to open log file: {0}")]
    File(#[from] std::io::Error),

    /// A global subscriber is already installed
    #[error("Subscriber already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Builder for configuring and initializing the evtail logging subscriber
///
/// By default, console output uses JSONL format. Use
/// `LogConfig::development()` for human-readable output.
pub struct EvtailSubscriberBuilder {
    config: LogConfig,
}

impl EvtailSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Choose the console format, or turn console output off
    pub fn with_console(mut self, console: ConsoleOutput) -> Self {
        self.config.console = console;
        self
    }

    /// Also write JSONL to rolling files
    pub fn with_file_output(mut self, output: FileOutput) -> Self {
        self.config.file = Some(output);
        self
    }

    /// Try to install the subscriber globally
    ///
    /// The returned guard flushes file output on drop and must be kept
    /// alive for the duration of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LoggingError> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.level));

        let mut outputs: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if let Some(console) = layers::console_layer(self.config.console, &self.config.fields) {
            outputs.push(console);
        }

        if let Some(output) = &self.config.file {
            let (writer, file_guard) = layers::file_writer(output)?;
            outputs.push(layers::jsonl_layer(writer, &self.config.fields));
            guard = Some(file_guard);
        }

        Registry::default()
            .with(outputs)
            .with(env_filter)
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: logging not initialized: {}", e);
                None
            }
        }
    }
}

impl Default for EvtailSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    EvtailSubscriberBuilder::new().init()
}

/// Initialize logging for development (verbose, pretty console output)
pub fn init_development() -> Option<WorkerGuard> {
    EvtailSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Initialize logging for testing (minimal output, repeat calls are fine)
pub fn init_testing() {
    let _ = EvtailSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
