//! Formatting layers and writers
//!
//! Every output is built as a boxed layer over [`Registry`] so the builder
//! can stack any combination of console and file outputs.

use std::fs::{self, File};
use std::io;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{Layer, Registry};

use crate::config::{ConsoleOutput, FieldOptions, FileOutput, RotationStrategy};

/// A layer that can be stacked onto the base registry
pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// JSONL layer writing to `writer`, event fields flattened to the root
pub fn jsonl_layer<W>(writer: W, fields: &FieldOptions) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(fields.spans)
        .with_span_list(fields.spans)
        .with_file(fields.location)
        .with_line_number(fields.location)
        .with_thread_ids(fields.threads)
        .with_thread_names(fields.threads)
        .with_writer(writer)
        .boxed()
}

/// Console layer on stderr, or `None` when console output is off
pub fn console_layer(console: ConsoleOutput, fields: &FieldOptions) -> Option<BoxedLayer> {
    match console {
        ConsoleOutput::Off => None,
        ConsoleOutput::Jsonl => Some(jsonl_layer(io::stderr, fields)),
        ConsoleOutput::Pretty { ansi } => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_file(fields.location)
                .with_line_number(fields.location)
                .with_writer(io::stderr)
                .boxed(),
        ),
    }
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the rolling strategies
/// append to dated files.
pub fn file_writer(output: &FileOutput) -> io::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&output.directory)?;

    let rotation = match output.rotation {
        RotationStrategy::Never => {
            let path = output.directory.join(format!("{}.log", output.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::new(rotation, &output.directory, &output.prefix);
    Ok(tracing_appender::non_blocking(appender))
}
