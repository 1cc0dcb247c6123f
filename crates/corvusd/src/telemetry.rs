//! Structured telemetry initialisation for the daemon.

use std::env;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use corvus_config::{BootstrapOptions, LogDestination};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to open the configured log file.
    #[error("failed to open log file '{path}': {source}")]
    LogFile {
        /// Configured log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Configures the global tracing subscriber when invoked for the first
/// time.
///
/// Repeated calls are idempotent: the first invocation installs the global
/// subscriber, later ones return a fresh [`TelemetryHandle`] without
/// touching the global state again.
///
/// # Errors
///
/// Returns a [`TelemetryError`] when the filter cannot be parsed, the log
/// file cannot be opened, or the subscriber cannot be installed. All three
/// are fatal start-up errors.
pub fn initialise(options: &BootstrapOptions) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(options))
        .map(|()| TelemetryHandle)
}

fn install_subscriber(options: &BootstrapOptions) -> Result<(), TelemetryError> {
    let filter = build_filter(options.debug_level())?;
    let destination = options.effective_log_destination();
    let (writer, ansi) = build_writer(&destination)?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(writer)
        .with_ansi(ansi)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

/// `RUST_LOG` wins when set; otherwise the `-x` count picks the level.
fn build_filter(debug_level: u8) -> Result<EnvFilter, TelemetryError> {
    let directive = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) if !value.is_empty() => value,
        _ => default_directive(debug_level).to_owned(),
    };
    EnvFilter::try_new(directive).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn default_directive(debug_level: u8) -> &'static str {
    match debug_level {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn build_writer(destination: &LogDestination) -> Result<(BoxMakeWriter, bool), TelemetryError> {
    Ok(match destination {
        LogDestination::Stderr => (
            BoxMakeWriter::new(io::stderr),
            io::stderr().is_terminal(),
        ),
        LogDestination::Stdout => (
            BoxMakeWriter::new(io::stdout),
            io::stdout().is_terminal(),
        ),
        LogDestination::Null => (BoxMakeWriter::new(io::sink), false),
        LogDestination::File(path) => {
            let file = File::options()
                .append(true)
                .create(true)
                .open(path)
                .map_err(|source| TelemetryError::LogFile {
                    path: path.clone(),
                    source,
                })?;
            (BoxMakeWriter::new(Arc::new(file)), false)
        }
    })
}
