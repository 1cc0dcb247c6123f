//! Startup and lifecycle supervisor for the corvus network service daemon.
//!
//! The supervisor owns the parts of the daemon that must be right before the
//! processing engine can be trusted to run: the optional detachment into the
//! background with a one-shot success/failure handshake back to the invoking
//! process, translation of OS signals into lifecycle requests, pid-file
//! ownership, the run-state machine driving the engine's processing loop,
//! and the ordered shutdown sequence.
//!
//! The request-processing engine itself, configuration-file semantics, and
//! the module subsystem are external collaborators reached through the
//! narrow seams in [`engine`]: initialise, process one cycle, reload, and
//! release.

pub mod engine;
mod process;
pub mod telemetry;

use std::io::{self, Write};
use std::process::ExitCode;

use tracing::error;

use corvus_config::BootstrapOptions;

pub use process::{
    CompletionStatus, DaemonStdio, Daemonizer, HandshakeOutcome, InterruptPolicy, LaunchError,
    LaunchMode, PidFile, RunState, SignalRequest, SignalRouter, SignalState, StartupNotifier,
    run_daemon,
};

/// Validates the bootstrap flags, initialises telemetry, and runs the
/// daemon to completion, mapping the outcome onto the process exit code.
///
/// Exit code 0 means a clean shutdown after normal completion; 1 covers
/// fatal start-up errors, a failed detachment handshake, and processing
/// loop failures.
#[must_use]
pub fn run(options: &BootstrapOptions) -> ExitCode {
    if let Err(error) = options.validate() {
        diagnostic(&error);
        return ExitCode::FAILURE;
    }

    let _telemetry = match telemetry::initialise(options) {
        Ok(handle) => handle,
        Err(error) => {
            diagnostic(&error);
            return ExitCode::FAILURE;
        }
    };

    match process::run_daemon(options) {
        Ok(CompletionStatus::Clean) => ExitCode::SUCCESS,
        Ok(CompletionStatus::Failed) => ExitCode::FAILURE,
        Err(error) => {
            error!(%error, "fatal start-up error");
            diagnostic(&error);
            ExitCode::FAILURE
        }
    }
}

/// One-line diagnostic on the error stream, for the operator who started
/// the process; telemetry may be pointed elsewhere or not up yet.
fn diagnostic(error: &dyn std::error::Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "corvusd: {error}");
}
