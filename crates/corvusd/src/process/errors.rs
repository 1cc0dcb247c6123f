//! Unified error surface for daemon launch and supervision.

use thiserror::Error;

use crate::engine::EngineError;

use super::daemonizer::DaemonizeError;
use super::pid_file::PidFileError;
use super::signals::SignalError;

/// Errors surfaced while launching the daemon process.
///
/// Every variant is a fatal start-up error: reported once, never retried,
/// and reflected as exit code 1. When daemonised, the waiting original
/// process observes these as a failed handshake.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Detaching into the background failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[from]
        source: DaemonizeError,
    },
    /// Installing signal handling failed.
    #[error("failed to install signal handling: {source}")]
    Signals {
        /// Underlying signal error.
        #[from]
        source: SignalError,
    },
    /// Writing the pid file failed.
    #[error("{source}")]
    PidFile {
        /// Underlying pid-file error.
        #[from]
        source: PidFileError,
    },
    /// Initialising the processing engine failed.
    #[error("failed to initialise the processing engine: {source}")]
    Engine {
        /// Underlying engine error.
        #[from]
        source: EngineError,
    },
}
