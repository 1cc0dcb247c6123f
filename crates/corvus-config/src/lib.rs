//! Bootstrap configuration for the corvus daemon supervisor.
//!
//! This crate covers only what the supervisor consumes before and during
//! start-up: the command-line bootstrap flags, the log destination model,
//! and the default pid-file location. Full configuration-file parsing lives
//! in the processing engine behind the reload entry point and is out of
//! scope here.

mod logging;
mod options;
mod paths;

pub use logging::LogDestination;
pub use options::{BootstrapOptions, ListenEndpoint, OptionsError};
pub use paths::default_pid_path;

#[cfg(test)]
mod logging_tests;
