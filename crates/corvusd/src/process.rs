pub(crate) mod daemonizer;
mod errors;
pub(crate) mod launch;
pub(crate) mod lifecycle;
pub(crate) mod pid_file;
pub(crate) mod shutdown;
pub(crate) mod signals;

pub use daemonizer::{DaemonStdio, Daemonizer, HandshakeOutcome, StartupNotifier};
pub use errors::LaunchError;
pub use launch::{LaunchMode, run_daemon};
pub use lifecycle::{CompletionStatus, RunState};
pub use pid_file::PidFile;
pub use signals::{InterruptPolicy, SignalRequest, SignalRouter, SignalState};

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

#[cfg(test)]
mod daemonizer_tests;
#[cfg(test)]
mod launch_tests;
#[cfg(test)]
mod signals_tests;
