use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::logging::LogDestination;
use crate::paths::default_pid_path;

/// Bootstrap flags consumed by the supervisor.
///
/// Parsing is deliberately thin; combination rules that must surface as a
/// fatal start-up error (exit code 1 with a one-line diagnostic) are
/// enforced by [`BootstrapOptions::validate`] rather than by clap.
#[derive(Debug, Clone, Parser)]
#[command(name = "corvusd", version, about = "Long-running network service daemon")]
pub struct BootstrapOptions {
    /// Run as a foreground process instead of detaching.
    #[arg(short = 'f', long)]
    pub foreground: bool,

    /// Single-process mode: no worker spawning and no detachment.
    #[arg(short = 's', long)]
    pub single_process: bool,

    /// Disable worker spawning without affecting detachment.
    #[arg(short = 't', long)]
    pub no_workers: bool,

    /// Write the pid file even when running in the foreground.
    #[arg(short = 'P', long = "write-pid")]
    pub force_write_pid: bool,

    /// Raise debug verbosity; repeat for more detail.
    #[arg(short = 'x', action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Full debugging: highest verbosity, foreground, stdout logging.
    #[arg(short = 'X', long = "full-debug")]
    pub full_debug: bool,

    /// Exit cleanly on interrupt/quit instead of immediately.
    #[arg(short = 'm', long)]
    pub debug_memory: bool,

    /// Report allocated memory at shutdown; implies --debug-memory.
    #[arg(short = 'M', long)]
    pub memory_report: bool,

    /// Listen on this address only; must be paired with --listen-port.
    #[arg(short = 'i', long)]
    pub listen_address: Option<IpAddr>,

    /// Listen on this port only; must be paired with --listen-address.
    #[arg(short = 'p', long)]
    pub listen_port: Option<u16>,

    /// Log destination: stdout, stderr, null, or a file path.
    #[arg(short = 'l', long)]
    pub log_destination: Option<LogDestination>,

    /// Instance name, used as the pid-file stem.
    #[arg(short = 'n', long, default_value = "corvusd")]
    pub name: String,

    /// Explicit pid-file path, overriding the runtime directory default.
    #[arg(long)]
    pub pid_file: Option<PathBuf>,
}

/// Fatal bootstrap flag combinations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionsError {
    /// Only one half of the listen endpoint was supplied.
    #[error("the listen address and listen port cannot be used individually")]
    PartialListenEndpoint,
    /// Port 0 cannot be bound deliberately.
    #[error("invalid listen port 0")]
    ZeroListenPort,
}

/// Bind restriction supplied on the command line, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenEndpoint {
    /// Address to bind exclusively.
    pub address: IpAddr,
    /// Port to bind exclusively.
    pub port: u16,
}

impl BootstrapOptions {
    /// Checks flag combinations that must abort start-up.
    ///
    /// # Errors
    ///
    /// Returns an [`OptionsError`] when exactly one of the listen
    /// address/port pair is supplied, or when the port is 0.
    pub fn validate(&self) -> Result<(), OptionsError> {
        match (self.listen_address, self.listen_port) {
            (Some(_), None) | (None, Some(_)) => Err(OptionsError::PartialListenEndpoint),
            (Some(_), Some(0)) => Err(OptionsError::ZeroListenPort),
            _ => Ok(()),
        }
    }

    /// The validated listen restriction, when both halves were supplied.
    #[must_use]
    pub fn listen_endpoint(&self) -> Option<ListenEndpoint> {
        match (self.listen_address, self.listen_port) {
            (Some(address), Some(port)) => Some(ListenEndpoint { address, port }),
            _ => None,
        }
    }

    /// Whether detachment is disabled.
    #[must_use]
    pub fn runs_in_foreground(&self) -> bool {
        self.foreground || self.single_process || self.full_debug
    }

    /// Whether the engine may spawn worker subprocesses or threads.
    ///
    /// Full debugging also disables spawning: everything runs in the one
    /// process being debugged.
    #[must_use]
    pub fn spawns_workers(&self) -> bool {
        !(self.single_process || self.no_workers || self.full_debug)
    }

    /// Effective verbosity; full debug counts as at least two `-x` levels.
    #[must_use]
    pub fn debug_level(&self) -> u8 {
        if self.full_debug {
            self.debug.saturating_add(2)
        } else {
            self.debug
        }
    }

    /// Whether `--debug-memory` semantics are active (directly or implied
    /// by `--memory-report`).
    #[must_use]
    pub fn debug_memory_active(&self) -> bool {
        self.debug_memory || self.memory_report
    }

    /// Whether interrupt/quit should shut down gracefully.
    ///
    /// Only memory-debug runs get the full shutdown sequence, so the
    /// report at exit is meaningful; everywhere else an interrupt kills
    /// the server on the spot.
    #[must_use]
    pub fn graceful_interrupt(&self) -> bool {
        self.debug_memory_active()
    }

    /// Where log output goes once telemetry is up.
    #[must_use]
    pub fn effective_log_destination(&self) -> LogDestination {
        if self.full_debug {
            return LogDestination::Stdout;
        }
        self.log_destination.clone().unwrap_or_default()
    }

    /// The pid-file path: the explicit override or the runtime-directory
    /// default derived from the instance name.
    #[must_use]
    pub fn pid_file_path(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(|| default_pid_path(&self.name))
    }
}
