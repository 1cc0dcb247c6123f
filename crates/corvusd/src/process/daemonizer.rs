//! Fork/pipe detachment with a one-shot startup handshake.
//!
//! The original process blocks on a single read of the handshake pipe. The
//! detached process writes one marker byte once its initialisation has
//! succeeded; on failure it simply exits, closing the pipe, and the parent
//! reads EOF. The wire behaviour is binary by construction: there is no
//! partial-success state.

use std::fs::File;
use std::os::fd::{AsRawFd, OwnedFd};
use std::process;

use nix::errno::Errno;
use nix::sys::wait::{WaitPidFlag, waitpid};
use nix::unistd::{self, ForkResult, Pid, dup2, pipe, setsid};
use thiserror::Error;
use tracing::{debug, info, warn};

use corvus_config::LogDestination;

use super::PROCESS_TARGET;

/// Byte the detached process writes once initialisation has succeeded.
pub(crate) const SUCCESS_MARKER: u8 = 0x01;

/// Errors surfaced while detaching into the background.
///
/// All of these are fatal: the original process reports once and exits,
/// with no retry.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// Opening the null device failed.
    #[error("failed to open the null device: {source}")]
    NullSink {
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Creating the handshake pipe failed.
    #[error("failed to create the startup handshake pipe: {source}")]
    Handshake {
        /// Underlying OS error.
        source: Errno,
    },
    /// Duplicating the process failed.
    #[error("failed to fork into the background: {source}")]
    Fork {
        /// Underlying OS error.
        source: Errno,
    },
    /// Redirecting a standard stream failed.
    #[error("failed to redirect standard streams: {source}")]
    Redirect {
        /// Underlying OS error.
        source: Errno,
    },
}

/// Outcome observed by the original process on the handshake pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeOutcome {
    /// The detached process reported successful initialisation.
    Success,
    /// The pipe closed without a marker, or the read failed.
    Failure,
}

/// Write end of the handshake pipe, held by the detached process.
///
/// If initialisation fails the notifier is dropped unused; the descriptor
/// closes when the process exits and the parent observes failure.
#[derive(Debug)]
pub struct StartupNotifier {
    channel: Option<OwnedFd>,
}

impl StartupNotifier {
    /// Notifier for runs that never detached; notification is a no-op.
    #[must_use]
    pub fn attached() -> Self {
        Self { channel: None }
    }

    pub(crate) fn detached(channel: OwnedFd) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// Reports successful initialisation to the waiting original process
    /// and closes the channel. Idempotent.
    ///
    /// A write failure is logged, not fatal: the daemon itself is already
    /// healthy, and the parent treats a closed pipe as failure regardless.
    pub fn notify_success(&mut self) {
        let Some(channel) = self.channel.take() else {
            return;
        };
        if let Err(error) = unistd::write(&channel, &[SUCCESS_MARKER]) {
            warn!(
                target: PROCESS_TARGET,
                %error,
                "failed informing parent of successful start"
            );
        }
        // Dropping the descriptor closes the pipe.
    }
}

/// Blocks until the detached process reports in or closes its end.
///
/// Zero bytes (EOF), a zero byte, and a read error all mean failure; any
/// non-zero marker counts as success. The wait is deliberately unbounded:
/// a detached process that hangs before reporting keeps the original
/// process waiting, exactly as external process managers expect.
pub(crate) fn await_detached_outcome(channel: &OwnedFd) -> HandshakeOutcome {
    let mut marker = [0u8; 1];
    match unistd::read(channel.as_raw_fd(), &mut marker) {
        Ok(1) if marker[0] != 0 => HandshakeOutcome::Success,
        Ok(_) | Err(_) => HandshakeOutcome::Failure,
    }
}

/// Reaps the detached process's exit status without blocking, so a failed
/// start does not leave a zombie behind the exiting parent.
pub(crate) fn reap_nonblocking(child: Pid) {
    if let Err(error) = waitpid(child, Some(WaitPidFlag::WNOHANG)) {
        debug!(
            target: PROCESS_TARGET,
            child = child.as_raw(),
            %error,
            "non-blocking reap of detached process failed"
        );
    }
}

/// What happens to the standard streams after detaching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStdio {
    /// Redirect stdin, stdout, and stderr to the null device.
    Null,
    /// Redirect only stdin; debug output keeps the standard streams.
    KeepOutput,
}

impl DaemonStdio {
    /// Picks the stream policy from the log destination and debug level.
    #[must_use]
    pub fn from_destination(destination: &LogDestination, debug_level: u8) -> Self {
        if debug_level > 0 || destination.keeps_standard_streams() {
            Self::KeepOutput
        } else {
            Self::Null
        }
    }
}

/// Strategy for detaching the daemon from its controlling session.
pub trait Daemonizer: Send + Sync {
    /// Detaches the calling process into the background.
    ///
    /// Returns only in the detached process, handing it the notifier for
    /// the startup handshake. The original process blocks on the handshake
    /// and exits with status 0 on success or 1 on failure.
    ///
    /// # Errors
    ///
    /// Pipe creation, fork, or stream redirection failures; all fatal.
    fn daemonize(&self, stdio: DaemonStdio) -> Result<StartupNotifier, DaemonizeError>;
}

/// Daemoniser backed by fork(2) with a pipe handshake.
#[derive(Debug, Default)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, stdio: DaemonStdio) -> Result<StartupNotifier, DaemonizeError> {
        let null = File::options()
            .read(true)
            .write(true)
            .open("/dev/null")
            .map_err(|source| DaemonizeError::NullSink { source })?;
        let (read_end, write_end) = pipe().map_err(|source| DaemonizeError::Handshake { source })?;

        info!(target: PROCESS_TARGET, "detaching into the background");
        // SAFETY: the supervisor is still single-threaded at this point, so
        // no lock or allocator state can be left inconsistent in the child.
        match unsafe { unistd::fork() }.map_err(|source| DaemonizeError::Fork { source })? {
            ForkResult::Parent { child } => {
                // Widow the pipe so EOF arrives if the child dies early.
                drop(write_end);
                match await_detached_outcome(&read_end) {
                    HandshakeOutcome::Success => process::exit(0),
                    HandshakeOutcome::Failure => {
                        reap_nonblocking(child);
                        process::exit(1);
                    }
                }
            }
            ForkResult::Child => {
                drop(read_end);
                redirect_streams(&null, stdio)
                    .map_err(|source| DaemonizeError::Redirect { source })?;
                if let Err(error) = setsid() {
                    warn!(
                        target: PROCESS_TARGET,
                        %error,
                        "failed to disassociate from the controlling session"
                    );
                }
                Ok(StartupNotifier::detached(write_end))
            }
        }
    }
}

fn redirect_streams(null: &File, stdio: DaemonStdio) -> Result<(), Errno> {
    // An open stdin causes odd behaviour in anything the engine execs.
    dup2(null.as_raw_fd(), nix::libc::STDIN_FILENO)?;
    if matches!(stdio, DaemonStdio::Null) {
        dup2(null.as_raw_fd(), nix::libc::STDOUT_FILENO)?;
        dup2(null.as_raw_fd(), nix::libc::STDERR_FILENO)?;
    }
    Ok(())
}
