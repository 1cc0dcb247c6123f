//! Signal routing: turns asynchronous OS signals into lifecycle requests.
//!
//! Handler bodies are restricted to an identity comparison, one atomic
//! store, and `_exit` — nothing that allocates, blocks, or takes a lock can
//! run at signal time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal, kill};
use nix::unistd::{Pid, getpid};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::low_level;
use thiserror::Error;
use tracing::debug;

use super::PROCESS_TARGET;

/// Pending lifecycle request raised by signal handlers.
///
/// The discriminants order the requests by priority: terminate always wins
/// over reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SignalRequest {
    /// Nothing pending.
    None = 0,
    /// Re-read configuration and resume.
    Reload = 1,
    /// Shut down gracefully.
    Terminate = 2,
}

impl SignalRequest {
    fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Reload,
            2 => Self::Terminate,
            _ => Self::None,
        }
    }
}

/// Shared slot between signal handlers and the lifecycle controller.
///
/// Handlers are the only writers, the controller the only consumer, so no
/// lock is needed. Requests coalesce rather than queue: any number of
/// reload signals before the next check yields one reload cycle, and a
/// raised terminate is never overwritten back to a lesser request.
#[derive(Debug)]
pub struct SignalState {
    request: AtomicU8,
    supervisor: Pid,
}

impl SignalState {
    /// Records the supervisor identity. Must be constructed after the last
    /// fork and before any handler is installed, so the identity is
    /// captured exactly once.
    #[must_use]
    pub fn new(supervisor: Pid) -> Self {
        Self {
            request: AtomicU8::new(SignalRequest::None as u8),
            supervisor,
        }
    }

    /// The recorded supervisor identity.
    #[must_use]
    pub fn supervisor(&self) -> Pid {
        self.supervisor
    }

    /// True when the calling process is the recorded supervisor.
    ///
    /// Guards against a process-group broadcast reaching a forked worker
    /// that inherited these handlers.
    #[must_use]
    pub fn is_supervisor(&self) -> bool {
        getpid() == self.supervisor
    }

    /// Raises a request. Async-signal-safe: a single atomic read-modify-
    /// write keeping the highest-priority request.
    pub fn raise(&self, request: SignalRequest) {
        self.request.fetch_max(request as u8, Ordering::SeqCst);
    }

    /// Non-destructive view, for the engine's prompt-return check.
    #[must_use]
    pub fn pending(&self) -> SignalRequest {
        SignalRequest::from_raw(self.request.load(Ordering::SeqCst))
    }

    /// Consumes the pending request; coalesced deliveries yield one value.
    #[must_use]
    pub fn take(&self) -> SignalRequest {
        SignalRequest::from_raw(self.request.swap(SignalRequest::None as u8, Ordering::SeqCst))
    }
}

/// How interrupt/quit signals are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptPolicy {
    /// Interrupt/quit behave like terminate: graceful shutdown.
    Graceful,
    /// Interrupt/quit exit the process on the spot, skipping all cleanup.
    FastExit,
}

/// Errors surfaced while installing or manipulating signal handling.
#[derive(Debug, Error)]
pub enum SignalError {
    /// Registering a handler failed.
    #[error("failed to install handler for signal {signal}: {source}")]
    Install {
        /// Signal number the registration was for.
        signal: i32,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Changing a signal disposition failed.
    #[error("failed to update disposition for {signal}: {source}")]
    Disposition {
        /// Signal whose disposition was being changed.
        signal: Signal,
        /// Underlying OS error.
        source: Errno,
    },
    /// Broadcasting to the process group failed.
    #[error("failed to broadcast {signal} to process group of {supervisor}: {source}")]
    Broadcast {
        /// Signal being broadcast.
        signal: Signal,
        /// Supervisor whose group was targeted.
        supervisor: Pid,
        /// Underlying OS error.
        source: Errno,
    },
}

/// Installs and manipulates process signal dispositions.
pub trait SignalRouter: Send + Sync {
    /// Installs reload/terminate/interrupt handling and ignores SIGPIPE.
    ///
    /// # Errors
    ///
    /// Any installation failure is a fatal start-up error.
    fn install(&self, state: &Arc<SignalState>, policy: InterruptPolicy)
    -> Result<(), SignalError>;

    /// Sets the terminate signal to ignore, so a group broadcast during
    /// shutdown cannot re-enter the shutdown sequence.
    ///
    /// # Errors
    ///
    /// Surfaces the OS error; callers downgrade it to a warning.
    fn disarm_terminate(&self) -> Result<(), SignalError>;

    /// Broadcasts the terminate signal to the supervisor's whole process
    /// group, stopping spawned workers.
    ///
    /// # Errors
    ///
    /// Surfaces the OS error; callers downgrade it to a warning.
    fn broadcast_terminate(&self, supervisor: Pid) -> Result<(), SignalError>;
}

/// Production router backed by `signal-hook` registrations and raw
/// disposition changes.
#[derive(Debug, Default)]
pub struct SystemSignalRouter;

impl SystemSignalRouter {
    /// Builds a new system router.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SignalRouter for SystemSignalRouter {
    fn install(
        &self,
        state: &Arc<SignalState>,
        policy: InterruptPolicy,
    ) -> Result<(), SignalError> {
        // Broken pipes are the engine's concern; the supervisor ignores
        // them outright.
        set_disposition(Signal::SIGPIPE, SigHandler::SigIgn)?;

        // signal-hook keeps registrations installed across deliveries, so
        // the reload handler needs no re-arming dance.
        let reload_state = Arc::clone(state);
        register(SIGHUP, move || {
            reload_state.raise(SignalRequest::Reload);
        })?;

        register_fatal(SIGTERM, Arc::clone(state), true)?;

        let graceful = matches!(policy, InterruptPolicy::Graceful);
        register_fatal(SIGINT, Arc::clone(state), graceful)?;
        register_fatal(SIGQUIT, Arc::clone(state), graceful)?;

        debug!(target: PROCESS_TARGET, ?policy, "signal handling installed");
        Ok(())
    }

    fn disarm_terminate(&self) -> Result<(), SignalError> {
        set_disposition(Signal::SIGTERM, SigHandler::SigIgn)
    }

    fn broadcast_terminate(&self, supervisor: Pid) -> Result<(), SignalError> {
        // A negative pid addresses the whole process group. The supervisor
        // itself is part of it, which is why terminate is disarmed first.
        kill(Pid::from_raw(-supervisor.as_raw()), Signal::SIGTERM).map_err(|source| {
            SignalError::Broadcast {
                signal: Signal::SIGTERM,
                supervisor,
                source,
            }
        })
    }
}

fn set_disposition(signal: Signal, handler: SigHandler) -> Result<(), SignalError> {
    // SAFETY: SigIgn is a valid disposition and runs no handler code.
    unsafe { signal::signal(signal, handler) }
        .map(|_| ())
        .map_err(|source| SignalError::Disposition { signal, source })
}

fn register<F>(signal: i32, action: F) -> Result<(), SignalError>
where
    F: Fn() + Sync + Send + 'static,
{
    // SAFETY: the supplied actions only perform async-signal-safe work
    // (getpid, one atomic store, _exit).
    unsafe { low_level::register(signal, action) }
        .map(|_| ())
        .map_err(|source| SignalError::Install { signal, source })
}

/// Registers a fatal-signal handler.
///
/// A process whose identity differs from the recorded supervisor (a forked
/// descendant hit by a group broadcast) exits immediately instead of
/// re-running shutdown logic. The supervisor itself either raises a
/// terminate request or, under the fast-exit policy, also exits on the
/// spot.
fn register_fatal(signal: i32, state: Arc<SignalState>, graceful: bool) -> Result<(), SignalError> {
    register(signal, move || {
        if !state.is_supervisor() {
            low_level::exit(signal);
        }
        if graceful {
            state.raise(SignalRequest::Terminate);
        } else {
            low_level::exit(signal);
        }
    })
}
