//! Seams to the external request-processing engine.
//!
//! The engine is the bulk of a real server; here it is opaque. The
//! supervisor reaches it through four entry points only: initialise,
//! process one cycle, reload configuration, and release resources. The
//! placeholder implementations in [`placeholder`] stand in until a real
//! engine is wired up.

pub mod placeholder;

use std::sync::Arc;

use thiserror::Error;

use corvus_config::ListenEndpoint;

use crate::process::SignalState;

/// Outcome of one [`Processor::process`] cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessVerdict {
    /// The engine finished normally; the daemon shuts down cleanly.
    Completed,
    /// A configuration reload was requested; reload, then process again.
    ReloadRequested,
}

/// Errors surfaced by the external engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine initialisation failed; this is a fatal start-up error.
    #[error("engine initialisation failed: {0}")]
    Initialise(String),
    /// The processing loop aborted with an internal error.
    #[error("processing loop failed: {0}")]
    Process(String),
}

/// Errors surfaced by a configuration reload attempt.
#[derive(Debug, Error)]
#[error("configuration reload failed: {reason}")]
pub struct ReloadError {
    /// Engine-provided failure description.
    pub reason: String,
}

/// Errors surfaced by a notification hook.
#[derive(Debug, Error)]
#[error("'{event}' hook failed: {reason}")]
pub struct HookError {
    /// Event the hook was fired for.
    pub event: &'static str,
    /// Hook-provided failure description.
    pub reason: String,
}

/// Context handed to the engine at initialisation.
#[derive(Debug)]
pub struct EngineContext {
    /// Pending-request state the engine must observe so that
    /// [`Processor::process`] returns promptly once a request is raised.
    pub signals: Arc<SignalState>,
    /// Whether the engine may spawn worker subprocesses or threads.
    pub spawn_workers: bool,
    /// Bind restriction from the command line, if any.
    pub listen: Option<ListenEndpoint>,
}

/// The request-processing engine driven by the lifecycle controller.
pub trait Processor: Send {
    /// Prepares the engine: sockets, worker pools, module state.
    ///
    /// Called once, in the detached process when daemonised, before signal
    /// handling is installed.
    ///
    /// # Errors
    ///
    /// Any error aborts start-up; the waiting parent observes a failed
    /// handshake.
    fn initialize(&mut self, context: &EngineContext) -> Result<(), EngineError>;

    /// Runs one processing cycle.
    ///
    /// May block indefinitely awaiting work, but must observe the signal
    /// state from [`EngineContext`] and return promptly once a request is
    /// pending. At most one call is outstanding at a time.
    ///
    /// # Errors
    ///
    /// An error routes through the normal shutdown sequence and the process
    /// exits with a failure status.
    fn process(&mut self) -> Result<ProcessVerdict, EngineError>;

    /// Releases the engine's resources during shutdown.
    fn release(&mut self);
}

/// Re-reads and applies configuration during a reload cycle.
pub trait ConfigReloader: Send {
    /// Performs one reload cycle.
    ///
    /// # Errors
    ///
    /// A failed reload is logged and the daemon continues on the previous
    /// configuration; it never stops the server.
    fn reload(&mut self) -> Result<(), ReloadError>;
}

/// Best-effort notification hooks fired around the engine lifecycle.
pub trait LifecycleHooks: Send {
    /// Fired after initialisation succeeds, before the processing loop.
    ///
    /// # Errors
    ///
    /// Failures are logged as warnings and never abort start-up.
    fn starting(&self) -> Result<(), HookError>;

    /// Fired as the first step of the shutdown sequence.
    ///
    /// # Errors
    ///
    /// Failures are logged as warnings and never abort the remaining
    /// shutdown steps.
    fn stopping(&self) -> Result<(), HookError>;
}
