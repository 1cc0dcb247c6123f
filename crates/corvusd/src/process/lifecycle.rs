//! Run-state machine driving the engine's processing loop.

use tracing::{debug, error};

use crate::engine::{ConfigReloader, ProcessVerdict, Processor};

use super::PROCESS_TARGET;
use super::signals::{SignalRequest, SignalState};

/// Lifecycle states of the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Parsing flags, opening sinks; before any detachment.
    Initializing,
    /// Between fork and the handshake outcome.
    Daemonizing,
    /// The processing loop is (about to be) active.
    Running,
    /// A reload cycle is in progress.
    Reloading,
    /// The shutdown sequence is running.
    Stopping,
    /// Terminal state; the process is about to exit.
    Terminated,
}

/// Final status recorded for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    /// Normal completion; exit 0.
    Clean,
    /// The processing loop failed; exit 1.
    Failed,
}

/// Single thread of control over the run state machine.
///
/// At most one `process` call is outstanding at a time, and reload cycles
/// are unbounded in count: they never change the process identity or the
/// pid-file record.
#[derive(Debug)]
pub struct LifecycleController {
    state: RunState,
}

impl Default for LifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleController {
    /// Starts the machine in [`RunState::Initializing`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RunState::Initializing,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Records entry into the detachment window.
    pub fn note_daemonizing(&mut self) {
        self.transition(RunState::Daemonizing);
    }

    /// Records the terminal state once shutdown has completed.
    pub fn finish(&mut self) {
        self.transition(RunState::Terminated);
    }

    /// Drives the processing loop until completion or failure, leaving the
    /// machine in [`RunState::Stopping`].
    ///
    /// The engine is responsible for returning promptly once a request is
    /// pending; this controller consumes the request at exactly one point,
    /// between `process` calls, which is what makes the lock-free slot
    /// sound.
    pub fn run(
        &mut self,
        signals: &SignalState,
        processor: &mut dyn Processor,
        reloader: &mut dyn ConfigReloader,
    ) -> CompletionStatus {
        self.transition(RunState::Running);
        loop {
            match processor.process() {
                Ok(ProcessVerdict::ReloadRequested) => {
                    // Terminate wins over any reloads coalesced since the
                    // engine noticed the request.
                    if signals.take() == SignalRequest::Terminate {
                        return self.stop(CompletionStatus::Clean);
                    }
                    self.transition(RunState::Reloading);
                    if let Err(error) = reloader.reload() {
                        error!(
                            target: PROCESS_TARGET,
                            %error,
                            "reload failed; continuing with the previous configuration"
                        );
                    }
                    self.transition(RunState::Running);
                }
                Ok(ProcessVerdict::Completed) => {
                    let _ = signals.take();
                    return self.stop(CompletionStatus::Clean);
                }
                Err(error) => {
                    error!(target: PROCESS_TARGET, %error, "exiting due to internal error");
                    let _ = signals.take();
                    return self.stop(CompletionStatus::Failed);
                }
            }
        }
    }

    fn stop(&mut self, status: CompletionStatus) -> CompletionStatus {
        self.transition(RunState::Stopping);
        status
    }

    fn transition(&mut self, next: RunState) {
        debug!(
            target: PROCESS_TARGET,
            from = ?self.state,
            to = ?next,
            "run state transition"
        );
        self.state = next;
    }
}
