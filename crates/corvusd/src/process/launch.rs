//! Supervises daemon launch sequencing and runtime orchestration.
//!
//! The ordering here is the contract: detach, capture identity, initialise
//! the engine, install signal handling, write the pid file, fire the
//! starting hook, and only then release the waiting parent with the success
//! byte and enter the processing loop.

use std::sync::Arc;

use nix::unistd::getpid;
use tracing::{info, warn};

use corvus_config::BootstrapOptions;

use crate::engine::placeholder::{LoggingHooks, PlaceholderEngine, PlaceholderReloader};
use crate::engine::{ConfigReloader, EngineContext, LifecycleHooks, Processor};

use super::PROCESS_TARGET;
use super::daemonizer::{DaemonStdio, Daemonizer, StartupNotifier, SystemDaemonizer};
use super::errors::LaunchError;
use super::lifecycle::{CompletionStatus, LifecycleController};
use super::pid_file::PidFile;
use super::shutdown::{ShutdownPlan, run_shutdown};
use super::signals::{InterruptPolicy, SignalRouter, SignalState, SystemSignalRouter};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling session.
    Background,
    /// Remain attached to the terminal; debugging, tests, single-process.
    Foreground,
}

impl LaunchMode {
    fn from_options(options: &BootstrapOptions) -> Self {
        if options.runs_in_foreground() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators controlling the daemon lifecycle.
pub(crate) struct ProcessControl<D, R> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) router: R,
}

/// Engine collaborators behind the narrow external contract.
pub(crate) struct ServiceDeps<P, C, H> {
    pub(crate) processor: P,
    pub(crate) reloader: C,
    pub(crate) hooks: H,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<D, R, P, C, H> {
    pub(crate) process: ProcessControl<D, R>,
    pub(crate) services: ServiceDeps<P, C, H>,
}

/// Runs the daemon using the production collaborators.
///
/// # Errors
///
/// Any [`LaunchError`] is fatal; the caller maps it to exit code 1.
pub fn run_daemon(options: &BootstrapOptions) -> Result<CompletionStatus, LaunchError> {
    let plan = LaunchPlan {
        process: ProcessControl {
            mode: LaunchMode::from_options(options),
            daemonizer: SystemDaemonizer::new(),
            router: SystemSignalRouter::new(),
        },
        services: ServiceDeps {
            processor: PlaceholderEngine::new(),
            reloader: PlaceholderReloader,
            hooks: LoggingHooks,
        },
    };
    run_daemon_with(options, plan)
}

/// Runs the daemon with injected collaborators.
pub(crate) fn run_daemon_with<D, R, P, C, H>(
    options: &BootstrapOptions,
    plan: LaunchPlan<D, R, P, C, H>,
) -> Result<CompletionStatus, LaunchError>
where
    D: Daemonizer,
    R: SignalRouter,
    P: Processor,
    C: ConfigReloader,
    H: LifecycleHooks,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        router,
    } = process;
    let ServiceDeps {
        mut processor,
        mut reloader,
        hooks,
    } = services;

    info!(target: PROCESS_TARGET, ?mode, "starting daemon runtime");
    let mut controller = LifecycleController::new();

    let mut notifier = match mode {
        LaunchMode::Background => {
            controller.note_daemonizing();
            let stdio = DaemonStdio::from_destination(
                &options.effective_log_destination(),
                options.debug_level(),
            );
            // Returns only in the detached process; the original blocks on
            // the handshake and exits on its own.
            daemonizer.daemonize(stdio)?
        }
        LaunchMode::Foreground => StartupNotifier::attached(),
    };

    // Ground truth identity: captured after the last fork, before any
    // handler can fire.
    let identity = getpid();
    let signals = Arc::new(SignalState::new(identity));

    let context = EngineContext {
        signals: Arc::clone(&signals),
        spawn_workers: options.spawns_workers(),
        listen: options.listen_endpoint(),
    };
    processor.initialize(&context)?;

    let policy = if options.graceful_interrupt() {
        InterruptPolicy::Graceful
    } else {
        InterruptPolicy::FastExit
    };
    router.install(&signals, policy)?;

    let mut pid_file = PidFile::new(options.pid_file_path());
    if matches!(mode, LaunchMode::Background) || options.force_write_pid {
        pid_file.write(identity)?;
    }

    if let Err(error) = hooks.starting() {
        warn!(target: PROCESS_TARGET, %error, "starting notification failed");
    }

    // Everything is up; let the waiting parent exit 0.
    notifier.notify_success();

    let status = controller.run(&signals, &mut processor, &mut reloader);

    let status = run_shutdown(
        ShutdownPlan {
            router: &router,
            supervisor: identity,
            broadcast_workers: options.spawns_workers(),
            pid_file: &mut pid_file,
            memory_report: options.memory_report,
        },
        &mut processor,
        &hooks,
        status,
    );

    controller.finish();
    info!(target: PROCESS_TARGET, ?status, "shutdown sequence completed");
    Ok(status)
}
