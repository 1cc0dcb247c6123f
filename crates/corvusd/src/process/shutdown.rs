//! Ordered teardown of the daemon process.

use nix::unistd::Pid;
use tracing::warn;

use crate::engine::{LifecycleHooks, Processor};

use super::PROCESS_TARGET;
use super::lifecycle::CompletionStatus;
use super::pid_file::PidFile;
use super::signals::SignalRouter;

/// Inputs the shutdown sequence needs beyond the engine itself.
pub(crate) struct ShutdownPlan<'a> {
    pub(crate) router: &'a dyn SignalRouter,
    pub(crate) supervisor: Pid,
    pub(crate) broadcast_workers: bool,
    pub(crate) pid_file: &'a mut PidFile,
    pub(crate) memory_report: bool,
}

/// Runs the ordered shutdown sequence, exactly once per process lifetime.
///
/// Past the stopping hook this is best-effort: every failure downgrades to
/// a warning so the remaining steps still run. Returns the status recorded
/// by the controller, unchanged, for use as the exit code.
pub(crate) fn run_shutdown(
    plan: ShutdownPlan<'_>,
    processor: &mut dyn Processor,
    hooks: &dyn LifecycleHooks,
    status: CompletionStatus,
) -> CompletionStatus {
    if let Err(error) = hooks.stopping() {
        warn!(target: PROCESS_TARGET, %error, "stopping notification failed");
    }

    // Ignore further terminate signals before the group broadcast below;
    // the broadcast reaches this process too.
    if let Err(error) = plan.router.disarm_terminate() {
        warn!(target: PROCESS_TARGET, %error, "failed to disarm the terminate signal");
    }

    if plan.broadcast_workers {
        if let Err(error) = plan.router.broadcast_terminate(plan.supervisor) {
            warn!(target: PROCESS_TARGET, %error, "worker broadcast failed");
        }
    }

    plan.pid_file.remove();

    processor.release();

    if plan.memory_report {
        report_memory();
    }

    status
}

#[cfg(target_os = "linux")]
fn report_memory() {
    use tracing::info;

    match std::fs::read_to_string("/proc/self/status") {
        Ok(status) => {
            for line in status
                .lines()
                .filter(|line| line.starts_with("VmRSS:") || line.starts_with("VmHWM:"))
            {
                let fields: Vec<&str> = line.split_whitespace().collect();
                info!(target: PROCESS_TARGET, "memory at shutdown: {}", fields.join(" "));
            }
        }
        Err(error) => {
            warn!(target: PROCESS_TARGET, %error, "memory report unavailable");
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn report_memory() {
    warn!(target: PROCESS_TARGET, "memory report unavailable on this platform");
}
