//! Tests for launch sequencing with injected collaborators.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clap::Parser;
use nix::unistd::Pid;
use tempfile::TempDir;

use corvus_config::BootstrapOptions;

use crate::engine::{
    ConfigReloader, EngineContext, EngineError, HookError, LifecycleHooks, ProcessVerdict,
    Processor, ReloadError,
};
use super::daemonizer::{DaemonStdio, DaemonizeError, Daemonizer, StartupNotifier};
use super::launch::{LaunchMode, LaunchPlan, ProcessControl, ServiceDeps, run_daemon_with};
use super::lifecycle::CompletionStatus;
use super::signals::{InterruptPolicy, SignalError, SignalRouter, SignalState};

/// Daemoniser double: counts invocations, never forks.
struct FakeDaemonizer {
    calls: Arc<AtomicUsize>,
}

impl Daemonizer for FakeDaemonizer {
    fn daemonize(&self, _stdio: DaemonStdio) -> Result<StartupNotifier, DaemonizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(StartupNotifier::attached())
    }
}

/// Router double capturing the installed interrupt policy.
struct FakeRouter {
    policy: Arc<Mutex<Option<InterruptPolicy>>>,
}

impl SignalRouter for FakeRouter {
    fn install(
        &self,
        _state: &Arc<SignalState>,
        policy: InterruptPolicy,
    ) -> Result<(), SignalError> {
        *self.policy.lock().expect("policy slot should not be poisoned") = Some(policy);
        Ok(())
    }

    fn disarm_terminate(&self) -> Result<(), SignalError> {
        Ok(())
    }

    fn broadcast_terminate(&self, _supervisor: Pid) -> Result<(), SignalError> {
        Ok(())
    }
}

/// Engine double completing (or failing) on the first cycle.
struct OneShotEngine {
    fail: bool,
}

impl Processor for OneShotEngine {
    fn initialize(&mut self, _context: &EngineContext) -> Result<(), EngineError> {
        Ok(())
    }

    fn process(&mut self) -> Result<ProcessVerdict, EngineError> {
        if self.fail {
            return Err(EngineError::Process("scripted failure".to_owned()));
        }
        Ok(ProcessVerdict::Completed)
    }

    fn release(&mut self) {}
}

struct NoopReloader;

impl ConfigReloader for NoopReloader {
    fn reload(&mut self) -> Result<(), ReloadError> {
        Ok(())
    }
}

/// Hooks double that snapshots whether the pid file existed when the
/// starting notification fired (that is, before the success byte).
struct PidObservingHooks {
    pid_path: PathBuf,
    seen_at_start: Arc<Mutex<Option<bool>>>,
}

impl LifecycleHooks for PidObservingHooks {
    fn starting(&self) -> Result<(), HookError> {
        *self
            .seen_at_start
            .lock()
            .expect("snapshot slot should not be poisoned") = Some(self.pid_path.exists());
        Ok(())
    }

    fn stopping(&self) -> Result<(), HookError> {
        Ok(())
    }
}

fn options(extra: &[&str], pid_path: &Path) -> BootstrapOptions {
    let pid = pid_path.to_string_lossy().into_owned();
    let mut args = vec!["corvusd", "-l", "null", "--pid-file", pid.as_str()];
    args.extend_from_slice(extra);
    BootstrapOptions::try_parse_from(args).expect("arguments should parse")
}

/// Observation handles shared with the injected doubles.
struct Observations {
    daemonize_calls: Arc<AtomicUsize>,
    policy: Arc<Mutex<Option<InterruptPolicy>>>,
    pid_seen_at_start: Arc<Mutex<Option<bool>>>,
}

impl Observations {
    fn new() -> Self {
        Self {
            daemonize_calls: Arc::default(),
            policy: Arc::default(),
            pid_seen_at_start: Arc::default(),
        }
    }
}

fn run(
    mode: LaunchMode,
    extra: &[&str],
    pid_path: &Path,
    fail: bool,
    observations: &Observations,
) -> CompletionStatus {
    let opts = options(extra, pid_path);
    let plan = LaunchPlan {
        process: ProcessControl {
            mode,
            daemonizer: FakeDaemonizer {
                calls: Arc::clone(&observations.daemonize_calls),
            },
            router: FakeRouter {
                policy: Arc::clone(&observations.policy),
            },
        },
        services: ServiceDeps {
            processor: OneShotEngine { fail },
            reloader: NoopReloader,
            hooks: PidObservingHooks {
                pid_path: pid_path.to_path_buf(),
                seen_at_start: Arc::clone(&observations.pid_seen_at_start),
            },
        },
    };
    run_daemon_with(&opts, plan).expect("launch should succeed")
}

#[test]
fn foreground_without_force_writes_no_pid_file() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let status = run(LaunchMode::Foreground, &["-f"], &pid_path, false, &observations);

    assert_eq!(status, CompletionStatus::Clean);
    assert!(!pid_path.exists(), "foreground mode must not write a pid file");
    assert_eq!(observations.daemonize_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        *observations
            .pid_seen_at_start
            .lock()
            .expect("snapshot slot should not be poisoned"),
        Some(false)
    );
}

#[test]
fn forced_pid_write_is_created_then_removed() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let status = run(
        LaunchMode::Foreground,
        &["-f", "-P"],
        &pid_path,
        false,
        &observations,
    );

    assert_eq!(status, CompletionStatus::Clean);
    assert_eq!(
        *observations
            .pid_seen_at_start
            .lock()
            .expect("snapshot slot should not be poisoned"),
        Some(true),
        "pid write must precede the starting hook"
    );
    assert!(
        !pid_path.exists(),
        "a forced pid file must be removed on clean shutdown"
    );
}

#[test]
fn background_mode_daemonises_and_writes_the_pid_file() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let status = run(LaunchMode::Background, &[], &pid_path, false, &observations);

    assert_eq!(status, CompletionStatus::Clean);
    assert_eq!(observations.daemonize_calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *observations
            .pid_seen_at_start
            .lock()
            .expect("snapshot slot should not be poisoned"),
        Some(true),
        "daemonised runs always write the pid file"
    );
    assert!(!pid_path.exists(), "pid file is removed again during shutdown");
}

#[test]
fn default_run_installs_the_fast_exit_policy() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let _ = run(LaunchMode::Foreground, &["-f"], &pid_path, false, &observations);

    assert_eq!(
        *observations
            .policy
            .lock()
            .expect("policy slot should not be poisoned"),
        Some(InterruptPolicy::FastExit),
        "without memory debugging an interrupt must kill the server outright"
    );
}

#[test]
fn memory_debugging_installs_the_graceful_interrupt_policy() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let _ = run(
        LaunchMode::Foreground,
        &["-f", "-m"],
        &pid_path,
        false,
        &observations,
    );

    assert_eq!(
        *observations
            .policy
            .lock()
            .expect("policy slot should not be poisoned"),
        Some(InterruptPolicy::Graceful)
    );
}

#[test]
fn processing_failure_still_cleans_up_and_reports_failure() {
    let dir = TempDir::new().expect("temp dir should be created");
    let pid_path = dir.path().join("corvusd.pid");
    let observations = Observations::new();

    let status = run(
        LaunchMode::Foreground,
        &["-f", "-P"],
        &pid_path,
        true,
        &observations,
    );

    assert_eq!(status, CompletionStatus::Failed);
    assert!(
        !pid_path.exists(),
        "the pid file is removed even when the loop fails"
    );
}
