//! Placeholder engine used until a real processing engine is wired in.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::{
    ConfigReloader, EngineContext, EngineError, HookError, LifecycleHooks, ProcessVerdict,
    Processor, ReloadError,
};
use crate::process::{SignalRequest, SignalState};

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");
const IDLE_POLL: Duration = Duration::from_millis(25);

/// Engine stand-in that idles until a lifecycle request arrives.
///
/// A reload request surfaces as [`ProcessVerdict::ReloadRequested`]; a
/// terminate request as normal completion. This mirrors the contract a
/// real engine must honour.
#[derive(Debug, Default)]
pub struct PlaceholderEngine {
    signals: Option<Arc<SignalState>>,
}

impl PlaceholderEngine {
    /// Builds an uninitialised placeholder engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor for PlaceholderEngine {
    fn initialize(&mut self, context: &EngineContext) -> Result<(), EngineError> {
        if let Some(endpoint) = context.listen {
            info!(
                target: ENGINE_TARGET,
                address = %endpoint.address,
                port = endpoint.port,
                "listen restriction recorded"
            );
        }
        info!(
            target: ENGINE_TARGET,
            spawn_workers = context.spawn_workers,
            "placeholder engine initialised"
        );
        self.signals = Some(Arc::clone(&context.signals));
        Ok(())
    }

    fn process(&mut self) -> Result<ProcessVerdict, EngineError> {
        let signals = self
            .signals
            .as_ref()
            .ok_or_else(|| EngineError::Process("engine used before initialisation".to_owned()))?;
        loop {
            match signals.pending() {
                SignalRequest::None => thread::sleep(IDLE_POLL),
                SignalRequest::Reload => return Ok(ProcessVerdict::ReloadRequested),
                SignalRequest::Terminate => return Ok(ProcessVerdict::Completed),
            }
        }
    }

    fn release(&mut self) {
        debug!(target: ENGINE_TARGET, "placeholder engine released");
        self.signals = None;
    }
}

/// Reloader stand-in; a real engine re-reads its configuration here.
#[derive(Debug, Default)]
pub struct PlaceholderReloader;

impl ConfigReloader for PlaceholderReloader {
    fn reload(&mut self) -> Result<(), ReloadError> {
        info!(target: ENGINE_TARGET, "configuration reload requested; nothing to re-read");
        Ok(())
    }
}

/// Hooks that record lifecycle events in the log.
#[derive(Debug, Default)]
pub struct LoggingHooks;

impl LifecycleHooks for LoggingHooks {
    fn starting(&self) -> Result<(), HookError> {
        info!(target: ENGINE_TARGET, "server starting");
        Ok(())
    }

    fn stopping(&self) -> Result<(), HookError> {
        info!(target: ENGINE_TARGET, "server stopping");
        Ok(())
    }
}
