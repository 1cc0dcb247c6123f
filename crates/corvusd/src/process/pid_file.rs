//! PID file ownership for the supervisor process.
//!
//! Correctness depends on post-fork identity: the file is written after the
//! last point at which the process may be duplicated, and removed only by
//! the process that actually wrote it.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::unistd::Pid;
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;

/// Writing the pid file failed; the process cannot continue.
#[derive(Debug, Error)]
#[error("failed to create pid file '{path}': {source}")]
pub struct PidFileError {
    /// Pid file path.
    pub path: PathBuf,
    /// Underlying IO error.
    #[source]
    pub source: io::Error,
}

/// The on-disk pid record and whether this process owns it.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    written: bool,
}

impl PidFile {
    /// Tracks the given path without touching the filesystem.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            written: false,
        }
    }

    /// Path of the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Whether this process wrote the record.
    #[must_use]
    pub fn is_written(&self) -> bool {
        self.written
    }

    /// Creates or truncates the file and writes the decimal pid followed by
    /// a newline, recording ownership.
    ///
    /// # Errors
    ///
    /// Returns a [`PidFileError`] when the file cannot be created or
    /// written; this is fatal for start-up.
    pub fn write(&mut self, identity: Pid) -> Result<(), PidFileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| PidFileError {
                path: self.path.clone(),
                source,
            })?;
        }
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|source| PidFileError {
            path: self.path.clone(),
            source,
        })?;
        writeln!(file, "{identity}").map_err(|source| PidFileError {
            path: self.path.clone(),
            source,
        })?;
        self.written = true;
        info!(
            target: PROCESS_TARGET,
            pid = identity.as_raw(),
            file = %self.path.display(),
            "pid file written"
        );
        Ok(())
    }

    /// Deletes the record if this process wrote it.
    ///
    /// Only called from the shutdown sequence. Absence is ignored; any
    /// other failure is a warning, never an abort.
    pub fn remove(&mut self) {
        if !self.written {
            return;
        }
        self.written = false;
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    "pid file removed"
                );
            }
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %self.path.display(),
                    %error,
                    "failed to remove pid file"
                );
            }
        }
    }
}
