use std::env;
use std::path::PathBuf;

use dirs::runtime_dir;

/// Default pid-file location for the named instance.
///
/// Prefers the user runtime directory; falls back to a per-uid directory
/// under the system temp directory when no runtime directory is available
/// (typical for system accounts).
#[must_use]
pub fn default_pid_path(name: &str) -> PathBuf {
    let mut dir = runtime_dir().unwrap_or_else(fallback_runtime_directory);
    dir.push("corvus");
    dir.push(format!("{name}.pid"));
    dir
}

#[cfg(unix)]
fn fallback_runtime_directory() -> PathBuf {
    let mut dir = env::temp_dir();
    // SAFETY: geteuid() is always safe to call.
    dir.push(format!("uid-{}", unsafe { libc::geteuid() }));
    dir
}

#[cfg(not(unix))]
fn fallback_runtime_directory() -> PathBuf {
    env::temp_dir()
}
