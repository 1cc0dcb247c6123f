use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;

/// Where supervisor and engine log output is written.
///
/// The `stdout` destination is shared between the explicit `-l stdout`
/// selection and the full-debug mode, which forces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogDestination {
    /// Standard error; the default while attached to a terminal.
    #[default]
    Stderr,
    /// Standard output.
    Stdout,
    /// Append to a log file.
    File(PathBuf),
    /// Discard all output.
    Null,
}

impl LogDestination {
    /// True when the destination needs the standard output streams to stay
    /// open after detaching.
    #[must_use]
    pub fn keeps_standard_streams(&self) -> bool {
        matches!(self, Self::Stdout | Self::Stderr)
    }
}

impl FromStr for LogDestination {
    type Err = Infallible;

    /// Recognises the keywords `stdout`, `stderr`, and `null`; anything
    /// else is treated as a file path.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(match value {
            "stdout" => Self::Stdout,
            "stderr" => Self::Stderr,
            "null" => Self::Null,
            path => Self::File(PathBuf::from(path)),
        })
    }
}
