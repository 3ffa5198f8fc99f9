//! Shell error types.

use std::fmt;

/// Failures that stop the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// Configuration could not be loaded.
    Configuration { details: String },
    /// The backend transport could not be set up.
    Transport { details: String },
    /// Terminal input or output failed.
    Io { details: String },
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "configuration error: {}", details),
            Self::Transport { details } => write!(f, "transport setup failed: {}", details),
            Self::Io { details } => write!(f, "terminal I/O failed: {}", details),
        }
    }
}

impl std::error::Error for ShellError {}
