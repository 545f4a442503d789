//! Error types for branchbook-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by layout resolution, settings validation, and tool runs.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A branch name that cannot be mapped to a directory under the site root.
    #[error("branch name '{name}' cannot be used as an output directory: {reason}")]
    InvalidBranchName { name: String, reason: &'static str },

    /// The branch filter did not compile.
    #[error("invalid branch filter '{pattern}': {source}")]
    InvalidFilter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The program could not be started at all (usually: not installed).
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("'{command}' exited with {status}: {stderr}")]
    ToolFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Convenience constructor for [`CoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
