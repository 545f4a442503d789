use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon: repository handling, serving, and startup.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Core(#[from] branchbook_core::CoreError),

    #[error("navigation error: {0}")]
    Nav(#[from] branchbook_nav::NavError),

    #[error("git {op} failed: {source}")]
    Git {
        op: &'static str,
        #[source]
        source: branchbook_core::CoreError,
    },

    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server on {addr} failed: {source}")]
    Serve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{task} task join failure: {message}")]
    Join { task: &'static str, message: String },

    #[error("signal handler failed: {0}")]
    Signal(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn git_err(op: &'static str) -> impl FnOnce(branchbook_core::CoreError) -> DaemonError {
    move |source| DaemonError::Git { op, source }
}
