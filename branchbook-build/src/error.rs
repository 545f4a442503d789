//! Error types for branchbook-build.

use std::path::PathBuf;

use thiserror::Error;

use branchbook_core::CoreError;
use branchbook_detector::DetectError;
use branchbook_nav::NavError;

/// All errors that can abandon a branch build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Layout, marker, or filesystem helper failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("project detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("navigation injection failed: {0}")]
    Nav(#[from] NavError),

    /// An external step (install, hook, build) failed to start or exited
    /// unsuccessfully.
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("no Storybook binary under {project}/node_modules/.bin after install")]
    MissingBuildTool { project: PathBuf },

    #[error("build finished but produced no index.html in {path}")]
    MissingOutput { path: PathBuf },

    #[error("copy failed: {0}")]
    Walk(#[from] walkdir::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
