//! Error types for branchbook-nav.

use std::path::PathBuf;

use thiserror::Error;

use branchbook_core::CoreError;

/// Errors raised while rendering or rewriting navigation state.
#[derive(Debug, Error)]
pub enum NavError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Layout or atomic write failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The injected branch list pattern failed to compile.
    #[error("navigation pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// JSON encoding of an injected value.
    #[error("value encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("entry page {path} is not valid UTF-8")]
    NotUtf8 { path: PathBuf },
}
