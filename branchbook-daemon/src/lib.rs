//! # branchbook-daemon
//!
//! The long-running side of branchbook: a git working tree walked branch by
//! branch ([`git`]), the poll/reconcile cycle ([`reconciler`]), the static
//! HTTP server ([`server`]), and the tokio runtime that ties them together.

mod error;
pub mod git;
pub mod reconciler;
mod runtime;
pub mod server;

pub use error::DaemonError;
pub use git::{BranchSource, GitRepository};
pub use reconciler::{CycleReport, Phase, Reconciler};
pub use runtime::{init_tracing, run, start_blocking};
