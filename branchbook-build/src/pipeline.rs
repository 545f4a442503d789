//! Per-branch build pipeline shared by the reconciler and tests.

use std::path::Path;

use branchbook_core::{BranchHead, BranchName};

use crate::builder::{BuildOutcome, SiteBuilder};
use crate::gate::{self, Gate};

/// What happened to one branch in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchStatus {
    /// Marker matched the head; nothing ran.
    UpToDate,
    Built,
    /// No Storybook configuration in this branch.
    NoConfiguration,
    /// Build abandoned; the marker was left untouched so the next cycle
    /// retries.
    Failed,
}

/// Processes one checked-out branch. Implementations never fail outward:
/// every error is logged and folded into [`BranchStatus::Failed`].
pub trait BranchPipeline: Send + Sync {
    fn process(&self, checkout: &Path, branch: &BranchHead, branches: &[BranchName]) -> BranchStatus;
}

/// Gate + [`SiteBuilder`].
pub struct Pipeline {
    builder: SiteBuilder,
}

impl Pipeline {
    pub fn new(builder: SiteBuilder) -> Self {
        Self { builder }
    }
}

impl BranchPipeline for Pipeline {
    fn process(&self, checkout: &Path, branch: &BranchHead, branches: &[BranchName]) -> BranchStatus {
        if gate::check(self.builder.layout(), &branch.name, &branch.head) == Gate::UpToDate {
            tracing::debug!("{}: up to date at {}", branch.name, branch.head);
            return BranchStatus::UpToDate;
        }

        match self.builder.build(checkout, branch, branches) {
            Ok(BuildOutcome::Built { .. }) => BranchStatus::Built,
            Ok(BuildOutcome::NoConfiguration) => {
                tracing::info!("{}: no storybook configuration, skipping", branch.name);
                BranchStatus::NoConfiguration
            }
            Err(err) => {
                tracing::error!("{}: build failed at {}: {err}", branch.name, branch.head);
                BranchStatus::Failed
            }
        }
    }
}
