//! The poll / reconcile / sleep / fetch cycle.
//!
//! [`Reconciler`] is synchronous: the runtime drives it from a blocking task
//! and owns the sleep between cycles. All filesystem housekeeping failures
//! are logged and the cycle carries on; only [`Reconciler::initialize`] can
//! fail outward.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use walkdir::WalkDir;

use branchbook_build::{BranchPipeline, BranchStatus};
use branchbook_core::{
    files::remove_dir_except, layout::MARKER_FILE, settings::FALLBACK_DEFAULT_BRANCH,
    BranchName, BranchSet, OutputLayout,
};
use branchbook_nav::{NavInjector, RefixSummary};

use crate::error::DaemonError;
use crate::git::BranchSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Polling,
    Reconciling,
    Sleeping,
    Fetching,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Initializing => "initializing",
            Phase::Polling => "polling",
            Phase::Reconciling => "reconciling",
            Phase::Sleeping => "sleeping",
            Phase::Fetching => "fetching",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// What one poll + reconcile cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    /// Branches selected upstream this cycle.
    pub branches: usize,
    pub built: usize,
    pub up_to_date: usize,
    pub no_configuration: usize,
    pub failed: usize,
    pub removed: Vec<BranchName>,
    /// Set when the default branch disappeared and was replaced.
    pub new_default: Option<BranchName>,
    pub refix: RefixSummary,
    /// The remote listing failed; nothing was reconciled.
    pub listing_failed: bool,
}

impl CycleReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration: Duration::ZERO,
            branches: 0,
            built: 0,
            up_to_date: 0,
            no_configuration: 0,
            failed: 0,
            removed: Vec::new(),
            new_default: None,
            refix: RefixSummary::default(),
            listing_failed: false,
        }
    }

    fn record(&mut self, status: BranchStatus) {
        match status {
            BranchStatus::UpToDate => self.up_to_date += 1,
            BranchStatus::Built => self.built += 1,
            BranchStatus::NoConfiguration => self.no_configuration += 1,
            BranchStatus::Failed => self.failed += 1,
        }
    }

    fn log(&self) {
        tracing::info!(
            started_at = %self.started_at.to_rfc3339(),
            duration_ms = self.duration.as_millis() as u64,
            branches = self.branches,
            built = self.built,
            up_to_date = self.up_to_date,
            no_configuration = self.no_configuration,
            failed = self.failed,
            removed = self.removed.len(),
            refixed = self.refix.updated,
            "cycle complete"
        );
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    source: Box<dyn BranchSource>,
    pipeline: Arc<dyn BranchPipeline>,
    injector: Arc<NavInjector>,
    default_override: Option<BranchName>,
    default: BranchName,
    previous: BranchSet,
    phase: Phase,
}

impl Reconciler {
    pub fn new(
        source: Box<dyn BranchSource>,
        pipeline: Arc<dyn BranchPipeline>,
        injector: Arc<NavInjector>,
        default_override: Option<BranchName>,
    ) -> Self {
        Self {
            source,
            pipeline,
            injector,
            default_override,
            default: BranchName::from(FALLBACK_DEFAULT_BRANCH),
            previous: BranchSet::new(),
            phase: Phase::Initializing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn default_branch(&self) -> &BranchName {
        &self.default
    }

    /// Branches seen in the last successful cycle.
    pub fn previous(&self) -> &BranchSet {
        &self.previous
    }

    fn layout(&self) -> &OutputLayout {
        self.injector.layout()
    }

    fn transition(&mut self, next: Phase) {
        tracing::debug!(from = %self.phase, to = %next, "phase");
        self.phase = next;
    }

    /// Resolve the default branch, write the redirect page, and pick up
    /// artifacts already published by an earlier run so that branches deleted
    /// while the daemon was down still get cleaned up.
    pub fn initialize(&mut self) -> Result<(), DaemonError> {
        self.previous = match published_branches(self.layout()) {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "cannot scan published branches");
                BranchSet::new()
            }
        };

        let upstream = match self.source.remote_branches() {
            Ok(names) => Some(names),
            Err(err) => {
                tracing::warn!(error = %err, "cannot list remote branches during startup");
                None
            }
        };

        // Without a listing there is no evidence the override is missing.
        self.default = match self.default_override.clone() {
            Some(name) if upstream.as_ref().map_or(true, |names| names.contains(&name)) => name,
            Some(name) => {
                tracing::warn!(
                    branch = %name,
                    "configured default branch is not available upstream, detecting instead"
                );
                self.detect_default()
            }
            None => self.detect_default(),
        };

        self.injector.write_redirect(&self.default)?;
        tracing::info!(default = %self.default, "default branch resolved");
        Ok(())
    }

    fn detect_default(&mut self) -> BranchName {
        self.source
            .remote_default()
            .unwrap_or_else(|| BranchName::from(FALLBACK_DEFAULT_BRANCH))
    }

    /// Poll every branch through the pipeline, then reconcile the output
    /// against the branches found.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(Utc::now());

        self.transition(Phase::Polling);
        let pipeline = Arc::clone(&self.pipeline);
        let listed = self.source.enumerate(&mut |checkout, branch, branches| {
            let status = pipeline.process(checkout, branch, branches);
            report.record(status);
        });

        match listed {
            Ok(current) => {
                self.transition(Phase::Reconciling);
                report.branches = current.len();
                self.reconcile(current, &mut report);
            }
            Err(err) => {
                tracing::error!(error = %err, "cannot enumerate branches; keeping previous state");
                report.listing_failed = true;
            }
        }

        report.duration = started.elapsed();
        report.log();
        report
    }

    fn reconcile(&mut self, current: BranchSet, report: &mut CycleReport) {
        let live = live_dirs(self.layout(), &current);
        for branch in self.previous.removed_in(&current) {
            self.remove_branch(&branch, &live);
            report.removed.push(branch);
        }

        if !current.contains(&self.default) {
            if let Some(first) = current.first() {
                tracing::info!(old = %self.default, new = %first, "default branch gone, switching");
                self.default = first.clone();
                report.new_default = Some(first.clone());
                if let Err(err) = self.injector.write_redirect(&self.default) {
                    tracing::warn!(error = %err, "cannot rewrite redirect page");
                }
            }
        }

        report.refix = self.injector.refix_all(&current);
        self.previous = current;
    }

    /// Delete the artifact and staging tree of `branch`, leaving alone any
    /// nested directory that belongs to a live branch.
    fn remove_branch(&self, branch: &BranchName, live: &[PathBuf]) {
        let layout = self.layout();
        let site = layout.site_dir();
        for dir in [layout.branch_dir(branch), layout.staging_dir(branch)] {
            let dir = match dir {
                Ok(dir) => dir,
                Err(err) => {
                    tracing::warn!(branch = %branch, error = %err, "cannot locate artifact");
                    continue;
                }
            };
            match remove_dir_except(&dir, live) {
                Ok(true) => {
                    if dir.starts_with(&site) {
                        tracing::info!(branch = %branch, "removed artifact of deleted branch");
                        prune_empty_parents(&dir, &site);
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(branch = %branch, error = %err, "cannot remove artifact");
                }
            }
        }
    }

    pub fn begin_sleep(&mut self) {
        self.transition(Phase::Sleeping);
    }

    /// Fetch with prune. Failure is logged; the next poll works from the
    /// refs already present.
    pub fn fetch(&mut self) {
        self.transition(Phase::Fetching);
        if let Err(err) = self.source.fetch() {
            tracing::error!(error = %err, "fetch failed");
        }
    }
}

/// Branches that have a head marker under the site directory. Nested
/// directories map back to slash-separated names.
pub fn published_branches(layout: &OutputLayout) -> Result<BranchSet, walkdir::Error> {
    let site = layout.site_dir();
    let mut found = BranchSet::new();
    if !site.is_dir() {
        return Ok(found);
    }
    let mut names = Vec::new();
    for entry in WalkDir::new(&site).min_depth(2) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == MARKER_FILE {
            let Some(dir) = entry.path().parent() else { continue };
            let Ok(relative) = dir.strip_prefix(&site) else { continue };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            names.push(BranchName::from(name));
        }
    }
    names.sort();
    for name in names {
        found.push(name);
    }
    Ok(found)
}

/// Artifact and staging directories of every branch in `current`.
fn live_dirs(layout: &OutputLayout, current: &BranchSet) -> Vec<PathBuf> {
    current
        .iter()
        .flat_map(|branch| [layout.branch_dir(branch), layout.staging_dir(branch)])
        .filter_map(Result::ok)
        .collect()
}

/// Remove now-empty directories left behind by nested branch names, up to
/// but not including `stop`.
fn prune_empty_parents(dir: &Path, stop: &Path) {
    let mut current = dir.parent();
    while let Some(parent) = current {
        if parent == stop || !parent.starts_with(stop) {
            break;
        }
        if std::fs::remove_dir(parent).is_err() {
            break;
        }
        current = parent.parent();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
