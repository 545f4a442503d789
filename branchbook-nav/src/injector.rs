//! File-level navigation maintenance under the output layout.

use std::path::Path;

use branchbook_core::{
    files::{atomic_write, read_optional},
    BranchName, BranchSet, OutputLayout,
};

use crate::engine::NavRenderer;
use crate::error::NavError;
use crate::inject::PagePatterns;

/// Result of re-fixing one branch's entry page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefixOutcome {
    /// The list changed and the page was rewritten.
    Updated,
    /// The embedded list already matched.
    Unchanged,
    /// No entry page yet (never built), or no injected list in it.
    Skipped,
}

/// Counts from one re-fix pass over every live branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefixSummary {
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Keeps entry pages and the redirect page consistent with the branch set.
pub struct NavInjector {
    layout: OutputLayout,
    renderer: NavRenderer,
    patterns: PagePatterns,
}

impl NavInjector {
    pub fn new(layout: OutputLayout) -> Result<Self, NavError> {
        Ok(Self {
            layout,
            renderer: NavRenderer::new()?,
            patterns: PagePatterns::new()?,
        })
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// First injection into a freshly built entry page.
    ///
    /// `entry_page` is passed explicitly because the builder injects into the
    /// staged artifact before it is swapped into place. A missing page is an
    /// error here: a build that produced no entry page is not a success.
    pub fn inject(
        &self,
        entry_page: &Path,
        branch: &BranchName,
        branches: &[BranchName],
    ) -> Result<(), NavError> {
        let html = read_page(entry_page)?.ok_or_else(|| {
            NavError::Core(branchbook_core::error::io_err(
                entry_page,
                std::io::Error::new(std::io::ErrorKind::NotFound, "build produced no entry page"),
            ))
        })?;
        let snippet = self.renderer.snippet(branch, branches)?;
        let injected = self.patterns.inject_snippet(&html, &snippet);
        atomic_write(entry_page, injected.as_bytes())?;
        tracing::debug!(branch = %branch, path = %entry_page.display(), "injected navigation");
        Ok(())
    }

    /// Bring `branch`'s embedded branch list up to date with `branches`.
    pub fn refix(
        &self,
        branch: &BranchName,
        branches: &[BranchName],
    ) -> Result<RefixOutcome, NavError> {
        let path = self.layout.entry_page(branch)?;
        let Some(html) = read_page(&path)? else {
            return Ok(RefixOutcome::Skipped);
        };
        let Some(fixed) = self.patterns.refix_branch_list(&html, branches)? else {
            tracing::debug!(branch = %branch, path = %path.display(), "entry page has no branch list");
            return Ok(RefixOutcome::Skipped);
        };
        if fixed == html {
            return Ok(RefixOutcome::Unchanged);
        }
        atomic_write(&path, fixed.as_bytes())?;
        Ok(RefixOutcome::Updated)
    }

    /// Re-fix every branch in `current`. A failure on one page is logged and
    /// the pass continues with the rest.
    pub fn refix_all(&self, current: &BranchSet) -> RefixSummary {
        let mut summary = RefixSummary::default();
        for branch in current {
            match self.refix(branch, current.as_slice()) {
                Ok(RefixOutcome::Updated) => summary.updated += 1,
                Ok(RefixOutcome::Unchanged) => summary.unchanged += 1,
                Ok(RefixOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    summary.failed += 1;
                    tracing::warn!(branch = %branch, error = %err, "failed to update branch list");
                }
            }
        }
        summary
    }

    /// Rewrite the root redirect page to point at `default`.
    pub fn write_redirect(&self, default: &BranchName) -> Result<(), NavError> {
        let path = self.layout.redirect_page();
        let html = self.renderer.redirect_page(default)?;
        atomic_write(&path, html.as_bytes())?;
        tracing::info!(branch = %default, path = %path.display(), "default branch redirect written");
        Ok(())
    }

    /// Branch names embedded in `branch`'s entry page, if any.
    pub fn embedded_branches(&self, branch: &BranchName) -> Result<Option<Vec<String>>, NavError> {
        let path = self.layout.entry_page(branch)?;
        Ok(read_page(&path)?.and_then(|html| self.patterns.embedded_branches(&html)))
    }
}

/// Missing page or missing directory reads as `None`.
fn read_page(path: &Path) -> Result<Option<String>, NavError> {
    match read_optional(path) {
        Ok(page) => Ok(page),
        Err(branchbook_core::CoreError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::InvalidData =>
        {
            Err(NavError::NotUtf8 {
                path: path.to_path_buf(),
            })
        }
        Err(err) => Err(err.into()),
    }
}
