//! Build gate: head-id idempotency tracking for built branches.
//!
//! Persists the head id of the last successful build at
//! `<output>/storybooks/<branch>/.head`. The marker is written with the same
//! atomic `.tmp` + rename pattern as every other file, and only ever as the
//! final step of a successful build.

use branchbook_core::{
    files::{atomic_write, read_optional},
    BranchName, HeadId, OutputLayout,
};

use crate::error::BuildError;

/// Decision for one branch in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    UpToDate,
    BuildRequired,
}

/// Read the stored head id for `branch`. `None` when never built.
pub fn read_marker(layout: &OutputLayout, branch: &BranchName) -> Result<Option<HeadId>, BuildError> {
    let path = layout.marker_path(branch)?;
    Ok(read_optional(&path)?
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .map(HeadId::from))
}

/// Compare the marker with `head`. Read failures count as "build required".
pub fn check(layout: &OutputLayout, branch: &BranchName, head: &HeadId) -> Gate {
    match read_marker(layout, branch) {
        Ok(Some(stored)) if &stored == head => Gate::UpToDate,
        Ok(_) => Gate::BuildRequired,
        Err(err) => {
            tracing::debug!("marker for {branch} unreadable, rebuilding: {err}");
            Gate::BuildRequired
        }
    }
}

/// Record `head` as the last successful build of `branch`.
pub fn stamp(layout: &OutputLayout, branch: &BranchName, head: &HeadId) -> Result<(), BuildError> {
    let path = layout.marker_path(branch)?;
    atomic_write(&path, head.as_str().as_bytes())?;
    Ok(())
}
