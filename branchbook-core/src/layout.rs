//! On-disk layout under the output root.
//!
//! ```text
//! <output>/repository/                    shared working tree
//! <output>/staging/<branch>/              build output before it is swapped in
//! <output>/storybooks/index.html          default-branch redirect
//! <output>/storybooks/<branch>/.head      last successfully built head id
//! <output>/storybooks/<branch>/index.html entry page with injected navigation
//! ```

use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;
use crate::types::BranchName;

pub const REPOSITORY_DIR: &str = "repository";
pub const STAGING_DIR: &str = "staging";
pub const SITE_DIR: &str = "storybooks";
pub const MARKER_FILE: &str = ".head";
pub const ENTRY_PAGE: &str = "index.html";

/// Resolves every path the daemon reads or writes from a single output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn repository_dir(&self) -> PathBuf {
        self.root.join(REPOSITORY_DIR)
    }

    /// Directory served over HTTP.
    pub fn site_dir(&self) -> PathBuf {
        self.root.join(SITE_DIR)
    }

    pub fn redirect_page(&self) -> PathBuf {
        self.site_dir().join(ENTRY_PAGE)
    }

    pub fn branch_dir(&self, branch: &BranchName) -> Result<PathBuf, CoreError> {
        Ok(self.site_dir().join(branch_relative_path(branch)?))
    }

    pub fn staging_dir(&self, branch: &BranchName) -> Result<PathBuf, CoreError> {
        Ok(self
            .root
            .join(STAGING_DIR)
            .join(branch_relative_path(branch)?))
    }

    pub fn marker_path(&self, branch: &BranchName) -> Result<PathBuf, CoreError> {
        Ok(self.branch_dir(branch)?.join(MARKER_FILE))
    }

    pub fn entry_page(&self, branch: &BranchName) -> Result<PathBuf, CoreError> {
        Ok(self.branch_dir(branch)?.join(ENTRY_PAGE))
    }
}

/// Maps a branch name onto a relative path, rejecting anything that would
/// land outside the site directory or on top of the redirect page.
///
/// Slashes in branch names (`feature/login`) become nested directories.
pub fn branch_relative_path(branch: &BranchName) -> Result<PathBuf, CoreError> {
    let name = branch.as_str();
    let invalid = |reason| CoreError::InvalidBranchName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("empty name"));
    }
    if name.contains('\0') || name.contains('\\') {
        return Err(invalid("contains a NUL byte or backslash"));
    }
    if name == ENTRY_PAGE {
        return Err(invalid("collides with the redirect page"));
    }

    let mut relative = PathBuf::new();
    for segment in name.split('/') {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        match Path::new(segment).components().next() {
            Some(Component::Normal(_)) => relative.push(segment),
            _ => return Err(invalid("path segment escapes the site directory")),
        }
    }
    Ok(relative)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
