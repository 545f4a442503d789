//! Validated runtime settings.
//!
//! The CLI fills these from flags and environment variables; every other crate
//! only ever sees the validated form.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;

use crate::error::CoreError;
use crate::types::BranchName;

pub const DEFAULT_PORT: u16 = 9001;
pub const DEFAULT_FILTER: &str = ".+";
pub const DEFAULT_PROJECT_DIR: &str = ".";
pub const DEFAULT_SLEEP_SECS: u64 = 60;
pub const DEFAULT_OUTPUT: &str = "dist";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Used when neither an override nor the remote's `HEAD` names a default.
pub const FALLBACK_DEFAULT_BRANCH: &str = "master";

/// Branch name filter. The pattern must match the whole name.
#[derive(Clone)]
pub struct BranchFilter {
    pattern: String,
    regex: Regex,
}

impl BranchFilter {
    pub fn new(pattern: &str) -> Result<Self, CoreError> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            CoreError::InvalidFilter {
                pattern: pattern.to_string(),
                source,
            }
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

impl fmt::Debug for BranchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BranchFilter").field(&self.pattern).finish()
    }
}

impl Default for BranchFilter {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_FILTER.to_string(),
            regex: Regex::new("^(?:.+)$").expect("static regex"),
        }
    }
}

/// Everything the daemon needs to run.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Git remote URL.
    pub repository: String,
    /// Output root; see [`crate::layout::OutputLayout`].
    pub output: PathBuf,
    pub port: u16,
    pub branch_filter: BranchFilter,
    /// Explicit default branch; `None` means ask the remote.
    pub default_branch: Option<BranchName>,
    /// Project root inside the checkout, relative to the checkout root.
    pub project_dir: PathBuf,
    pub sleep: Duration,
    pub log_level: String,
}

impl Settings {
    /// Settings with every optional value at its default.
    pub fn new(repository: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            output: output.into(),
            port: DEFAULT_PORT,
            branch_filter: BranchFilter::default(),
            default_branch: None,
            project_dir: PathBuf::from(DEFAULT_PROJECT_DIR),
            sleep: Duration::from_secs(DEFAULT_SLEEP_SECS),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Checks invariants the type system does not carry.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.repository.trim().is_empty() {
            return Err(CoreError::InvalidSettings(
                "repository URL must not be empty".to_string(),
            ));
        }
        if self.sleep.is_zero() {
            return Err(CoreError::InvalidSettings(
                "sleep interval must be at least one second".to_string(),
            ));
        }
        if self.project_dir.is_absolute()
            || self
                .project_dir
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(CoreError::InvalidSettings(format!(
                "project dir '{}' must stay inside the checkout",
                self.project_dir.display()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
