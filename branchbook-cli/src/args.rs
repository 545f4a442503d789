//! Command-line and environment configuration.
//!
//! Every option can also come from an environment variable; an explicit flag
//! wins over the environment, which wins over the default.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use branchbook_core::settings::{
    DEFAULT_FILTER, DEFAULT_LOG_LEVEL, DEFAULT_OUTPUT, DEFAULT_PORT, DEFAULT_PROJECT_DIR,
    DEFAULT_SLEEP_SECS,
};
use branchbook_core::{BranchFilter, BranchName, CoreError, Settings};

#[derive(Parser, Debug)]
#[command(
    name = "branchbook",
    version,
    about = "Build and serve a Storybook for every branch of a git repository",
    long_about = None,
)]
pub struct Cli {
    /// Git URL of the repository to watch.
    #[arg(env = "REPOSITORY")]
    pub repository: String,

    /// Output root holding the clone, the staging area, and the served site.
    #[arg(env = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// HTTP port.
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Regex a branch name must match in full to be built.
    #[arg(short, long, env = "BRANCHES", default_value = DEFAULT_FILTER)]
    pub branches: String,

    /// Branch the site root redirects to. Detected from the remote when unset.
    #[arg(long = "default", env = "DEFAULT")]
    pub default_branch: Option<String>,

    /// Storybook project directory, relative to the repository root.
    #[arg(long, env = "DIR", default_value = DEFAULT_PROJECT_DIR)]
    pub dir: PathBuf,

    /// Seconds to sleep between cycles.
    #[arg(
        short,
        long,
        env = "SLEEP",
        default_value_t = DEFAULT_SLEEP_SECS,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub sleep: u64,

    /// Log level or filter directives; RUST_LOG takes precedence.
    #[arg(long, env = "LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Cli {
    pub fn into_settings(self) -> Result<Settings, CoreError> {
        let mut settings = Settings::new(self.repository, self.output);
        settings.port = self.port;
        settings.branch_filter = BranchFilter::new(&self.branches)?;
        settings.default_branch = self
            .default_branch
            .filter(|name| !name.trim().is_empty())
            .map(BranchName::from);
        settings.project_dir = self.dir;
        settings.sleep = Duration::from_secs(self.sleep);
        settings.log_level = self.log_level;
        settings.validate()?;
        Ok(settings)
    }
}
