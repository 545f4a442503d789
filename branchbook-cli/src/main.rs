//! branchbook: build and serve a Storybook per git branch.
//!
//! # Usage
//!
//! ```text
//! branchbook <REPOSITORY> [OUTPUT] [-p PORT] [-b REGEX] [--default BRANCH]
//!            [--dir PATH] [-s SECONDS] [--log-level LEVEL]
//! ```
//!
//! Runs until interrupted. Startup problems (bad regex, unbindable port,
//! failed clone) exit with status 1.

mod args;

use anyhow::{Context, Result};
use clap::Parser;

use args::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.into_settings().context("invalid configuration")?;
    branchbook_daemon::start_blocking(settings).context("branchbook exited with error")?;
    Ok(())
}
