//! Site builder: runs one Storybook build and publishes it.
//!
//! ## `SiteBuilder::build`: publish protocol
//!
//! 1. Detect the project setup (no `.storybook/` → `NoConfiguration`).
//! 2. Install dependencies.
//! 3. Run the pre-build hook, if declared.
//! 4. Build into `<output>/staging/<branch>` with explicit `-c` / `-o`.
//! 5. Relocate `storybook-static/` if the tool ignored `-o`.
//! 6. Inject navigation into the staged entry page.
//! 7. Swap the staged tree into `<output>/storybooks/<branch>`.
//! 8. Stamp the head marker (last, so a crash never leaves a false marker).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use branchbook_core::{
    files::{remove_dir_except, remove_dir_if_exists},
    layout::ENTRY_PAGE, BranchHead, BranchName, OutputLayout,
    ToolCommand, ToolRunner,
};
use branchbook_detector::{detect_setup, locate_build_tool, DEFAULT_STATIC_DIR};
use branchbook_nav::NavInjector;

use crate::error::{io_err, BuildError};
use crate::gate;

// ---------------------------------------------------------------------------
// Build outcome
// ---------------------------------------------------------------------------

/// Outcome of a build attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Published to `path` and stamped.
    Built { path: PathBuf },
    /// The checkout has no Storybook configuration; nothing to build.
    NoConfiguration,
}

// ---------------------------------------------------------------------------
// SiteBuilder
// ---------------------------------------------------------------------------

/// Runs the package manager and Storybook against the shared checkout.
pub struct SiteBuilder {
    runner: Arc<dyn ToolRunner>,
    injector: Arc<NavInjector>,
    project_dir: PathBuf,
}

impl SiteBuilder {
    /// `project_dir` is relative to each checkout root.
    pub fn new(
        runner: Arc<dyn ToolRunner>,
        injector: Arc<NavInjector>,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            injector,
            project_dir: project_dir.into(),
        }
    }

    pub fn layout(&self) -> &OutputLayout {
        self.injector.layout()
    }

    /// Build `branch` from `checkout` and publish it.
    ///
    /// `branches` is the branch list embedded into the new entry page.
    pub fn build(
        &self,
        checkout: &Path,
        branch: &BranchHead,
        branches: &[BranchName],
    ) -> Result<BuildOutcome, BuildError> {
        let layout = self.layout();
        let project = checkout.join(&self.project_dir);

        let Some(setup) = detect_setup(&project)? else {
            return Ok(BuildOutcome::NoConfiguration);
        };

        tracing::info!("{}: installing dependencies with {}", branch.name, setup.package_manager);
        self.step("install", &setup.package_manager.install_command(&project))?;

        if let Some(script) = &setup.prebuild_script {
            tracing::info!("{}: running {script}", branch.name);
            self.step(
                "pre-build hook",
                &setup.package_manager.run_script_command(&project, script),
            )?;
        }

        let tool = locate_build_tool(&project).ok_or_else(|| BuildError::MissingBuildTool {
            project: project.clone(),
        })?;

        let staging = layout.staging_dir(&branch.name)?;
        remove_dir_if_exists(&staging)?;
        remove_dir_if_exists(&project.join(DEFAULT_STATIC_DIR))?;
        if let Some(parent) = staging.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        tracing::info!("{}: building storybook at {}", branch.name, branch.head);
        self.step("build", &tool.build_command(&setup, &staging))?;

        relocate_output(&project, &staging)?;

        self.injector
            .inject(&staging.join(ENTRY_PAGE), &branch.name, branches)?;

        let target = layout.branch_dir(&branch.name)?;
        let live: Vec<PathBuf> = branches
            .iter()
            .filter_map(|name| layout.branch_dir(name).ok())
            .collect();
        publish(&staging, &target, &live)?;

        gate::stamp(layout, &branch.name, &branch.head)?;

        tracing::info!("{}: published {}", branch.name, target.display());
        Ok(BuildOutcome::Built { path: target })
    }

    fn step(&self, step: &'static str, command: &ToolCommand) -> Result<(), BuildError> {
        tracing::debug!("running: {command}");
        self.runner
            .run_checked(command)
            .map(|_| ())
            .map_err(|source| BuildError::Step { step, source })
    }
}

// ---------------------------------------------------------------------------
// Output handling
// ---------------------------------------------------------------------------

/// Make sure the build output ended up in `staging`.
///
/// Some Storybook versions ignore `-o` and write `storybook-static/` next to
/// the config instead; move that tree into place.
fn relocate_output(project: &Path, staging: &Path) -> Result<(), BuildError> {
    if staging.join(ENTRY_PAGE).is_file() {
        return Ok(());
    }
    let fallback = project.join(DEFAULT_STATIC_DIR);
    if !fallback.join(ENTRY_PAGE).is_file() {
        return Err(BuildError::MissingOutput {
            path: staging.to_path_buf(),
        });
    }
    tracing::warn!(
        "build tool ignored the output directory; relocating {}",
        fallback.display()
    );
    remove_dir_if_exists(staging)?;
    move_dir(&fallback, staging)
}

/// Replace `target` with `staging`.
///
/// Directories of live branches nested under `target` are kept; the new
/// tree is then moved in entry by entry around them.
fn publish(staging: &Path, target: &Path, live: &[PathBuf]) -> Result<(), BuildError> {
    remove_dir_except(target, live)?;
    if !target.exists() {
        return move_dir(staging, target);
    }
    let entries = std::fs::read_dir(staging).map_err(|e| io_err(staging, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(staging, e))?;
        let dest = target.join(entry.file_name());
        if dest.exists() {
            tracing::warn!(
                "{} belongs to another branch; not overwriting it",
                dest.display()
            );
            continue;
        }
        move_dir(&entry.path(), &dest)?;
    }
    remove_dir_if_exists(staging)?;
    Ok(())
}

/// Rename `from` to `to`, copying when a rename is not possible (for
/// example across filesystems).
fn move_dir(from: &Path, to: &Path) -> Result<(), BuildError> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    if !from.is_dir() {
        std::fs::copy(from, to).map_err(|e| io_err(to, e))?;
        return std::fs::remove_file(from).map_err(|e| io_err(from, e));
    }
    copy_tree(from, to)?;
    remove_dir_if_exists(from)?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), BuildError> {
    for entry in walkdir::WalkDir::new(from) {
        let entry = entry?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| io_err(&dest, e))?;
        } else {
            std::fs::copy(entry.path(), &dest).map_err(|e| io_err(&dest, e))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
