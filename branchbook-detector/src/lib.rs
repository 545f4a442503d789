//! Storybook project detection for `branchbook-detector`.
//!
//! `detect_setup(path)` inspects a project root and reports what the site
//! builder needs: where the Storybook config lives, which package manager
//! installs dependencies, and whether a pre-build hook is declared. After
//! dependencies are installed, `locate_build_tool(path)` finds the Storybook
//! binary to invoke.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use branchbook_core::ToolCommand;

/// Storybook configuration directory, relative to the project root.
pub const CONFIG_DIR: &str = ".storybook";

/// `package.json` script run before the build when present.
pub const PREBUILD_SCRIPT: &str = "prebuild-storybook";

/// Where Storybook writes when it ignores `-o`.
pub const DEFAULT_STATIC_DIR: &str = "storybook-static";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Package manager that installs the project's dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Yarn,
    Pnpm,
    Npm,
}

impl PackageManager {
    pub fn program(self) -> &'static str {
        match self {
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Npm => "npm",
        }
    }

    /// `<pm> install` in `project`.
    pub fn install_command(self, project: &Path) -> ToolCommand {
        ToolCommand::new(self.program(), project).arg("install")
    }

    /// `<pm> run <script>` in `project`.
    pub fn run_script_command(self, project: &Path, script: &str) -> ToolCommand {
        ToolCommand::new(self.program(), project).args(["run", script])
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Everything needed to build a Storybook project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSetup {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub package_manager: PackageManager,
    /// Name of the pre-build script, when `package.json` declares one.
    pub prebuild_script: Option<String>,
}

/// Installed Storybook binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildTool {
    /// Storybook 6 and earlier: `build-storybook -c <config> -o <out>`.
    Legacy(PathBuf),
    /// Storybook 7+: `storybook build -c <config> -o <out>`.
    Cli(PathBuf),
}

impl BuildTool {
    /// Full build invocation with explicit config and output directories.
    pub fn build_command(&self, setup: &ProjectSetup, output: &Path) -> ToolCommand {
        let base = match self {
            BuildTool::Legacy(bin) => ToolCommand::new(bin.display().to_string(), &setup.root),
            BuildTool::Cli(bin) => {
                ToolCommand::new(bin.display().to_string(), &setup.root).arg("build")
            }
        };
        base.args([
            "-c".to_string(),
            setup.config_dir.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ])
    }
}

/// Errors from project detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("'{path}' has a Storybook config but no package.json")]
    MissingManifest { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Detect the Storybook setup of the project at `path`.
///
/// Returns `Ok(None)` when there is no Storybook configuration; that is a
/// skip, not a failure.
pub fn detect_setup(path: &Path) -> Result<Option<ProjectSetup>, DetectError> {
    let config_dir = path.join(CONFIG_DIR);
    if !config_dir.is_dir() { return Ok(None); }

    let manifest_path = path.join("package.json");
    if !manifest_path.is_file() {
        return Err(DetectError::MissingManifest { path: path.to_path_buf() });
    }
    let content = fs::read_to_string(&manifest_path).map_err(|source| DetectError::Io {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest: PackageManifest = serde_json::from_str(&content).map_err(|e| {
        DetectError::ParseError { path: manifest_path.clone(), message: e.to_string() }
    })?;

    let prebuild_script = manifest
        .scripts
        .contains_key(PREBUILD_SCRIPT)
        .then(|| PREBUILD_SCRIPT.to_string());

    Ok(Some(ProjectSetup {
        root: path.to_path_buf(),
        config_dir,
        package_manager: detect_package_manager(path, &manifest),
        prebuild_script,
    }))
}

/// Find the installed Storybook binary under `node_modules/.bin`.
///
/// The legacy `build-storybook` binary wins when both are present, since
/// projects that still ship it expect its argument style.
pub fn locate_build_tool(path: &Path) -> Option<BuildTool> {
    let bin = path.join("node_modules").join(".bin");
    let legacy = bin.join("build-storybook");
    if legacy.is_file() { return Some(BuildTool::Legacy(legacy)); }
    let cli = bin.join("storybook");
    if cli.is_file() { return Some(BuildTool::Cli(cli)); }
    None
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct PackageManifest {
    #[serde(default, rename = "packageManager")]
    package_manager: Option<String>,
    #[serde(default)]
    scripts: serde_json::Map<String, serde_json::Value>,
}

/// Priority: the `packageManager` field, then lockfiles, then npm.
fn detect_package_manager(path: &Path, manifest: &PackageManifest) -> PackageManager {
    if let Some(declared) = manifest.package_manager.as_deref() {
        let name = declared.split('@').next().unwrap_or_default();
        match name {
            "yarn" => return PackageManager::Yarn,
            "pnpm" => return PackageManager::Pnpm,
            "npm" => return PackageManager::Npm,
            _ => {}
        }
    }
    if path.join("yarn.lock").exists() { return PackageManager::Yarn; }
    if path.join("pnpm-lock.yaml").exists() { return PackageManager::Pnpm; }
    PackageManager::Npm
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
