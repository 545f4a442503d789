//! Branch enumeration over a single git working tree.
//!
//! Every git invocation goes through [`ToolRunner`], so tests can script the
//! repository instead of shelling out. The working tree is owned by
//! [`GitRepository`] and borrowed mutably per checkout: one branch is on disk
//! at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use branchbook_core::{
    layout::branch_relative_path, BranchFilter, BranchHead, BranchName, BranchSet, HeadId,
    ToolCommand, ToolRunner,
};

use crate::error::{git_err, io_err, DaemonError};

pub const REMOTE: &str = "origin";

/// Per-branch callback: checkout path, the checked-out branch, and every
/// branch selected this cycle (for navigation).
pub type Visit<'a> = dyn FnMut(&Path, &BranchHead, &[BranchName]) + 'a;

/// Where branches come from. [`GitRepository`] is the real implementation.
pub trait BranchSource: Send {
    /// Remote branch names that pass the filter, in enumeration order.
    fn remote_branches(&mut self) -> Result<Vec<BranchName>, DaemonError>;

    /// The remote's own default branch, when it advertises one.
    fn remote_default(&mut self) -> Option<BranchName>;

    /// Check out each selected branch in turn and hand it to `visit`.
    ///
    /// Returns the branches that were visited. A branch that cannot be checked
    /// out is logged and left out, so downstream it looks deleted for this
    /// cycle. A failure to list branches at all is an error, so callers never
    /// mistake it for "every branch is gone".
    fn enumerate(&mut self, visit: &mut Visit<'_>) -> Result<BranchSet, DaemonError>;

    /// Update remote-tracking refs, pruning deleted branches.
    fn fetch(&mut self) -> Result<(), DaemonError>;
}

// ---------------------------------------------------------------------------
// Working tree
// ---------------------------------------------------------------------------

/// The single clone under `<output>/repository`.
#[derive(Debug)]
pub struct WorkTree {
    path: PathBuf,
}

impl WorkTree {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A branch checked out into the working tree. Holding one borrows the tree
/// exclusively until it is dropped.
#[derive(Debug)]
pub struct Checkout<'a> {
    tree: &'a mut WorkTree,
    branch: BranchHead,
}

impl Checkout<'_> {
    pub fn path(&self) -> &Path {
        self.tree.path()
    }

    pub fn branch(&self) -> &BranchHead {
        &self.branch
    }
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

pub struct GitRepository {
    runner: Arc<dyn ToolRunner>,
    tree: WorkTree,
    filter: BranchFilter,
}

impl GitRepository {
    /// Clone `url` into `path`, or reuse an existing clone there.
    ///
    /// An existing clone gets its origin URL updated and is fetched so the
    /// first enumeration sees current refs. Any failure here is fatal to
    /// startup.
    pub fn clone_or_open(
        runner: Arc<dyn ToolRunner>,
        url: &str,
        path: &Path,
        filter: BranchFilter,
    ) -> Result<Self, DaemonError> {
        let repo = Self {
            runner,
            tree: WorkTree {
                path: path.to_path_buf(),
            },
            filter,
        };

        if path.join(".git").exists() {
            tracing::info!(path = %path.display(), "reusing existing clone");
            repo.run(repo.git().args(["remote", "set-url", REMOTE, url]), "remote set-url")?;
            repo.run(repo.git().args(["fetch", "--prune", REMOTE]), "fetch")?;
            return Ok(repo);
        }

        // Leftovers from an interrupted clone would make `git clone` refuse.
        branchbook_core::files::remove_dir_if_exists(path)?;
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

        let target = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());

        tracing::info!(url, path = %path.display(), "cloning repository");
        let clone = ToolCommand::new("git", parent)
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(["clone", url, target.as_str()]);
        repo.run(clone, "clone")?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        self.tree.path()
    }

    /// Force the working tree onto `origin/<name>`: local changes are
    /// discarded and untracked files removed. Ignored files such as
    /// `node_modules` survive between branches.
    pub fn checkout(&mut self, name: &BranchName) -> Result<Checkout<'_>, DaemonError> {
        let upstream = format!("{REMOTE}/{name}");
        self.run(
            self.git()
                .args(["checkout", "--force", "-B", name.as_str(), upstream.as_str()]),
            "checkout",
        )?;
        self.run(self.git().args(["reset", "--hard", upstream.as_str()]), "reset")?;
        self.run(self.git().args(["clean", "-fd"]), "clean")?;
        let head = self
            .run(self.git().args(["rev-parse", "HEAD"]), "rev-parse")?
            .trim()
            .to_string();

        Ok(Checkout {
            branch: BranchHead {
                name: name.clone(),
                head: HeadId(head),
            },
            tree: &mut self.tree,
        })
    }

    fn git(&self) -> ToolCommand {
        ToolCommand::new("git", self.tree.path()).env("GIT_TERMINAL_PROMPT", "0")
    }

    fn run(&self, command: ToolCommand, op: &'static str) -> Result<String, DaemonError> {
        tracing::debug!(command = %command, "git");
        let output = self.runner.run_checked(&command).map_err(git_err(op))?;
        Ok(output.stdout)
    }
}

impl BranchSource for GitRepository {
    fn remote_branches(&mut self) -> Result<Vec<BranchName>, DaemonError> {
        let refs = format!("refs/remotes/{REMOTE}/");
        let stdout = self.run(
            self.git()
                .args(["for-each-ref", "--format=%(refname:lstrip=3)", refs.as_str()]),
            "for-each-ref",
        )?;
        Ok(parse_remote_branches(&stdout, &self.filter))
    }

    fn remote_default(&mut self) -> Option<BranchName> {
        let refname = format!("refs/remotes/{REMOTE}/HEAD");
        let result = self.run(
            self.git().args(["symbolic-ref", "--short", refname.as_str()]),
            "symbolic-ref",
        );
        match result {
            Ok(stdout) => parse_symbolic_ref(&stdout),
            Err(err) => {
                tracing::debug!(error = %err, "remote does not advertise a default branch");
                None
            }
        }
    }

    fn enumerate(&mut self, visit: &mut Visit<'_>) -> Result<BranchSet, DaemonError> {
        let names = self.remote_branches()?;
        let mut visited = BranchSet::new();
        for name in &names {
            let checkout = match self.checkout(name) {
                Ok(checkout) => checkout,
                Err(err) => {
                    tracing::warn!(branch = %name, error = %err, "checkout failed, skipping branch");
                    continue;
                }
            };
            visit(checkout.path(), checkout.branch(), &names);
            visited.push(name.clone());
        }
        Ok(visited)
    }

    fn fetch(&mut self) -> Result<(), DaemonError> {
        self.run(self.git().args(["fetch", "--prune", REMOTE]), "fetch")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

/// One branch name per line, `origin/` already stripped. The symbolic `HEAD`
/// ref, names rejected by the filter, and names that cannot be laid out on
/// disk are dropped.
pub fn parse_remote_branches(stdout: &str, filter: &BranchFilter) -> Vec<BranchName> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "HEAD")
        .filter(|line| filter.matches(line))
        .map(BranchName::from)
        .filter(|name| match branch_relative_path(name) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(branch = %name, error = %err, "ignoring branch");
                false
            }
        })
        .collect()
}

/// `origin/main` -> `main`.
pub fn parse_symbolic_ref(stdout: &str) -> Option<BranchName> {
    let name = stdout.trim();
    let name = name
        .strip_prefix(REMOTE)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(name);
    (!name.is_empty()).then(|| BranchName::from(name))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
