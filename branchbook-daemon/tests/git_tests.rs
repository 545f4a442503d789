use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use branchbook_core::{
    BranchFilter, BranchHead, BranchName, CoreError, ToolCommand, ToolOutput, ToolRunner,
};
use branchbook_daemon::{BranchSource, GitRepository};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Scripted git
// ---------------------------------------------------------------------------

#[derive(Default)]
struct GitState {
    branches: Vec<(String, String)>,
    remote_head: Option<String>,
    broken_checkouts: HashSet<String>,
    listing_fails: bool,
    current: Option<String>,
    calls: Vec<ToolCommand>,
}

#[derive(Default)]
struct ScriptedGit {
    state: Mutex<GitState>,
}

impl ScriptedGit {
    fn with_branches(branches: &[(&str, &str)]) -> Self {
        let git = Self::default();
        git.state.lock().unwrap().branches = branches
            .iter()
            .map(|(n, h)| (n.to_string(), h.to_string()))
            .collect();
        git
    }

    fn calls(&self) -> Vec<ToolCommand> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl ToolRunner for ScriptedGit {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, CoreError> {
        assert_eq!(command.program, "git");
        let mut state = self.state.lock().unwrap();
        state.calls.push(command.clone());
        let args: Vec<&str> = command.args.iter().map(String::as_str).collect();
        let output = match args.as_slice() {
            ["for-each-ref", ..] if state.listing_fails => {
                ToolOutput::failed(128, "fatal: not a git repository")
            }
            ["for-each-ref", ..] => {
                let mut lines = vec!["HEAD".to_string()];
                lines.extend(state.branches.iter().map(|(n, _)| n.clone()));
                ToolOutput::ok(lines.join("\n") + "\n")
            }
            ["symbolic-ref", ..] => match &state.remote_head {
                Some(head) => ToolOutput::ok(format!("origin/{head}\n")),
                None => ToolOutput::failed(128, "fatal: ref refs/remotes/origin/HEAD is not a symbolic ref"),
            },
            ["checkout", "--force", "-B", name, _] => {
                if state.broken_checkouts.contains(*name) {
                    ToolOutput::failed(1, "error: invalid path")
                } else {
                    state.current = Some(name.to_string());
                    ToolOutput::ok("")
                }
            }
            ["rev-parse", "HEAD"] => {
                let current = state.current.clone().unwrap_or_default();
                let head = state
                    .branches
                    .iter()
                    .find(|(n, _)| *n == current)
                    .map(|(_, h)| h.clone())
                    .unwrap_or_default();
                ToolOutput::ok(format!("{head}\n"))
            }
            _ => ToolOutput::ok(""),
        };
        Ok(output)
    }
}

fn open(git: &Arc<ScriptedGit>, tmp: &TempDir, filter: &str) -> GitRepository {
    let path = tmp.path().join("dist").join("repository");
    std::fs::create_dir_all(path.join(".git")).unwrap();
    GitRepository::clone_or_open(
        git.clone(),
        "https://example.com/ui.git",
        &path,
        BranchFilter::new(filter).unwrap(),
    )
    .unwrap()
}

fn collect(repo: &mut GitRepository) -> (Vec<BranchHead>, Vec<Vec<BranchName>>, Vec<BranchName>) {
    let mut heads = Vec::new();
    let mut lists = Vec::new();
    let mut paths: Vec<PathBuf> = Vec::new();
    let set = repo
        .enumerate(&mut |path: &Path, branch: &BranchHead, branches: &[BranchName]| {
            paths.push(path.to_path_buf());
            heads.push(branch.clone());
            lists.push(branches.to_vec());
        })
        .unwrap();
    assert!(paths.iter().all(|p| p.ends_with("repository")));
    (heads, lists, set.as_slice().to_vec())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn enumerate_visits_only_branches_matching_the_filter() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[
        ("main", "m1"),
        ("storybook-a", "a1"),
        ("storybook-b", "b1"),
        ("feature/storybook", "f1"),
    ]));
    let mut repo = open(&git, &tmp, "storybook.+");

    let (heads, lists, set) = collect(&mut repo);

    let expected = vec![BranchName::from("storybook-a"), BranchName::from("storybook-b")];
    assert_eq!(set, expected);
    assert_eq!(
        heads,
        vec![
            BranchHead { name: "storybook-a".into(), head: "a1".into() },
            BranchHead { name: "storybook-b".into(), head: "b1".into() },
        ]
    );
    assert!(lists.iter().all(|l| *l == expected));
}

#[test]
fn checkout_failure_drops_the_branch_for_the_cycle() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[
        ("main", "m1"),
        ("weird", "w1"),
        ("dev", "d1"),
    ]));
    git.state.lock().unwrap().broken_checkouts.insert("weird".into());
    let mut repo = open(&git, &tmp, ".+");

    let (heads, lists, set) = collect(&mut repo);

    let visited: Vec<&str> = heads.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(visited, vec!["main", "dev"]);
    assert_eq!(set, vec![BranchName::from("main"), BranchName::from("dev")]);
    assert_eq!(lists[0].len(), 3, "callbacks see every matching name");
}

#[test]
fn checkout_forces_the_tree_onto_the_remote_branch() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[("main", "m1")]));
    let mut repo = open(&git, &tmp, ".+");

    let checkout = repo.checkout(&BranchName::from("main")).unwrap();
    assert_eq!(checkout.branch().head.as_str(), "m1");

    let rendered: Vec<String> = git.calls().iter().map(ToString::to_string).collect();
    let tail = &rendered[rendered.len() - 4..];
    assert_eq!(
        tail,
        &[
            "git checkout --force -B main origin/main",
            "git reset --hard origin/main",
            "git clean -fd",
            "git rev-parse HEAD",
        ]
    );
}

#[test]
fn listing_failure_is_an_error_not_an_empty_set() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[("main", "m1")]));
    let mut repo = open(&git, &tmp, ".+");
    git.state.lock().unwrap().listing_fails = true;

    let result = repo.enumerate(&mut |_: &Path, _: &BranchHead, _: &[BranchName]| {
        panic!("nothing should be visited")
    });
    assert!(result.is_err());
}

#[test]
fn remote_default_follows_origin_head() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[("develop", "d1")]));
    let mut repo = open(&git, &tmp, ".+");

    assert_eq!(repo.remote_default(), None);
    git.state.lock().unwrap().remote_head = Some("develop".into());
    assert_eq!(repo.remote_default(), Some(BranchName::from("develop")));
}

#[test]
fn fresh_output_clones_into_the_repository_dir() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::default());
    let path = tmp.path().join("dist").join("repository");

    GitRepository::clone_or_open(
        git.clone(),
        "https://example.com/ui.git",
        &path,
        BranchFilter::default(),
    )
    .unwrap();

    let calls = git.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].to_string(), "git clone https://example.com/ui.git repository");
    assert_eq!(calls[0].cwd, tmp.path().join("dist"));
    assert!(calls[0]
        .env
        .iter()
        .any(|(k, v)| k == "GIT_TERMINAL_PROMPT" && v == "0"));
}

#[test]
fn existing_clone_is_reused_and_fetched() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::default());
    open(&git, &tmp, ".+");

    let rendered: Vec<String> = git.calls().iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "git remote set-url origin https://example.com/ui.git",
            "git fetch --prune origin",
        ]
    );
}

#[test]
fn clone_failure_is_reported() {
    struct Offline;
    impl ToolRunner for Offline {
        fn run(&self, _: &ToolCommand) -> Result<ToolOutput, CoreError> {
            Ok(ToolOutput::failed(128, "fatal: could not resolve host"))
        }
    }

    let tmp = TempDir::new().unwrap();
    let err = GitRepository::clone_or_open(
        Arc::new(Offline),
        "https://unreachable.invalid/ui.git",
        &tmp.path().join("repository"),
        BranchFilter::default(),
    )
    .err()
    .expect("clone must fail");
    assert!(err.to_string().contains("git clone failed"), "{err}");
    assert!(err.to_string().contains("could not resolve host"), "{err}");
}

#[test]
fn listing_drops_the_symbolic_head_entry() {
    let tmp = TempDir::new().unwrap();
    let git = Arc::new(ScriptedGit::with_branches(&[("main", "m1")]));
    let mut repo = open(&git, &tmp, ".+");
    let names = repo.remote_branches().unwrap();
    assert_eq!(names, vec![BranchName::from("main")]);
}
