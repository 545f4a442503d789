//! Pipeline tests with a scripted tool runner standing in for the package
//! manager and Storybook.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use branchbook_build::{gate, BranchPipeline, BranchStatus, Pipeline, SiteBuilder};
use branchbook_core::{
    BranchHead, BranchName, CoreError, HeadId, OutputLayout, ToolCommand, ToolOutput, ToolRunner,
};
use branchbook_nav::NavInjector;
use rstest::rstest;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Scripted runner
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Fail {
    Nothing,
    Install,
    Hook,
    Build,
    /// Build "succeeds" but ignores `-o` and writes storybook-static/.
    IgnoreOutputDir,
}

struct ScriptedRunner {
    fail: Mutex<Fail>,
    calls: Mutex<Vec<ToolCommand>>,
}

impl ScriptedRunner {
    fn new(fail: Fail) -> Arc<Self> {
        Arc::new(Self {
            fail: Mutex::new(fail),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn set_fail(&self, fail: Fail) {
        *self.fail.lock().unwrap() = fail;
    }

    fn builds(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.args.iter().any(|a| a == "-o"))
            .count()
    }

    fn programs(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|c| c.to_string()).collect()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, command: &ToolCommand) -> Result<ToolOutput, CoreError> {
        self.calls.lock().unwrap().push(command.clone());
        let fail = *self.fail.lock().unwrap();
        let is_install = command.args.first().map(String::as_str) == Some("install");
        let is_hook = command.args.first().map(String::as_str) == Some("run");
        let out_at = command.args.iter().position(|a| a == "-o");

        if is_install {
            if fail == Fail::Install {
                return Ok(ToolOutput::failed(1, "ERR! network"));
            }
            let bin = command.cwd.join("node_modules/.bin");
            fs::create_dir_all(&bin).unwrap();
            fs::write(bin.join("storybook"), "#!/bin/sh\n").unwrap();
            return Ok(ToolOutput::ok(""));
        }
        if is_hook {
            if fail == Fail::Hook {
                return Ok(ToolOutput::failed(2, "hook exploded"));
            }
            return Ok(ToolOutput::ok(""));
        }
        if let Some(at) = out_at {
            if fail == Fail::Build {
                return Ok(ToolOutput::failed(1, "SB_BUILDER_0001 build failed"));
            }
            let out = if fail == Fail::IgnoreOutputDir {
                command.cwd.join("storybook-static")
            } else {
                PathBuf::from(&command.args[at + 1])
            };
            fs::create_dir_all(&out).unwrap();
            fs::write(
                out.join("index.html"),
                "<html><body><div id=\"root\"></div></body></html>",
            )
            .unwrap();
            return Ok(ToolOutput::ok(""));
        }
        Ok(ToolOutput::failed(127, format!("unexpected command {command}")))
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Fixture {
    _tmp: TempDir,
    checkout: PathBuf,
    layout: OutputLayout,
    runner: Arc<ScriptedRunner>,
    pipeline: Pipeline,
}

fn fixture(fail: Fail, package_json: &str) -> Fixture {
    let tmp = TempDir::new().expect("tmp");
    let layout = OutputLayout::new(tmp.path().join("dist"));
    let checkout = layout.repository_dir();
    fs::create_dir_all(checkout.join(".storybook")).expect("config");
    fs::write(checkout.join("package.json"), package_json).expect("manifest");

    let runner = ScriptedRunner::new(fail);
    let injector = Arc::new(NavInjector::new(layout.clone()).expect("injector"));
    let builder = SiteBuilder::new(runner.clone(), injector, ".");
    Fixture {
        _tmp: tmp,
        checkout,
        layout,
        runner,
        pipeline: Pipeline::new(builder),
    }
}

fn head(name: &str, id: &str) -> BranchHead {
    BranchHead {
        name: BranchName::from(name),
        head: HeadId::from(id),
    }
}

fn names(list: &[&str]) -> Vec<BranchName> {
    list.iter().map(|n| BranchName::from(*n)).collect()
}

fn marker(layout: &OutputLayout, branch: &str) -> Option<String> {
    gate::read_marker(layout, &BranchName::from(branch))
        .unwrap()
        .map(|h| h.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn unchanged_head_never_rebuilds() {
    let fx = fixture(Fail::Nothing, "{}");
    let main = head("main", "c0ffee");
    let all = names(&["main"]);

    assert_eq!(fx.pipeline.process(&fx.checkout, &main, &all), BranchStatus::Built);
    for _ in 0..3 {
        assert_eq!(
            fx.pipeline.process(&fx.checkout, &main, &all),
            BranchStatus::UpToDate
        );
    }
    assert_eq!(fx.runner.builds(), 1);
    assert_eq!(marker(&fx.layout, "main").as_deref(), Some("c0ffee"));
}

#[test]
fn new_head_triggers_rebuild_and_restamps() {
    let fx = fixture(Fail::Nothing, "{}");
    let all = names(&["main"]);
    fx.pipeline.process(&fx.checkout, &head("main", "aaa"), &all);
    assert_eq!(
        fx.pipeline.process(&fx.checkout, &head("main", "bbb"), &all),
        BranchStatus::Built
    );
    assert_eq!(fx.runner.builds(), 2);
    assert_eq!(marker(&fx.layout, "main").as_deref(), Some("bbb"));
}

#[rstest]
#[case(Fail::Install)]
#[case(Fail::Hook)]
#[case(Fail::Build)]
fn failed_step_leaves_no_marker_and_retries(#[case] fail: Fail) {
    let fx = fixture(fail, r#"{"scripts": {"prebuild-storybook": "node gen.js"}}"#);
    let main = head("main", "abc");
    let all = names(&["main"]);

    assert_eq!(fx.pipeline.process(&fx.checkout, &main, &all), BranchStatus::Failed);
    assert_eq!(marker(&fx.layout, "main"), None);

    fx.runner.set_fail(Fail::Nothing);
    assert_eq!(fx.pipeline.process(&fx.checkout, &main, &all), BranchStatus::Built);
    assert_eq!(marker(&fx.layout, "main").as_deref(), Some("abc"));
}

#[test]
fn failed_rebuild_keeps_serving_previous_artifact() {
    let fx = fixture(Fail::Nothing, "{}");
    let all = names(&["main"]);
    fx.pipeline.process(&fx.checkout, &head("main", "v1"), &all);

    fx.runner.set_fail(Fail::Build);
    assert_eq!(
        fx.pipeline.process(&fx.checkout, &head("main", "v2"), &all),
        BranchStatus::Failed
    );
    let entry = fx.layout.entry_page(&BranchName::from("main")).unwrap();
    assert!(entry.is_file(), "previous build must stay published");
    assert_eq!(marker(&fx.layout, "main").as_deref(), Some("v1"));
}

#[test]
fn missing_configuration_is_a_skip() {
    let fx = fixture(Fail::Nothing, "{}");
    fs::remove_dir_all(fx.checkout.join(".storybook")).unwrap();
    let status = fx
        .pipeline
        .process(&fx.checkout, &head("main", "abc"), &names(&["main"]));
    assert_eq!(status, BranchStatus::NoConfiguration);
    assert!(fx.runner.programs().is_empty(), "nothing should run");
    assert_eq!(marker(&fx.layout, "main"), None);
}

#[test]
fn hook_runs_between_install_and_build() {
    let fx = fixture(
        Fail::Nothing,
        r#"{"scripts": {"prebuild-storybook": "node gen.js"}}"#,
    );
    fx.pipeline
        .process(&fx.checkout, &head("main", "abc"), &names(&["main"]));
    let programs = fx.runner.programs();
    assert_eq!(programs.len(), 3, "{programs:?}");
    assert_eq!(programs[0], "npm install");
    assert_eq!(programs[1], "npm run prebuild-storybook");
    assert!(programs[2].contains(" build -c "), "{}", programs[2]);
}

#[test]
fn output_written_next_to_project_is_relocated() {
    let fx = fixture(Fail::IgnoreOutputDir, "{}");
    let status = fx
        .pipeline
        .process(&fx.checkout, &head("main", "abc"), &names(&["main"]));
    assert_eq!(status, BranchStatus::Built);
    assert!(fx.layout.entry_page(&BranchName::from("main")).unwrap().is_file());
    assert!(!fx.checkout.join("storybook-static").exists());
}

#[test]
fn built_entry_page_carries_navigation() {
    let fx = fixture(Fail::Nothing, "{}");
    fx.pipeline.process(
        &fx.checkout,
        &head("feat-a", "abc"),
        &names(&["main", "feat-a"]),
    );
    let page = fs::read_to_string(fx.layout.entry_page(&BranchName::from("feat-a")).unwrap())
        .expect("entry page");
    assert!(page.contains(r#"window.BRANCHBOOK_BRANCH = "feat-a";"#));
    assert!(page.contains(r#"window.BRANCHBOOK_BRANCHES = ["main","feat-a"];"#));
    assert!(!staging_exists(&fx.layout, "feat-a"));
}

fn staging_exists(layout: &OutputLayout, branch: &str) -> bool {
    layout
        .staging_dir(&BranchName::from(branch))
        .map(|p| p.exists())
        .unwrap_or(false)
}
