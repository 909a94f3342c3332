//! # Runner Tests
//!
//! End-to-end runs over temporary project trees:
//! - compiled-in task modules discovered through `.rs` markers
//! - YAML task files, nested packages and config-driven defaults
//! - unknown tasks and their diagnostics

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use task_master::error::Result;
use task_master::{
    handler, Arguments, Config, Kwargs, Parameter, Registry, RunnerBuilder, StaticModules,
    TaskMasterError, ValueKind,
};
use tempfile::TempDir;

// ============================================================================
// TEST HELPERS
// ============================================================================

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

static HELLO_CALLS: AtomicUsize = AtomicUsize::new(0);

fn hello(_: &mut Arguments, kwargs: &Kwargs) -> anyhow::Result<()> {
    assert!(kwargs.is_empty());
    HELLO_CALLS.fetch_add(1, Ordering::SeqCst);
    Ok(())
}

fn register_hello(registry: &mut Registry) -> Result<()> {
    registry.register(None, handler!(hello), None)
}

static GREETINGS: Mutex<Vec<(String, i64)>> = Mutex::new(Vec::new());

fn greet(_: &mut Arguments, kwargs: &Kwargs) -> anyhow::Result<()> {
    let name: String = kwargs.get("name")?;
    let times: i64 = kwargs.get("times")?;
    GREETINGS.lock().unwrap().push((name, times));
    Ok(())
}

fn register_greet(registry: &mut Registry) -> Result<()> {
    registry.register(
        None,
        handler!(
            greet,
            Parameter::new("name", ValueKind::String),
            Parameter::new("times", ValueKind::Integer).default_value(1),
        ),
        None,
    )
}

fn modules() -> StaticModules {
    StaticModules::new()
        .module("tasks.hello", register_hello)
        .module("tasks.people.greet", register_greet)
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks/hello.rs", "");
    write(dir.path(), "tasks/people/greet.rs", "");
    dir
}

// ============================================================================
// COMPILED-IN MODULES
// ============================================================================

#[test]
fn test_hello_reaches_execute() {
    let dir = project();
    let mut runner = RunnerBuilder::new(dir.path()).modules(modules()).build().unwrap();

    let before = HELLO_CALLS.load(Ordering::SeqCst);
    let args = runner.run(["hello"]).unwrap();

    assert_eq!(HELLO_CALLS.load(Ordering::SeqCst), before + 1);
    assert_eq!(args.value::<String>("task").unwrap(), "hello");
    assert_eq!(args.schema().name(), "BaseArgs");
}

#[test]
fn test_missing_task_lists_registered_names() {
    let dir = project();
    let mut runner = RunnerBuilder::new(dir.path()).modules(modules()).build().unwrap();

    let err = runner.run(["missing"]).unwrap_err();
    match &err {
        TaskMasterError::UnknownTask { requested, known } => {
            assert_eq!(requested, "missing");
            assert!(known.contains(&"hello".to_string()));
        }
        other => panic!("expected UnknownTask, got {other:?}"),
    }
    assert!(err.to_string().contains("hello"));
}

#[test]
fn test_greet_gets_keyword_arguments() {
    let dir = project();
    let mut runner = RunnerBuilder::new(dir.path()).modules(modules()).build().unwrap();

    let args = runner.run(["greet", "--name=Ann", "--times=3"]).unwrap();

    assert_eq!(args.schema().name(), "DynamicArgs_greet");
    assert_eq!(args.value::<String>("name").unwrap(), "Ann");
    assert_eq!(args.value::<i64>("times").unwrap(), 3);
    assert!(GREETINGS
        .lock()
        .unwrap()
        .contains(&("Ann".to_string(), 3)));
}

#[test]
fn test_greet_requires_name() {
    let dir = project();
    let mut runner = RunnerBuilder::new(dir.path()).modules(modules()).build().unwrap();

    let err = runner.run(["greet", "--times", "2"]).unwrap_err();
    assert!(matches!(err, TaskMasterError::ArgumentParse { ref schema, .. } if schema == "DynamicArgs_greet"));
}

#[test]
fn test_help_is_not_an_execution() {
    let dir = project();
    let mut runner = RunnerBuilder::new(dir.path()).modules(modules()).build().unwrap();

    let err = runner.run(["greet", "--help"]).unwrap_err();
    match err {
        TaskMasterError::HelpRequested(text) => {
            assert!(text.contains("--times"));
            assert!(text.contains("Automatically generated hint for name"));
        }
        other => panic!("expected help, got {other:?}"),
    }
}

// ============================================================================
// YAML TASK FILES
// ============================================================================

#[cfg(unix)]
#[test]
fn test_manifest_task_runs_commands() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.txt");
    write(
        dir.path(),
        "tasks/ops/deploy.yaml",
        r#"
tasks:
  - name: deploy
    params:
      - { name: target, type: string, default: staging }
      - { name: out, type: string }
    run:
      - "printf '%s' {{target}} > {{out}}"
      - "printf ' %s' \"$TASK_MASTER_TARGET\" >> {{out}}"
"#,
    );

    let mut runner = RunnerBuilder::new(dir.path()).build().unwrap();
    runner
        .run(["deploy", "--target", "prod", "--out", out.to_str().unwrap()])
        .unwrap();

    assert_eq!(fs::read_to_string(&out).unwrap(), "prod prod");
}

#[cfg(unix)]
#[test]
fn test_failing_command_is_a_task_failure() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks/fail.yml", "tasks:\n  - run: \"exit 4\"\n");

    let mut runner = RunnerBuilder::new(dir.path()).build().unwrap();
    let err = runner.run(["fail"]).unwrap_err();
    assert!(matches!(err, TaskMasterError::TaskFailed { ref task, .. } if task == "fail"));
}

#[test]
fn test_main_field_binds_token_after_task_name() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tasks/deploy.yaml",
        r#"
schemas:
  deploy_args:
    fields:
      - { name: target, type: string, main: true }
      - { name: dry_run, type: bool, default: false }
tasks:
  - { name: deploy, args: deploy_args, run: "true {{target}}" }
"#,
    );

    let mut runner = RunnerBuilder::new(dir.path()).build().unwrap();
    let args = runner.run(["deploy", "--dry_run", "prod"]).unwrap();
    assert_eq!(args.value::<String>("task").unwrap(), "deploy");
    assert_eq!(args.value::<String>("target").unwrap(), "prod");
    assert!(args.value::<bool>("dry_run").unwrap());

    let err = runner.run(["deploy"]).unwrap_err();
    assert!(matches!(err, TaskMasterError::ArgumentParse { ref details, .. } if details.contains("TARGET")));
}

#[test]
fn test_config_sets_package_and_defaults() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "task_master.config.yaml",
        "tasks_module: jobs\ndefaults:\n  region: eu\n",
    );
    write(
        dir.path(),
        "jobs/region.yaml",
        r#"
schemas:
  region_args:
    fields:
      - { name: region, type: string }
tasks:
  - { name: where, args: region_args, run: "true" }
"#,
    );
    // not under the configured package
    write(dir.path(), "tasks/other.yaml", "tasks:\n  - { name: other, run: 'true' }\n");

    let mut runner = RunnerBuilder::new(dir.path()).build().unwrap();
    assert_eq!(runner.config().tasks_module, "jobs");

    let args = runner.run(["where"]).unwrap();
    assert_eq!(args.value::<String>("region").unwrap(), "eu");

    let args = runner.run(["where", "--region", "us"]).unwrap();
    assert_eq!(args.value::<String>("region").unwrap(), "us");

    assert!(matches!(
        runner.run(["other"]).unwrap_err(),
        TaskMasterError::UnknownTask { .. }
    ));
}

#[test]
fn test_reserved_prefix_is_never_loaded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "tasks/__hidden.yaml", "tasks:\n  - { name: hidden, run: 'true' }\n");
    write(dir.path(), "tasks/shown.yaml", "tasks:\n  - { name: shown, run: 'true' }\n");

    let mut runner = RunnerBuilder::new(dir.path()).build().unwrap();
    let err = runner.run(["hidden"]).unwrap_err();
    match err {
        TaskMasterError::UnknownTask { known, .. } => assert_eq!(known, vec!["shown"]),
        other => panic!("expected UnknownTask, got {other:?}"),
    }
}

#[test]
fn test_read_only_field_rejects_updates_from_hooks() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "tasks/locked.yaml",
        r#"
schemas:
  locked_args:
    read_only: true
    fields:
      - { name: level, type: int, default: 1 }
tasks:
  - { name: locked, args: locked_args, run: "true" }
"#,
    );

    let hooks = task_master::HookTable::new().args_hook("bump", |args| {
        args.set("level", 2)?;
        Ok(())
    });
    let mut runner = RunnerBuilder::new(dir.path())
        .config(Config::from_yaml("post_parse_func: bump").unwrap())
        .hooks(hooks)
        .build()
        .unwrap();

    let err = runner.run(["locked"]).unwrap_err();
    assert!(err.to_string().contains("The `level` attribute of locked_args is read only"));
}
