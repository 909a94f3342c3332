//! Project initialization
//!
//! Creates the tasks directory, an optional config file, an optional
//! example task and an optional git repository. Existing files are left
//! untouched.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{CONFIG_FILE_NAME, DEFAULT_TASKS_MODULE};
use crate::error::{Result, TaskMasterError};
use crate::schema::{self, Arguments, FieldSpec, Schema, SchemaBuilder};
use crate::value::ValueKind;

/// Arguments of `task-master-start`
pub fn start_schema() -> Result<Arc<Schema>> {
    SchemaBuilder::new("StartArgs")
        .about("Create a new task-master project")
        .field(
            FieldSpec::new("location", ValueKind::String)
                .default_value(".")
                .help("Location where a new project should be created"),
        )
        .field(
            FieldSpec::new("with_config", ValueKind::Boolean)
                .default_value(true)
                .help("Flag whether to create a config file"),
        )
        .field(
            FieldSpec::new("with_example", ValueKind::Boolean)
                .default_value(false)
                .help("Flag whether to add example"),
        )
        .field(
            FieldSpec::new("with_git", ValueKind::Boolean)
                .default_value(true)
                .help("Flag whether to init git"),
        )
        .compile(None)
}

/// What to create, and where
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub location: PathBuf,
    pub with_config: bool,
    pub with_example: bool,
    pub with_git: bool,
}

impl StartOptions {
    pub fn parse<I, T>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let args = schema::parse(&start_schema()?, tokens)?;
        Self::from_args(&args)
    }

    pub fn from_args(args: &Arguments) -> Result<Self> {
        Ok(Self {
            location: PathBuf::from(args.value::<String>("location")?),
            with_config: args.value("with_config")?,
            with_example: args.value("with_example")?,
            with_git: args.value("with_git")?,
        })
    }
}

/// Result of project initialization
#[derive(Debug)]
pub struct InitResult {
    pub project_dir: PathBuf,
    /// Paths relative to the project directory, in creation order
    pub files_created: Vec<String>,
    pub git_initialized: bool,
}

/// Create the project structure described by `options`
pub fn create_project(options: &StartOptions) -> Result<InitResult> {
    let root = options.location.as_path();
    let mut result = InitResult {
        project_dir: root.to_path_buf(),
        files_created: Vec::new(),
        git_initialized: false,
    };

    create_dir(root, root, &mut result)?;

    if options.with_git {
        result.git_initialized = git_init(root);
        create_file(root, &root.join(".gitignore"), GITIGNORE_TEMPLATE, &mut result)?;
    }

    let tasks_dir = root.join(DEFAULT_TASKS_MODULE);
    create_dir(root, &tasks_dir, &mut result)?;

    if options.with_config {
        let mut content = CONFIG_TEMPLATE.to_string();
        if options.with_example {
            content.push_str(EXAMPLE_CONFIG_HOOKS);
        }
        create_file(root, &root.join(CONFIG_FILE_NAME), &content, &mut result)?;
    }

    if options.with_example {
        let example_dir = tasks_dir.join("example");
        create_dir(root, &example_dir, &mut result)?;
        create_file(root, &example_dir.join("hello.yaml"), EXAMPLE_TASK_TEMPLATE, &mut result)?;
        create_file(root, &root.join("HOW_TO_RUN.txt"), HOW_TO_RUN_TEMPLATE, &mut result)?;
    }

    Ok(result)
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn create_dir(root: &Path, path: &Path, result: &mut InitResult) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|source| TaskMasterError::ProjectFile {
        path: path.to_path_buf(),
        source,
    })?;
    if path != root {
        result.files_created.push(format!("{}/", relative(root, path)));
    }
    Ok(())
}

fn create_file(root: &Path, path: &Path, content: &str, result: &mut InitResult) -> Result<()> {
    if path.exists() {
        debug!(path = %path.display(), "File exists, leaving it untouched");
        return Ok(());
    }
    fs::write(path, content).map_err(|source| TaskMasterError::ProjectFile {
        path: path.to_path_buf(),
        source,
    })?;
    result.files_created.push(relative(root, path));
    Ok(())
}

fn git_init(root: &Path) -> bool {
    match Command::new("git").arg("init").current_dir(root).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(%status, "git init failed");
            false
        }
        Err(e) => {
            warn!(error = %e, "git is not available, skipping repository setup");
            false
        }
    }
}

const GITIGNORE_TEMPLATE: &str = r#"# Logs
*.log

# Secrets (never commit)
.env
"#;

const CONFIG_TEMPLATE: &str = r#"# task-master configuration
tasks_module: tasks

# Hooks run around every task (built-in: task_master.print_args)
# pre_parse_func:
# post_parse_func:
# post_task_func:

# Defaults for fields of task-file schemas
# defaults:
#   region: eu
"#;

const EXAMPLE_CONFIG_HOOKS: &str = "\npost_parse_func: task_master.print_args\n";

const EXAMPLE_TASK_TEMPLATE: &str = r#"tasks:
  - name: hello_world
    help: Prints a greeting
    run: echo "Hello World!"
"#;

const HOW_TO_RUN_TEMPLATE: &str = r#"# To run the example task, just type the following in the command line:
task-master hello_world
"#;
