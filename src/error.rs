//! Error types with fix suggestions

use std::path::PathBuf;

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// Every failure the framework can report. All of them are terminal for the
/// current invocation.
#[derive(Error, Debug)]
pub enum TaskMasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Schema compilation (TM-010 to TM-011)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-010: Schema '{schema}' has conflicting field '{field}': {reason}")]
    SchemaConflict {
        schema: String,
        field: String,
        reason: String,
    },

    #[error("TM-011: Invalid field '{field}' in schema '{schema}': {reason}")]
    InvalidField {
        schema: String,
        field: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Registration (TM-020)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-020: Cannot register task '{task}': {reason}")]
    DynamicArgument { task: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Resolution (TM-030 to TM-031)
    // ─────────────────────────────────────────────────────────────

    #[error(
        "TM-030: Wrong `task` argument given: '{requested}' isn't registered.\nCurrently registered tasks: {}",
        known_list(.known)
    )]
    UnknownTask {
        requested: String,
        known: Vec<String>,
    },

    #[error("TM-031: Task discovery failed under {path:?}: {details}")]
    Discovery { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────
    // Parsing (TM-040 to TM-041)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-040: Invalid arguments for '{schema}': {details}")]
    ArgumentParse { schema: String, details: String },

    #[error("{0}")]
    HelpRequested(String),

    // ─────────────────────────────────────────────────────────────
    // Argument access (TM-050 to TM-052)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-050: The `{field}` attribute of {schema} is read only")]
    ReadOnlyViolation { schema: String, field: String },

    #[error("TM-051: {schema} has no attribute '{field}'")]
    UnknownField { schema: String, field: String },

    #[error("TM-052: Field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Configuration and task files (TM-060 to TM-062)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-060: Invalid config file {path:?}: {details}")]
    ConfigParse { path: PathBuf, details: String },

    #[error("TM-061: Config key '{key}' references unknown hook '{reference}'")]
    HookNotFound { key: String, reference: String },

    #[error("TM-062: Invalid task file {path:?}: {details}")]
    ManifestParse { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────
    // Execution (TM-070 to TM-080)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-070: {stage} hook failed: {error:#}")]
    HookFailed {
        stage: &'static str,
        error: anyhow::Error,
    },

    #[error("TM-080: Task '{task}' failed: {error:#}")]
    TaskFailed { task: String, error: anyhow::Error },

    // ─────────────────────────────────────────────────────────────
    // Scaffolding (TM-090)
    // ─────────────────────────────────────────────────────────────

    #[error("TM-090: Cannot create {path:?}: {source}")]
    ProjectFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn known_list(known: &[String]) -> String {
    if known.is_empty() {
        "(none)".to_string()
    } else {
        known.join(", ")
    }
}

impl TaskMasterError {
    /// Builds an `ArgumentParse` error for one field of a schema.
    pub fn invalid_argument(schema: &str, field: &str, details: impl std::fmt::Display) -> Self {
        TaskMasterError::ArgumentParse {
            schema: schema.to_string(),
            details: format!("--{}: {}", field, details),
        }
    }
}

impl FixSuggestion for TaskMasterError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TaskMasterError::Io(_) => Some("Check file path and permissions"),
            TaskMasterError::SchemaConflict { .. } => {
                Some("Rename the field or drop one of the base schemas that declares it")
            }
            TaskMasterError::InvalidField { .. } => {
                Some("Field names use letters, digits and underscores; only one field may be main")
            }
            TaskMasterError::DynamicArgument { .. } => Some(
                "Give every parameter a type and keep parameters out of explicit-schema tasks",
            ),
            TaskMasterError::UnknownTask { .. } => {
                Some("Check the task name, or the tasks_module setting in task_master.config.yaml")
            }
            TaskMasterError::Discovery { .. } => Some("Check that the tasks directory is readable"),
            TaskMasterError::ArgumentParse { .. } => {
                Some("Run the task with --help to see its arguments")
            }
            TaskMasterError::HelpRequested(_) => None,
            TaskMasterError::ReadOnlyViolation { .. } => {
                Some("Declare the field with read_only: false to allow updates")
            }
            TaskMasterError::UnknownField { .. } => Some("Check the field name against the schema"),
            TaskMasterError::TypeMismatch { .. } => {
                Some("Assign a value of the field's declared type")
            }
            TaskMasterError::ConfigParse { .. } => {
                Some("Check YAML syntax of task_master.config.yaml: indentation and quoting")
            }
            TaskMasterError::HookNotFound { .. } => {
                Some("Register the hook in the HookTable or fix the reference in the config file")
            }
            TaskMasterError::ManifestParse { .. } => {
                Some("Check YAML syntax: each task needs a run command and typed params")
            }
            TaskMasterError::HookFailed { .. } => None,
            TaskMasterError::TaskFailed { .. } => None,
            TaskMasterError::ProjectFile { .. } => Some("Check directory permissions"),
        }
    }
}

/// Result alias used across the crate
pub type Result<T, E = TaskMasterError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_task_lists_known_names() {
        let err = TaskMasterError::UnknownTask {
            requested: "missing".to_string(),
            known: vec!["build".to_string(), "hello".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("TM-030"));
        assert!(msg.contains("'missing'"));
        assert!(msg.contains("build, hello"));
    }

    #[test]
    fn unknown_task_with_empty_registry() {
        let err = TaskMasterError::UnknownTask {
            requested: "x".to_string(),
            known: vec![],
        };
        assert!(err.to_string().contains("(none)"));
    }

    #[test]
    fn invalid_argument_names_the_flag() {
        let err = TaskMasterError::invalid_argument("BaseArgs", "debug_mode", "not a boolean");
        assert_eq!(
            err.to_string(),
            "TM-040: Invalid arguments for 'BaseArgs': --debug_mode: not a boolean"
        );
    }

    #[test]
    fn help_has_no_suggestion() {
        let err = TaskMasterError::HelpRequested("usage".to_string());
        assert!(err.fix_suggestion().is_none());
        assert_eq!(err.to_string(), "usage");
    }
}
