//! The base argument schema shared by every task
//!
//! `task` binds the task name positionally; the three mode flags are
//! available to every task and drive the `if_*` conditionals.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::schema::{Arguments, FieldSpec, Schema, SchemaBuilder};
use crate::value::ValueKind;

pub const SCHEMA_NAME: &str = "BaseArgs";

pub const TASK: &str = "task";
pub const DEBUG_MODE: &str = "debug_mode";
pub const EXPERIMENTAL_MODE: &str = "experimental_mode";
pub const LOGGING_MODE: &str = "logging_mode";

static BASE_SCHEMA: Lazy<Arc<Schema>> = Lazy::new(build);

fn build() -> Arc<Schema> {
    let compiled = SchemaBuilder::new(SCHEMA_NAME)
        .field(FieldSpec::new(TASK, ValueKind::String).main().help("Task to be executed"))
        .field(
            FieldSpec::new(DEBUG_MODE, ValueKind::Boolean)
                .default_value(false)
                .help("Flag whether to enable debug mode"),
        )
        .field(
            FieldSpec::new(EXPERIMENTAL_MODE, ValueKind::Boolean)
                .default_value(false)
                .help("Flag whether to enable experimental mode"),
        )
        .field(
            FieldSpec::new(LOGGING_MODE, ValueKind::Boolean)
                .default_value(false)
                .help("Flag whether to enable logging mode"),
        )
        .compile(None);

    match compiled {
        Ok(schema) => schema,
        // static declaration above, cannot fail
        Err(err) => unreachable!("base schema is invalid: {err}"),
    }
}

/// The compiled base schema
pub fn schema() -> Arc<Schema> {
    Arc::clone(&BASE_SCHEMA)
}

fn flag(args: &Arguments, name: &str) -> bool {
    args.value::<bool>(name).unwrap_or(false)
}

/// Name of the task being run
pub fn task_name(args: &Arguments) -> Option<String> {
    args.value::<String>(TASK).ok()
}

pub fn debug_mode(args: &Arguments) -> bool {
    flag(args, DEBUG_MODE)
}

pub fn experimental_mode(args: &Arguments) -> bool {
    flag(args, EXPERIMENTAL_MODE)
}

pub fn logging_mode(args: &Arguments) -> bool {
    flag(args, LOGGING_MODE)
}

/// Run `f` only with `--debug_mode`
pub fn if_debug<R>(args: &Arguments, f: impl FnOnce() -> R) -> Option<R> {
    debug_mode(args).then(f)
}

/// Run `f` only with `--experimental_mode`
pub fn if_experimental<R>(args: &Arguments, f: impl FnOnce() -> R) -> Option<R> {
    experimental_mode(args).then(f)
}

/// Run `f` only with `--logging_mode`
pub fn if_logging<R>(args: &Arguments, f: impl FnOnce() -> R) -> Option<R> {
    logging_mode(args).then(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse;

    #[test]
    fn layout() {
        let schema = schema();
        assert_eq!(
            schema.field_names().collect::<Vec<_>>(),
            vec![TASK, DEBUG_MODE, EXPERIMENTAL_MODE, LOGGING_MODE]
        );
        let slots: Vec<&str> = schema.positionals().iter().map(|f| f.name()).collect();
        assert_eq!(slots, vec![TASK]);
        assert!(schema.field(TASK).unwrap().is_required());
    }

    #[test]
    fn conditionals_follow_flags() {
        let args = parse(&schema(), ["build", "--debug-mode"]).unwrap();
        assert_eq!(task_name(&args).as_deref(), Some("build"));
        assert_eq!(if_debug(&args, || 7), Some(7));
        assert_eq!(if_experimental(&args, || 7), None);
        assert_eq!(if_logging(&args, || 7), None);

        let args = parse(&schema(), ["build", "--logging_mode", "yes"]).unwrap();
        assert_eq!(if_logging(&args, || "on"), Some("on"));
        assert!(!debug_mode(&args));
    }

    #[test]
    fn task_name_is_required() {
        assert!(parse(&schema(), Vec::<String>::new()).is_err());
    }
}
