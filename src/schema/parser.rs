//! Runtime command-line parser for a compiled schema
//!
//! The flag layout is derived from the schema alone, so the same schema
//! always yields the same parser: main fields take the positional slots,
//! every other field becomes `--name` (plus `--kebab-name` and an optional
//! `-s` short alias). All values are taken as raw strings and coerced per
//! field afterwards. A repeated flag keeps its last value.

use std::sync::Arc;

use clap::error::ErrorKind;
use clap::{Arg, ArgAction, Command};
use tracing::debug;

use super::{Arguments, FieldDescriptor, Schema};
use crate::error::{Result, TaskMasterError};
use crate::value::{to_bool, ValueKind};

const HELP_ID: &str = "help";

/// Build the clap command describing `schema`
pub fn build_command(schema: &Schema) -> Command {
    let mut command = Command::new(schema.name().to_string())
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true)
        .arg(
            Arg::new(HELP_ID)
                .long("help")
                .action(ArgAction::Help)
                .help("Print help"),
        );

    if let Some(about) = schema.about() {
        command = command.about(about.to_string());
    }
    for field in schema.fields() {
        command = command.arg(field_arg(field));
    }
    command
}

fn field_arg(field: &FieldDescriptor) -> Arg {
    let mut arg = Arg::new(field.name().to_string())
        .action(ArgAction::Set)
        .required(field.is_required());

    if !field.help().is_empty() {
        arg = arg.help(field.help().to_string());
    }

    if let Some(position) = field.position() {
        return arg
            .value_name(field.name().to_uppercase())
            .index(position + 1);
    }

    arg = arg
        .long(field.name().to_string())
        .value_name(field.kind().to_string().to_uppercase());
    if let Some(alias) = field.kebab_alias() {
        arg = arg.visible_alias(alias);
    }
    if let Some(short) = field.short() {
        arg = arg.short(short);
    }

    match field.kind() {
        // `--flag` alone means true, see `expand_bare_flags`
        ValueKind::Boolean => arg.num_args(0..=1).default_missing_value("true"),
        ValueKind::Integer | ValueKind::Float => arg.allow_negative_numbers(true),
        _ => arg,
    }
}

/// Parse `tokens` against `schema` into a fresh argument instance
pub fn parse<I, T>(schema: &Arc<Schema>, tokens: I) -> Result<Arguments>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let tokens = expand_bare_flags(schema, tokens.into_iter().map(Into::into).collect());
    debug!(schema = schema.name(), ?tokens, "Parsing arguments");

    let matches = build_command(schema)
        .try_get_matches_from(tokens)
        .map_err(|err| clap_error(schema, err))?;

    let mut values = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let value = match matches.get_one::<String>(field.name()) {
            Some(raw) => field
                .coerce(raw)
                .map_err(|reason| TaskMasterError::invalid_argument(schema.name(), field.name(), reason))?,
            None => match field.default() {
                Some(default) => default.clone(),
                None => {
                    return Err(TaskMasterError::invalid_argument(
                        schema.name(),
                        field.name(),
                        "required value was not provided",
                    ))
                }
            },
        };
        values.push(value);
    }

    let mut arguments = Arguments::new(Arc::clone(schema), values);

    if let Some(callback) = schema.post_parse() {
        callback(&mut arguments).map_err(|err| TaskMasterError::ArgumentParse {
            schema: schema.name().to_string(),
            details: format!("{:#}", err),
        })?;
    }

    Ok(arguments)
}

/// Rewrite a boolean flag to `--flag=true` unless the next token is a
/// boolean value, so a bare flag never takes a positional token as its value
fn expand_bare_flags(schema: &Schema, tokens: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.into_iter().peekable();

    while let Some(token) = tokens.next() {
        if token == "--" {
            expanded.push(token);
            expanded.extend(tokens.by_ref());
            break;
        }
        let takes_next = tokens.peek().is_some_and(|next| to_bool(next).is_ok());
        if is_boolean_flag(schema, &token) && !takes_next {
            expanded.push(format!("{}=true", token));
        } else {
            expanded.push(token);
        }
    }
    expanded
}

fn is_boolean_flag(schema: &Schema, token: &str) -> bool {
    let field = if let Some(long) = token.strip_prefix("--") {
        schema
            .fields()
            .iter()
            .find(|f| f.name() == long || f.kebab_alias().as_deref() == Some(long))
    } else if let Some(short) = token.strip_prefix('-') {
        let mut chars = short.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => schema.fields().iter().find(|f| f.short() == Some(c)),
            _ => None,
        }
    } else {
        None
    };
    field.is_some_and(|f| f.kind() == ValueKind::Boolean && !f.is_main())
}

fn clap_error(schema: &Schema, err: clap::Error) -> TaskMasterError {
    let rendered = err.render().to_string();
    match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        | ErrorKind::DisplayVersion => TaskMasterError::HelpRequested(rendered),
        _ => {
            // first paragraph only, usage and tips are noise here
            let details = rendered
                .lines()
                .take_while(|line| !line.trim().is_empty())
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ")
                .trim_start_matches("error: ")
                .to_string();
            TaskMasterError::ArgumentParse {
                schema: schema.name().to_string(),
                details,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldSpec, SchemaBuilder};
    use crate::value::Value;

    fn schema() -> Arc<Schema> {
        SchemaBuilder::new("Deploy")
            .field(FieldSpec::new("target", ValueKind::String).main())
            .field(FieldSpec::new("replicas", ValueKind::Integer).default_value(1).short('r'))
            .field(FieldSpec::new("ratio", ValueKind::Float).default_value(0.5))
            .field(FieldSpec::new("dry_run", ValueKind::Boolean).default_value(false))
            .field(FieldSpec::new("tags", ValueKind::List).default_value(Vec::<String>::new()))
            .field(FieldSpec::new("hosts", ValueKind::List).delimiter(';').default_value(vec!["a"]))
            .field(FieldSpec::new("token", ValueKind::String).required())
            .compile(None)
            .unwrap()
    }

    #[test]
    fn parses_positional_flags_and_defaults() {
        let args = parse(&schema(), ["prod", "--token", "abc"]).unwrap();
        assert_eq!(args.get("target"), Some(&Value::from("prod")));
        assert_eq!(args.get("token"), Some(&Value::from("abc")));
        assert_eq!(args.get("replicas"), Some(&Value::from(1)));
        assert_eq!(args.get("dry_run"), Some(&Value::from(false)));
    }

    #[test]
    fn coerces_each_kind() {
        let args = parse(
            &schema(),
            [
                "prod", "--token=abc", "-r", "3", "--ratio", "-1.5", "--dry-run", "Y", "--tags",
                "a,b,c", "--hosts", "x;y",
            ],
        )
        .unwrap();
        assert_eq!(args.get("replicas"), Some(&Value::from(3)));
        assert_eq!(args.get("ratio"), Some(&Value::from(-1.5)));
        assert_eq!(args.get("dry_run"), Some(&Value::from(true)));
        assert_eq!(args.get("tags"), Some(&Value::from(vec!["a", "b", "c"])));
        assert_eq!(args.get("hosts"), Some(&Value::from(vec!["x", "y"])));
    }

    #[test]
    fn bare_boolean_flag_is_true() {
        let args = parse(&schema(), ["prod", "--token", "t", "--dry_run"]).unwrap();
        assert_eq!(args.get("dry_run"), Some(&Value::from(true)));
    }

    #[test]
    fn bad_boolean_is_a_parse_error() {
        let err = parse(&schema(), ["prod", "--token", "t", "--dry_run=maybe"]).unwrap_err();
        assert!(
            matches!(err, TaskMasterError::ArgumentParse { ref details, .. } if details.contains("dry_run"))
        );
    }

    #[test]
    fn bare_boolean_flag_leaves_positional_alone() {
        let args = parse(&schema(), ["--dry_run", "prod", "--token", "t"]).unwrap();
        assert_eq!(args.get("dry_run"), Some(&Value::from(true)));
        assert_eq!(args.get("target"), Some(&Value::from("prod")));

        let args = parse(&schema(), ["--dry-run", "no", "prod", "--token", "t"]).unwrap();
        assert_eq!(args.get("dry_run"), Some(&Value::from(false)));
        assert_eq!(args.get("target"), Some(&Value::from("prod")));
    }

    #[test]
    fn repeated_flag_keeps_last_value() {
        let args = parse(&schema(), ["prod", "--token", "t", "-r", "1", "--replicas", "4"]).unwrap();
        assert_eq!(args.get("replicas"), Some(&Value::from(4)));
    }

    #[test]
    fn inherited_and_own_main_fields_bind_in_order() {
        let base = SchemaBuilder::new("Base")
            .field(FieldSpec::new("task", ValueKind::String).main())
            .compile(None)
            .unwrap();
        let child = SchemaBuilder::new("Child")
            .field(FieldSpec::new("target", ValueKind::String).main())
            .field(FieldSpec::new("force", ValueKind::Boolean).default_value(false))
            .extends(base)
            .compile(None)
            .unwrap();

        let args = parse(&child, ["deploy", "--force", "prod"]).unwrap();
        assert_eq!(args.get("task"), Some(&Value::from("deploy")));
        assert_eq!(args.get("target"), Some(&Value::from("prod")));
        assert_eq!(args.get("force"), Some(&Value::from(true)));
    }

    #[test]
    fn bad_integer_is_a_parse_error() {
        let err = parse(&schema(), ["prod", "--token", "t", "--replicas", "many"]).unwrap_err();
        assert!(matches!(err, TaskMasterError::ArgumentParse { .. }));
    }

    #[test]
    fn missing_required_field_fails() {
        let err = parse(&schema(), ["prod"]).unwrap_err();
        assert!(
            matches!(err, TaskMasterError::ArgumentParse { ref details, .. } if details.contains("token"))
        );
    }

    #[test]
    fn unknown_tokens_fail() {
        let err = parse(&schema(), ["prod", "--token", "t", "--nope", "1"]).unwrap_err();
        assert!(matches!(err, TaskMasterError::ArgumentParse { .. }));

        let err = parse(&schema(), ["prod", "extra", "--token", "t"]).unwrap_err();
        assert!(matches!(err, TaskMasterError::ArgumentParse { .. }));
    }

    #[test]
    fn help_is_reported_separately() {
        let err = parse(&schema(), ["--help"]).unwrap_err();
        match err {
            TaskMasterError::HelpRequested(text) => {
                assert!(text.contains("--replicas"));
                assert!(text.contains("--dry_run"));
            }
            other => panic!("expected help, got {other:?}"),
        }
    }

    #[test]
    fn layout_is_stable_across_calls() {
        let schema = schema();
        let first: Vec<String> = build_command(&schema)
            .get_arguments()
            .map(|a| a.get_id().to_string())
            .collect();
        let second: Vec<String> = build_command(&schema)
            .get_arguments()
            .map(|a| a.get_id().to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn post_parse_callback_can_reject() {
        let schema = SchemaBuilder::new("Checked")
            .field(FieldSpec::new("count", ValueKind::Integer).required())
            .post_parse(|args| {
                let count: i64 = args.value("count")?;
                anyhow::ensure!(count > 0, "count must be positive");
                Ok(())
            })
            .compile(None)
            .unwrap();

        assert!(parse(&schema, ["--count", "2"]).is_ok());
        let err = parse(&schema, ["--count", "0"]).unwrap_err();
        assert!(
            matches!(err, TaskMasterError::ArgumentParse { ref details, .. } if details.contains("positive"))
        );
    }
}
