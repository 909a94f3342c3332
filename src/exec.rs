//! Shell commands for manifest tasks
//!
//! Command templates reference fields as `{{field}}`. Rendering is strict:
//! an unknown field or an unterminated `{{` is an error, never passed
//! through to the shell. Substituted values are shell-quoted, one word per
//! value (one per item for lists).

use std::process::Command;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::schema::Arguments;
use crate::value::Value;

/// Prefix of the environment variables exported to commands
pub const ENV_PREFIX: &str = "TASK_MASTER_";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap());

/// Substitute every `{{field}}` with the quoted field value
pub fn render(template: &str, args: &Arguments) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for cap in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };
        push_literal(&mut rendered, &template[last..whole.start()])?;

        let value = args.get(name.as_str()).with_context(|| {
            format!(
                "unknown placeholder '{}' in `{}` ({} has no such field)",
                whole.as_str(),
                template,
                args.schema().name()
            )
        })?;
        rendered.push_str(&quote(value));
        last = whole.end();
    }
    push_literal(&mut rendered, &template[last..])?;

    Ok(rendered)
}

fn quote(value: &Value) -> String {
    match value {
        Value::List(items) => shell_words::join(items),
        other => shell_words::quote(&other.render()).into_owned(),
    }
}

fn push_literal(out: &mut String, literal: &str) -> Result<()> {
    if let Some(pos) = literal.find("{{") {
        bail!("unterminated or malformed placeholder near `{}`", &literal[pos..]);
    }
    out.push_str(literal);
    Ok(())
}

/// `TASK_MASTER_<FIELD>` pairs for every field of `args`
pub fn env_vars(args: &Arguments) -> Vec<(String, String)> {
    args.iter()
        .map(|(name, value)| (format!("{}{}", ENV_PREFIX, name.to_uppercase()), value.render()))
        .collect()
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Render and run `commands` in order, stopping at the first failure
pub fn run_commands(commands: &[String], args: &Arguments) -> Result<()> {
    let env = env_vars(args);

    for template in commands {
        let command = render(template, args)?;
        debug!(%command, "Running command");

        let start = Instant::now();
        let status = shell(&command)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .status()
            .with_context(|| format!("failed to start `{}`", command))?;
        debug!(%command, elapsed_ms = start.elapsed().as_millis() as u64, %status, "Command finished");

        if !status.success() {
            bail!("command `{}` failed with {}", command, status);
        }
    }
    Ok(())
}
