//! Shared plumbing for the binaries

use std::ffi::OsString;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use crate::error::{FixSuggestion, Result, TaskMasterError};

/// Install the fmt subscriber on stderr, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line tokens as UTF-8 strings; `program` names the failing parser
pub fn utf8_args<I>(program: &str, args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            arg.into_string().map_err(|raw| TaskMasterError::ArgumentParse {
                schema: program.to_string(),
                details: format!("argument {:?} is not valid UTF-8", raw),
            })
        })
        .collect()
}

/// Print `err` the way the binaries report failures and return the exit code
///
/// Help output goes to stdout with status 0.
pub fn report(err: &TaskMasterError) -> i32 {
    if let TaskMasterError::HelpRequested(text) = err {
        print!("{}", text);
        return 0;
    }

    eprintln!("{} {}", "Error:".red().bold(), err);
    if let Some(suggestion) = err.fix_suggestion() {
        eprintln!("  {} {}", "Fix:".yellow(), suggestion);
    }
    1
}
