//! task-master-start - scaffolds a new task-master project

use std::env;
use std::process;

use colored::Colorize;
use task_master::cli;
use task_master::error::Result;
use task_master::init::{create_project, StartOptions};

fn main() {
    cli::init_tracing();

    if let Err(e) = run() {
        process::exit(cli::report(&e));
    }
}

fn run() -> Result<()> {
    let tokens = cli::utf8_args("task-master-start", env::args_os().skip(1))?;
    let options = StartOptions::parse(tokens)?;
    let result = create_project(&options)?;

    println!(
        "{} Project ready at {}",
        "✓".green(),
        result.project_dir.display().to_string().cyan()
    );
    for file in &result.files_created {
        println!("  {} {}", "+".green(), file);
    }
    if result.git_initialized {
        println!("  {} git repository initialized", "+".green());
    }
    Ok(())
}
