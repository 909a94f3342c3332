//! task-master CLI - runs one task from the current directory's tasks tree

use std::env;
use std::process;

use task_master::cli;
use task_master::error::Result;
use task_master::RunnerBuilder;

fn main() {
    cli::init_tracing();

    if let Err(e) = run() {
        process::exit(cli::report(&e));
    }
}

fn run() -> Result<()> {
    let tokens = cli::utf8_args("task-master", env::args_os().skip(1))?;
    let root = env::current_dir()?;
    let mut runner = RunnerBuilder::new(root).build()?;
    runner.run(tokens)?;
    Ok(())
}
