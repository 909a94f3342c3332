//! task-master - declarative command-line task runner
//!
//! Tasks are named handlers with typed argument schemas. The runner picks
//! a task from the first command-line token, discovers it under the tasks
//! directory if needed, parses the remaining input against the task's
//! schema and runs it between the configured lifecycle hooks.

pub mod base_args;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod init;
pub mod manifest;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod value;

pub use config::{Config, HookTable, Hooks};
pub use discovery::{Discovery, ModuleLoader, ModuleRef, StaticModules};
pub use error::{FixSuggestion, TaskMasterError};
pub use manifest::ManifestLoader;
pub use registry::{Handler, Kwargs, Parameter, Registry, Task};
pub use runner::{Runner, RunnerBuilder, Stage};
pub use schema::{Arguments, FieldSpec, Schema, SchemaBuilder};
pub use value::{Value, ValueKind};
