//! Task lifecycle
//!
//! One run walks a fixed sequence of stages:
//!
//! ```text
//! Init → PreParseHook → Resolve → Parse → PostParseHook → Execute → PostTaskHook → Terminal
//! ```
//!
//! `Init` happens in [`RunnerBuilder::build`]; the rest in [`Runner::run`].
//! A failure in any stage ends the run; nothing is retried.

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::{Config, HookTable, Hooks};
use crate::discovery::{Discovery, StaticModules};
use crate::error::{Result, TaskMasterError};
use crate::manifest::ManifestLoader;
use crate::registry::{Kwargs, Registry};
use crate::schema::{self, Arguments};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    PreParseHook,
    Resolve,
    Parse,
    PostParseHook,
    Execute,
    PostTaskHook,
    Terminal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::PreParseHook => "pre-parse",
            Stage::Resolve => "resolve",
            Stage::Parse => "parse",
            Stage::PostParseHook => "post-parse",
            Stage::Execute => "execute",
            Stage::PostTaskHook => "post-task",
            Stage::Terminal => "terminal",
        };
        f.write_str(name)
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "Entering stage");
}

/// Builds a [`Runner`] for a project directory
pub struct RunnerBuilder {
    root: PathBuf,
    config: Option<Config>,
    hook_table: HookTable,
    modules: StaticModules,
    registry: Registry,
}

impl RunnerBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            config: None,
            hook_table: HookTable::default(),
            modules: StaticModules::new(),
            registry: Registry::default(),
        }
    }

    /// Use `config` instead of reading `task_master.config.yaml`
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Hooks the config file may reference
    pub fn hooks(mut self, hook_table: HookTable) -> Self {
        self.hook_table = hook_table;
        self
    }

    /// Compiled-in task modules, matched against `.rs` files in the tasks tree
    pub fn modules(mut self, modules: StaticModules) -> Self {
        self.modules = modules;
        self
    }

    /// Start from a registry with tasks already registered
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Init: load the config, resolve its hooks, set up discovery
    pub fn build(self) -> Result<Runner> {
        enter(Stage::Init);

        let config = match self.config {
            Some(config) => config,
            None => Config::load(&self.root)?,
        };
        let hooks = self.hook_table.resolve(&config)?;
        debug!(?hooks, tasks_module = %config.tasks_module, "Hooks resolved");

        let discovery = Discovery::new(&self.root, config.tasks_module.clone())
            .with_loader(ManifestLoader::new(config.defaults.clone()))
            .with_loader(self.modules);

        Ok(Runner {
            config,
            hooks,
            registry: self.registry,
            discovery,
        })
    }
}

/// Runs one task per call through the full lifecycle
pub struct Runner {
    config: Config,
    hooks: Hooks,
    registry: Registry,
    discovery: Discovery,
}

impl Runner {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the task named by the first token; returns the final arguments
    ///
    /// `tokens` is the command line without the program name, task name
    /// first.
    pub fn run<I, T>(&mut self, tokens: I) -> Result<Arguments>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();

        enter(Stage::PreParseHook);
        if let Some(hook) = &self.hooks.pre_parse {
            hook().map_err(|error| TaskMasterError::HookFailed {
                stage: "pre-parse",
                error,
            })?;
        }

        enter(Stage::Resolve);
        let name = match tokens.first() {
            Some(first) if !first.starts_with("--") => first.clone(),
            other => {
                self.discovery.load_all(&mut self.registry)?;
                return Err(TaskMasterError::UnknownTask {
                    requested: other.cloned().unwrap_or_default(),
                    known: self.registry.names(),
                });
            }
        };
        let task = self.discovery.resolve(&name, &mut self.registry)?;

        enter(Stage::Parse);
        // the task name binds the base schema's `task` field
        let mut args = schema::parse(task.schema(), tokens)?;

        enter(Stage::PostParseHook);
        if let Some(hook) = &self.hooks.post_parse {
            hook(&mut args).map_err(|error| TaskMasterError::HookFailed {
                stage: "post-parse",
                error,
            })?;
        }

        enter(Stage::Execute);
        let kwargs = if task.uses_synthesized_schema() {
            Kwargs::from_arguments(&args, self.registry.base())
        } else {
            Kwargs::default()
        };
        let start = Instant::now();
        task.handler()
            .call(&mut args, &kwargs)
            .map_err(|error| TaskMasterError::TaskFailed {
                task: name.clone(),
                error,
            })?;
        info!(task = %name, elapsed_ms = start.elapsed().as_millis() as u64, "Task finished");

        enter(Stage::PostTaskHook);
        if let Some(hook) = &self.hooks.post_task {
            hook(&mut args).map_err(|error| TaskMasterError::HookFailed {
                stage: "post-task",
                error,
            })?;
        }

        enter(Stage::Terminal);
        Ok(args)
    }
}
