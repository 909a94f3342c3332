//! Project configuration (`task_master.config.yaml`) and lifecycle hooks

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Result, TaskMasterError};
use crate::schema::Arguments;

pub const CONFIG_FILE_NAME: &str = "task_master.config.yaml";
pub const DEFAULT_TASKS_MODULE: &str = "tasks";

/// Built-in post-parse / post-task hook printing the arguments
pub const PRINT_ARGS_HOOK: &str = "task_master.print_args";

fn default_tasks_module() -> String {
    DEFAULT_TASKS_MODULE.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory (relative to the project root) scanned for task modules
    #[serde(default = "default_tasks_module")]
    pub tasks_module: String,

    #[serde(default)]
    pub pre_parse_func: Option<String>,

    #[serde(default)]
    pub post_parse_func: Option<String>,

    #[serde(default)]
    pub post_task_func: Option<String>,

    /// Field defaults for manifest schemas
    #[serde(default)]
    pub defaults: serde_yaml::Mapping,

    #[serde(flatten)]
    unknown: BTreeMap<String, serde_yaml::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tasks_module: default_tasks_module(),
            pre_parse_func: None,
            post_parse_func: None,
            post_task_func: None,
            defaults: serde_yaml::Mapping::new(),
            unknown: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load `task_master.config.yaml` from `dir`; a missing or empty file
    /// means the built-in defaults.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config = Self::from_yaml(&content).map_err(|details| TaskMasterError::ConfigParse {
            path: path.clone(),
            details,
        })?;
        debug!(path = %path.display(), tasks_module = %config.tasks_module, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, String> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
        if config.tasks_module.trim().is_empty() {
            return Err("tasks_module cannot be empty".to_string());
        }
        for key in config.unknown.keys() {
            warn!(key = %key, "Ignoring unknown config key");
        }
        Ok(config)
    }

    /// Keys present in the file that the config doesn't recognize
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }
}

pub type PreParseHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;
pub type ArgsHook = Arc<dyn Fn(&mut Arguments) -> anyhow::Result<()> + Send + Sync>;

/// Hooks referenceable from the config file, by name
pub struct HookTable {
    pre_parse: HashMap<String, PreParseHook>,
    with_args: HashMap<String, ArgsHook>,
}

impl Default for HookTable {
    fn default() -> Self {
        Self::new().args_hook(PRINT_ARGS_HOOK, |args| {
            println!("{}", args);
            Ok(())
        })
    }
}

impl HookTable {
    /// An empty table, without built-ins
    pub fn new() -> Self {
        Self {
            pre_parse: HashMap::new(),
            with_args: HashMap::new(),
        }
    }

    /// Hook usable as `pre_parse_func`
    pub fn pre_parse_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_parse.insert(name.into(), Arc::new(hook));
        self
    }

    /// Hook usable as `post_parse_func` or `post_task_func`
    pub fn args_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.with_args.insert(name.into(), Arc::new(hook));
        self
    }

    /// Look up the hooks `config` references
    pub fn resolve(&self, config: &Config) -> Result<Hooks> {
        let pre_parse = match &config.pre_parse_func {
            Some(reference) => Some(lookup(&self.pre_parse, "pre_parse_func", reference)?),
            None => None,
        };
        let post_parse = match &config.post_parse_func {
            Some(reference) => Some(lookup(&self.with_args, "post_parse_func", reference)?),
            None => None,
        };
        let post_task = match &config.post_task_func {
            Some(reference) => Some(lookup(&self.with_args, "post_task_func", reference)?),
            None => None,
        };
        Ok(Hooks {
            pre_parse,
            post_parse,
            post_task,
        })
    }
}

fn lookup<H: Clone>(table: &HashMap<String, H>, key: &str, reference: &str) -> Result<H> {
    table
        .get(reference)
        .cloned()
        .ok_or_else(|| TaskMasterError::HookNotFound {
            key: key.to_string(),
            reference: reference.to_string(),
        })
}

/// The hooks active for one run; unset hooks are no-ops
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_parse: Option<PreParseHook>,
    pub post_parse: Option<ArgsHook>,
    pub post_task: Option<ArgsHook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_parse", &self.pre_parse.is_some())
            .field("post_parse", &self.post_parse.is_some())
            .field("post_task", &self.post_task.is_some())
            .finish()
    }
}
