//! YAML task files
//!
//! A manifest declares explicit schemas and shell-command tasks. Loading a
//! manifest registers its tasks; running one renders its `run` templates
//! against the parsed arguments (see [`crate::exec`]).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::discovery::{ModuleLoader, ModuleRef};
use crate::error::{Result, TaskMasterError};
use crate::exec;
use crate::registry::{Handler, Parameter, Registry};
use crate::schema::{FieldSpec, Schema, SchemaBuilder};
use crate::value::{Value, ValueKind};

/// Schema name that refers to the registry's base schema in `extends`
pub const BASE_REFERENCE: &str = "base";

fn default_extends() -> Vec<String> {
    vec![BASE_REFERENCE.to_string()]
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Schema declarations, in order (later ones may extend earlier ones)
    #[serde(default)]
    pub schemas: serde_yaml::Mapping,
    #[serde(default)]
    pub tasks: Vec<TaskDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    #[serde(default = "default_extends")]
    pub extends: Vec<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default = "default_true")]
    pub with_base_defaults: bool,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default)]
    pub main: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub read_only: Option<bool>,
    #[serde(default)]
    pub short: Option<char>,
    #[serde(default)]
    pub delimiter: Option<char>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub short: Option<char>,
}

/// One or more shell commands
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RunSpec {
    One(String),
    Many(Vec<String>),
}

impl RunSpec {
    pub fn commands(&self) -> Vec<String> {
        match self {
            RunSpec::One(command) => vec![command.clone()],
            RunSpec::Many(commands) => commands.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDecl {
    /// Defaults to the file stem
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// Name of an explicit schema declared in `schemas`
    #[serde(default)]
    pub args: Option<String>,
    pub run: RunSpec,
}

impl Manifest {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
    }
}

/// Loads `.yaml` / `.yml` task files
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    defaults: serde_yaml::Mapping,
}

impl ManifestLoader {
    /// `defaults` supplies field defaults to every manifest schema
    pub fn new(defaults: serde_yaml::Mapping) -> Self {
        Self { defaults }
    }

    /// Register every task declared in the manifest at `path`
    pub fn load_file(&self, path: &Path, registry: &mut Registry) -> Result<()> {
        let content = fs::read_to_string(path)?;
        let manifest = Manifest::from_yaml(&content).map_err(|e| parse_error(path, e))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        self.register_manifest(manifest, stem, path, registry)
    }

    fn register_manifest(
        &self,
        manifest: Manifest,
        stem: &str,
        path: &Path,
        registry: &mut Registry,
    ) -> Result<()> {
        let schemas = self.compile_schemas(&manifest.schemas, path, registry)?;

        for decl in manifest.tasks {
            let name = decl.name.clone().unwrap_or_else(|| stem.to_string());

            let explicit = match &decl.args {
                Some(reference) => Some(schemas.get(reference).cloned().ok_or_else(|| {
                    parse_error(
                        path,
                        format!("task '{}' uses unknown schema '{}'", name, reference),
                    )
                })?),
                None => None,
            };

            let mut params = Vec::with_capacity(decl.params.len());
            for param in &decl.params {
                params.push(to_parameter(param).map_err(|reason| {
                    parse_error(path, format!("task '{}': {}", name, reason))
                })?);
            }

            let commands = decl.run.commands();
            let mut handler = Handler::new(name.clone(), move |args, _| exec::run_commands(&commands, args))
                .params(params);
            if let Some(help) = decl.help {
                handler = handler.about(help);
            }

            registry.register(Some(&name), handler, explicit)?;
            debug!(task = %name, path = %path.display(), "Registered manifest task");
        }
        Ok(())
    }

    fn compile_schemas(
        &self,
        declared: &serde_yaml::Mapping,
        path: &Path,
        registry: &Registry,
    ) -> Result<HashMap<String, Arc<Schema>>> {
        let mut compiled: HashMap<String, Arc<Schema>> = HashMap::new();

        for (key, value) in declared {
            let name = key
                .as_str()
                .ok_or_else(|| parse_error(path, "schema names must be strings"))?
                .to_string();
            let decl: SchemaDecl = serde_yaml::from_value(value.clone())
                .map_err(|e| parse_error(path, format!("schema '{}': {}", name, e)))?;

            let mut builder = SchemaBuilder::new(name.clone())
                .read_only(decl.read_only)
                .with_base_defaults(decl.with_base_defaults);
            if let Some(help) = decl.help {
                builder = builder.about(help);
            }

            for base in &decl.extends {
                let schema = if base == BASE_REFERENCE {
                    Arc::clone(registry.base())
                } else {
                    compiled.get(base).cloned().ok_or_else(|| {
                        parse_error(
                            path,
                            format!(
                                "schema '{}' extends '{}', which is not declared before it",
                                name, base
                            ),
                        )
                    })?
                };
                builder = builder.extends(schema);
            }

            for field in &decl.fields {
                let spec = to_field_spec(field)
                    .map_err(|reason| parse_error(path, format!("schema '{}': {}", name, reason)))?;
                builder = builder.field(spec);
            }

            let schema = builder.compile(Some(&self.defaults))?;
            compiled.insert(name, schema);
        }
        Ok(compiled)
    }
}

impl ModuleLoader for ManifestLoader {
    fn extensions(&self) -> &[&'static str] {
        &["yaml", "yml"]
    }

    fn load(&self, module: &ModuleRef, registry: &mut Registry) -> Result<()> {
        self.load_file(&module.path, registry)
    }
}

fn to_field_spec(decl: &FieldDecl) -> std::result::Result<FieldSpec, String> {
    let mut spec = FieldSpec::new(decl.name.clone(), decl.kind);
    if decl.main {
        spec = spec.main();
    }
    if decl.required {
        spec = spec.required();
    }
    if let Some(delimiter) = decl.delimiter {
        spec = spec.delimiter(delimiter);
    }
    if let Some(default) = &decl.default {
        spec = spec.default_value(yaml_default(&decl.name, decl.kind, decl.delimiter, default)?);
    }
    if let Some(help) = &decl.help {
        spec = spec.help(help.clone());
    }
    if let Some(read_only) = decl.read_only {
        spec = spec.read_only(read_only);
    }
    if let Some(short) = decl.short {
        spec = spec.short(short);
    }
    Ok(spec)
}

fn to_parameter(decl: &ParamDecl) -> std::result::Result<Parameter, String> {
    let mut param = match decl.kind {
        Some(kind) => Parameter::new(decl.name.clone(), kind),
        None => Parameter::untyped(decl.name.clone()),
    };
    if let (Some(kind), Some(default)) = (decl.kind, &decl.default) {
        param = param.default_value(yaml_default(&decl.name, kind, None, default)?);
    }
    if let Some(help) = &decl.help {
        param = param.help(help.clone());
    }
    if let Some(short) = decl.short {
        param = param.short(short);
    }
    Ok(param)
}

/// YAML default → value, honouring a custom list delimiter for string input
fn yaml_default(
    name: &str,
    kind: ValueKind,
    delimiter: Option<char>,
    yaml: &serde_yaml::Value,
) -> std::result::Result<Value, String> {
    let converted = match (kind, delimiter, yaml) {
        (ValueKind::List, Some(delimiter), serde_yaml::Value::String(raw)) => {
            crate::value::coerce(kind, raw, delimiter)
        }
        _ => Value::from_yaml(kind, yaml),
    };
    converted.map_err(|reason| format!("bad default for '{}': {}", name, reason))
}

fn parse_error(path: &Path, details: impl ToString) -> TaskMasterError {
    TaskMasterError::ManifestParse {
        path: path.to_path_buf(),
        details: details.to_string(),
    }
}
