//! Task registry
//!
//! Maps task names to [`Task`] definitions. A task either runs against an
//! explicit schema (or the plain base schema), or against a schema
//! synthesized from its handler's declared parameters, in which case the
//! runner unpacks the parsed fields into [`Kwargs`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::base_args;
use crate::error::{Result, TaskMasterError};
use crate::schema::{Arguments, FieldSpec, Schema, SchemaBuilder};
use crate::value::{FromValue, Value, ValueKind};

/// Handler body: the parsed arguments plus the unpacked synthesized fields
pub type HandlerFn = dyn Fn(&mut Arguments, &Kwargs) -> anyhow::Result<()> + Send + Sync;

/// Prefix of synthesized schema names
pub const SYNTHESIZED_PREFIX: &str = "DynamicArgs_";

/// One declared handler parameter
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    annotation: Option<ValueKind>,
    default: Option<Value>,
    help: Option<String>,
    short: Option<char>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            annotation: Some(kind),
            default: None,
            help: None,
            short: None,
        }
    }

    /// A parameter without a type annotation (rejected at registration)
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
            help: None,
            short: None,
        }
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> Option<ValueKind> {
        self.annotation
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn generated_help(&self, kind: ValueKind) -> String {
        let requirement = match &self.default {
            None => "required.".to_string(),
            Some(default) => format!("optional and has the default value {}.", default),
        };
        format!(
            "Automatically generated hint for {}. Type should be {}. This parameter is {}",
            self.name, kind, requirement
        )
    }
}

/// A callable task body with its declared signature
#[derive(Clone)]
pub struct Handler {
    ident: String,
    about: Option<String>,
    params: Vec<Parameter>,
    func: Arc<HandlerFn>,
}

impl Handler {
    pub fn new<F>(ident: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Arguments, &Kwargs) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            ident: ident.into(),
            about: None,
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(mut self, params: impl IntoIterator<Item = Parameter>) -> Self {
        self.params.extend(params);
        self
    }

    /// Description for the synthesized schema's `--help`
    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// The handler's own identifier, used when no task name is given
    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    pub fn call(&self, args: &mut Arguments, kwargs: &Kwargs) -> anyhow::Result<()> {
        (self.func)(args, kwargs)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("ident", &self.ident)
            .field("params", &self.params)
            .finish()
    }
}

/// Build a [`Handler`] from a function, using the function's name as the
/// handler identifier.
///
/// ```ignore
/// registry.register(None, handler!(greet, Parameter::new("name", ValueKind::String)), None)?;
/// ```
#[macro_export]
macro_rules! handler {
    ($func:ident $(, $param:expr)* $(,)?) => {
        $crate::registry::Handler::new(stringify!($func), $func)$(.param($param))*
    };
}

/// Synthesized fields unpacked from the parsed arguments, in field order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Kwargs {
    entries: Vec<(String, Value)>,
}

impl Kwargs {
    /// Every field of `args` that the base schema doesn't declare
    pub fn from_arguments(args: &Arguments, base: &Schema) -> Self {
        let entries = args
            .iter()
            .filter(|(name, _)| !base.contains(name))
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        Self { entries }
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.raw(name).ok_or_else(|| TaskMasterError::UnknownField {
            schema: "kwargs".to_string(),
            field: name.to_string(),
        })?;
        T::from_value(value).ok_or_else(|| TaskMasterError::TypeMismatch {
            field: name.to_string(),
            expected: T::KIND.to_string(),
            found: value.kind().to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A registered task
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    schema: Arc<Schema>,
    handler: Handler,
    uses_synthesized_schema: bool,
}

impl Task {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// When true the handler receives its parameters as [`Kwargs`]
    pub fn uses_synthesized_schema(&self) -> bool {
        self.uses_synthesized_schema
    }
}

/// Name → task mapping
#[derive(Debug)]
pub struct Registry {
    base: Arc<Schema>,
    tasks: HashMap<String, Task>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(base_args::schema())
    }
}

impl Registry {
    pub fn new(base: Arc<Schema>) -> Self {
        Self {
            base,
            tasks: HashMap::new(),
        }
    }

    pub fn base(&self) -> &Arc<Schema> {
        &self.base
    }

    /// Register `handler` under `name` (default: the handler's identifier)
    ///
    /// Handlers without parameters run against `explicit` or the base
    /// schema. Handlers with parameters get a synthesized schema extending
    /// the base one; combining them with `explicit` is an error.
    /// Re-registering a name replaces the previous task.
    pub fn register(
        &mut self,
        name: Option<&str>,
        handler: Handler,
        explicit: Option<Arc<Schema>>,
    ) -> Result<()> {
        let name = name.unwrap_or(handler.ident()).to_string();
        if name.is_empty() || name.starts_with('-') {
            return Err(dynamic(&name, "task names cannot be empty or start with '-'"));
        }

        let (schema, synthesized) = if handler.parameters().is_empty() {
            let schema = match explicit {
                Some(schema) => {
                    self.check_extends_base(&name, &schema)?;
                    schema
                }
                None => Arc::clone(&self.base),
            };
            (schema, false)
        } else {
            if explicit.is_some() {
                return Err(dynamic(
                    &name,
                    "a handler with parameters can't be registered together with an explicit schema",
                ));
            }
            (self.synthesize(&name, &handler)?, true)
        };

        let task = Task {
            name: name.clone(),
            schema,
            handler,
            uses_synthesized_schema: synthesized,
        };
        if self.tasks.insert(name.clone(), task).is_some() {
            debug!(task = %name, "Task re-registered, previous definition replaced");
        } else {
            debug!(task = %name, synthesized, "Task registered");
        }
        Ok(())
    }

    fn synthesize(&self, name: &str, handler: &Handler) -> Result<Arc<Schema>> {
        let mut fields = Vec::with_capacity(handler.parameters().len());
        let mut reserved = Vec::new();

        for param in handler.parameters() {
            let kind = param.annotation.ok_or_else(|| {
                dynamic(
                    name,
                    &format!("parameter '{}' has no type annotation", param.name),
                )
            })?;

            if self.base.contains(&param.name) {
                reserved.push(param.name.clone());
            }

            if let Some(default) = &param.default {
                if default.kind() != kind {
                    return Err(dynamic(
                        name,
                        &format!(
                            "default of parameter '{}' is {} but its type is {}",
                            param.name,
                            default.kind(),
                            kind
                        ),
                    ));
                }
            }

            let help = param
                .help
                .clone()
                .unwrap_or_else(|| param.generated_help(kind));
            let mut field = FieldSpec::new(param.name.clone(), kind).help(help);
            field = match &param.default {
                Some(default) => field.default_value(default.clone()),
                None => field.required(),
            };
            if let Some(short) = param.short {
                field = field.short(short);
            }
            fields.push(field);
        }

        if !reserved.is_empty() {
            return Err(dynamic(
                name,
                &format!(
                    "parameter names clash with {} fields: {}",
                    self.base.name(),
                    reserved.join(", ")
                ),
            ));
        }

        let mut builder = SchemaBuilder::new(format!("{}{}", SYNTHESIZED_PREFIX, name))
            .fields(fields)
            .extends(Arc::clone(&self.base));
        if let Some(about) = &handler.about {
            builder = builder.about(about.clone());
        }
        builder.compile(None)
    }

    fn check_extends_base(&self, name: &str, schema: &Schema) -> Result<()> {
        let missing: Vec<&str> = self
            .base
            .field_names()
            .filter(|field| !schema.contains(field))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(dynamic(
            name,
            &format!(
                "schema '{}' does not extend {} (missing: {})",
                schema.name(),
                self.base.name(),
                missing.join(", ")
            ),
        ))
    }

    pub fn get(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

fn dynamic(task: &str, reason: &str) -> TaskMasterError {
    TaskMasterError::DynamicArgument {
        task: task.to_string(),
        reason: reason.to_string(),
    }
}
