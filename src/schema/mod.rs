//! Argument schemas
//!
//! A schema is declared once (own fields, base schemas, schema-level
//! read-only flag, optional defaults source) and compiled into an ordered,
//! inheritance-resolved field table that every parse call reuses.
//!
//! ## Field order
//!
//! Own fields come first, followed by the fields of each base schema in
//! declaration order. An own field overrides an inherited field of the same
//! name; two bases contributing the same name is a conflict.
//!
//! ## Positional slots
//!
//! Each schema declares at most one main field. Inherited main fields keep
//! their slots (base order), and the schema's own main field takes the next
//! one, so `BaseArgs.task` binds the first token and a task's own main field
//! the token after it.
//!
//! ## Read-only resolution
//!
//! - explicit `read_only: true/false` on the field always wins
//! - otherwise the declaring schema's flag applies, and an inherited field
//!   also keeps the status it was compiled with in its defining schema

pub mod arguments;
pub mod parser;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TaskMasterError};
use crate::value::{coerce, Value, ValueKind, DEFAULT_DELIMITER};

pub use arguments::Arguments;
pub use parser::parse;

/// Names that no field may take (reserved by the parser)
pub const RESERVED_FIELD_NAMES: &[&str] = &["help"];

/// Callback run on every freshly parsed instance of a schema
pub type PostParseFn = Arc<dyn Fn(&mut Arguments) -> anyhow::Result<()> + Send + Sync>;

/// One declared field, before compilation
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    kind: ValueKind,
    main: bool,
    required: bool,
    default: Option<Value>,
    help: String,
    read_only: Option<bool>,
    short: Option<char>,
    delimiter: char,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            main: false,
            required: false,
            default: None,
            help: String::new(),
            read_only: None,
            short: None,
            delimiter: DEFAULT_DELIMITER,
        }
    }

    /// Bind this field to the positional slot
    pub fn main(mut self) -> Self {
        self.main = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Explicit read-only status; leaving it unset inherits the schema's
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// One compiled field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    name: String,
    kind: ValueKind,
    main: bool,
    required: bool,
    default: Option<Value>,
    help: String,
    read_only: bool,
    explicit_read_only: Option<bool>,
    short: Option<char>,
    delimiter: char,
    position: Option<usize>,
}

impl FieldDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn is_main(&self) -> bool {
        self.main
    }

    /// Zero-based positional slot of a main field
    pub fn position(&self) -> Option<usize> {
        self.position
    }

    /// Required when declared so, or when nothing supplies a default
    pub fn is_required(&self) -> bool {
        self.required || self.default.is_none()
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn short(&self) -> Option<char> {
        self.short
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// `--debug-mode` spelling for `debug_mode`
    pub fn kebab_alias(&self) -> Option<String> {
        self.name
            .contains('_')
            .then(|| self.name.replace('_', "-"))
    }

    /// Coerce a raw command-line token into this field's type
    pub fn coerce(&self, raw: &str) -> Result<Value, String> {
        coerce(self.kind, raw, self.delimiter)
    }
}

/// Source of defaults for fields that declare none (e.g. a config file)
pub trait DefaultsSource {
    /// Default for `field`, converted to `kind`. `Ok(None)` when absent.
    fn default_for(&self, field: &str, kind: ValueKind) -> Result<Option<Value>, String>;
}

impl DefaultsSource for HashMap<String, Value> {
    fn default_for(&self, field: &str, kind: ValueKind) -> Result<Option<Value>, String> {
        match self.get(field) {
            Some(value) if value.kind() == kind => Ok(Some(value.clone())),
            Some(value) => Err(format!("expected {}, got {}", kind, value.kind())),
            None => Ok(None),
        }
    }
}

impl DefaultsSource for serde_yaml::Mapping {
    fn default_for(&self, field: &str, kind: ValueKind) -> Result<Option<Value>, String> {
        match self.get(field) {
            Some(yaml) => Value::from_yaml(kind, yaml).map(Some),
            None => Ok(None),
        }
    }
}

/// Compiled, inheritance-resolved schema
pub struct Schema {
    name: String,
    about: Option<String>,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
    post_parse: Option<PostParseFn>,
}

impl Schema {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description shown at the top of `--help`
    pub fn about(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Main fields in positional order
    pub fn positionals(&self) -> Vec<&FieldDescriptor> {
        let mut mains: Vec<&FieldDescriptor> = self.fields.iter().filter(|f| f.main).collect();
        mains.sort_by_key(|f| f.position);
        mains
    }

    pub fn post_parse(&self) -> Option<&PostParseFn> {
        self.post_parse.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("post_parse", &self.post_parse.is_some())
            .finish()
    }
}

/// Declarative schema definition, compiled with [`SchemaBuilder::compile`]
pub struct SchemaBuilder {
    name: String,
    about: Option<String>,
    fields: Vec<FieldSpec>,
    bases: Vec<Arc<Schema>>,
    read_only: bool,
    with_base_defaults: bool,
    post_parse: Option<PostParseFn>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            about: None,
            fields: Vec::new(),
            bases: Vec::new(),
            read_only: false,
            with_base_defaults: true,
            post_parse: None,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn extends(mut self, base: Arc<Schema>) -> Self {
        self.bases.push(base);
        self
    }

    /// Schema-level read-only flag for fields without an explicit status
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// When `false`, the defaults source takes precedence over inherited
    /// defaults of non-required base fields.
    pub fn with_base_defaults(mut self, with_base_defaults: bool) -> Self {
        self.with_base_defaults = with_base_defaults;
        self
    }

    pub fn post_parse<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_parse = Some(Arc::new(callback));
        self
    }

    /// Resolve inheritance, merge defaults and read-only status
    pub fn compile(self, defaults: Option<&dyn DefaultsSource>) -> Result<Arc<Schema>> {
        let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(self.fields.len());
        let mut own_main: Option<&str> = None;

        for spec in &self.fields {
            validate_field_name(&self.name, &spec.name)?;
            if fields.iter().any(|f| f.name == spec.name) {
                return Err(self.conflict(&spec.name, "declared twice".to_string()));
            }
            if spec.main {
                if let Some(first) = own_main {
                    return Err(self.invalid(
                        &spec.name,
                        &format!("only one main field is allowed, '{}' is already main", first),
                    ));
                }
                own_main = Some(&spec.name);
            }
            if spec.required && spec.default.is_some() {
                return Err(self.invalid(&spec.name, "a required field cannot have a default"));
            }
            if let Some(default) = &spec.default {
                if default.kind() != spec.kind {
                    return Err(self.invalid(
                        &spec.name,
                        &format!("default is {} but the field is {}", default.kind(), spec.kind),
                    ));
                }
            }

            let default = match (&spec.default, defaults) {
                (Some(default), _) => Some(default.clone()),
                (None, Some(source)) if !spec.required => self.lookup(source, &spec.name, spec.kind)?,
                _ => None,
            };

            fields.push(FieldDescriptor {
                name: spec.name.clone(),
                kind: spec.kind,
                main: spec.main,
                required: spec.required,
                default,
                help: spec.help.clone(),
                read_only: spec.read_only.unwrap_or(self.read_only),
                explicit_read_only: spec.read_only,
                short: spec.short,
                delimiter: spec.delimiter,
                position: None,
            });
        }

        let own_count = fields.len();
        let mut inherited_from: HashMap<String, String> = HashMap::new();
        let mut next_position = 0;

        for base in &self.bases {
            let first_inherited = fields.len();
            for field in &base.fields {
                if fields[..own_count].iter().any(|f| f.name == field.name) {
                    continue;
                }
                if let Some(previous) = inherited_from.get(&field.name) {
                    return Err(self.conflict(
                        &field.name,
                        format!(
                            "declared by both base schemas '{}' and '{}'",
                            previous, base.name
                        ),
                    ));
                }
                inherited_from.insert(field.name.clone(), base.name.clone());

                let mut inherited = field.clone();
                inherited.read_only = field
                    .explicit_read_only
                    .unwrap_or(self.read_only || field.read_only);

                if !self.with_base_defaults && !field.required {
                    if let Some(source) = defaults {
                        if let Some(value) = self.lookup(source, &field.name, field.kind)? {
                            inherited.default = Some(value);
                        }
                    }
                }
                fields.push(inherited);
            }

            // renumber this base's surviving slots after the previous bases'
            let mut mains: Vec<&mut FieldDescriptor> = fields[first_inherited..]
                .iter_mut()
                .filter(|f| f.main)
                .collect();
            mains.sort_by_key(|f| f.position);
            for field in mains {
                field.position = Some(next_position);
                next_position += 1;
            }
        }

        if let Some(field) = fields[..own_count].iter_mut().find(|f| f.main) {
            field.position = Some(next_position);
        }

        self.check_layout(&fields)?;

        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();

        Ok(Arc::new(Schema {
            name: self.name,
            about: self.about,
            fields,
            index,
            post_parse: self.post_parse,
        }))
    }

    /// No required slot after an optional one, no main short alias, no
    /// flag collisions
    fn check_layout(&self, fields: &[FieldDescriptor]) -> Result<()> {
        let mut mains: Vec<&FieldDescriptor> = fields.iter().filter(|f| f.main).collect();
        mains.sort_by_key(|f| f.position);
        for pair in mains.windows(2) {
            if !pair[0].is_required() && pair[1].is_required() {
                return Err(self.invalid(
                    &pair[1].name,
                    &format!(
                        "a required main field can't follow the optional main field '{}'",
                        pair[0].name
                    ),
                ));
            }
        }

        let mut longs: HashMap<String, &str> = HashMap::new();
        let mut shorts: HashMap<char, &str> = HashMap::new();

        for field in fields {
            if field.main {
                if field.short.is_some() {
                    return Err(self.invalid(&field.name, "a main field cannot have a short alias"));
                }
                continue;
            }

            let spellings = std::iter::once(field.name.clone()).chain(field.kebab_alias());
            for spelling in spellings {
                if let Some(owner) = longs.insert(spelling.clone(), &field.name) {
                    if owner != field.name {
                        return Err(self.conflict(
                            &field.name,
                            format!("flag --{} is also used by '{}'", spelling, owner),
                        ));
                    }
                }
            }

            if let Some(short) = field.short {
                if !short.is_ascii_alphanumeric() {
                    return Err(self.invalid(&field.name, "short alias must be a letter or digit"));
                }
                if let Some(owner) = shorts.insert(short, &field.name) {
                    return Err(self.conflict(
                        &field.name,
                        format!("short flag -{} is also used by '{}'", short, owner),
                    ));
                }
            }
        }
        Ok(())
    }

    fn lookup(
        &self,
        source: &dyn DefaultsSource,
        field: &str,
        kind: ValueKind,
    ) -> Result<Option<Value>> {
        source
            .default_for(field, kind)
            .map_err(|reason| self.invalid(field, &format!("configured default: {}", reason)))
    }

    fn conflict(&self, field: &str, reason: String) -> TaskMasterError {
        TaskMasterError::SchemaConflict {
            schema: self.name.clone(),
            field: field.to_string(),
            reason,
        }
    }

    fn invalid(&self, field: &str, reason: &str) -> TaskMasterError {
        TaskMasterError::InvalidField {
            schema: self.name.clone(),
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Field names: `[A-Za-z_][A-Za-z0-9_]*`, not reserved
///
/// Manual single-pass check; dashes are excluded so the kebab alias of a
/// field can never be another field's name.
pub fn validate_field_name(schema: &str, name: &str) -> Result<()> {
    let invalid = |reason: &str| TaskMasterError::InvalidField {
        schema: schema.to_string(),
        field: name.to_string(),
        reason: reason.to_string(),
    };

    let first = match name.as_bytes().first() {
        Some(&b) => b,
        None => return Err(invalid("cannot be empty")),
    };
    if !first.is_ascii_alphabetic() && first != b'_' {
        return Err(invalid("must start with a letter or underscore"));
    }
    if !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
        return Err(invalid("may only contain letters, digits and underscores"));
    }
    if RESERVED_FIELD_NAMES.contains(&name) {
        return Err(invalid("name is reserved"));
    }
    Ok(())
}
