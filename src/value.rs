//! Typed argument values and string coercion
//!
//! Every field value travels as a [`Value`] tagged with its [`ValueKind`].
//! Command-line tokens are coerced with pure functions: booleans accept a
//! fixed truth-token set, lists are split on a delimiter.

use std::fmt;

use serde::Deserialize;

/// Tokens that coerce to `true` (compared case-insensitively)
pub const TRUE_TOKENS: &[&str] = &["true", "t", "1", "yes", "y"];

/// Tokens that coerce to `false` (compared case-insensitively)
pub const FALSE_TOKENS: &[&str] = &["false", "no", "0"];

/// Default delimiter for list fields
pub const DEFAULT_DELIMITER: char = ',';

/// Declared type of a field or parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[serde(alias = "str")]
    String,
    #[serde(alias = "int")]
    Integer,
    Float,
    #[serde(alias = "bool")]
    Boolean,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

/// A concrete field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<String>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Render for command templates: lists are joined with spaces
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::List(items) => items.join(" "),
            other => other.to_string(),
        }
    }

    /// Convert a YAML scalar (or sequence, for lists) into a value of `kind`.
    ///
    /// Strings go through the same coercion as command-line tokens, so
    /// `debug_mode: "yes"` and `debug_mode: true` mean the same thing.
    pub fn from_yaml(kind: ValueKind, yaml: &serde_yaml::Value) -> Result<Value, String> {
        use serde_yaml::Value as Yaml;

        match (kind, yaml) {
            (_, Yaml::String(s)) => coerce(kind, s, DEFAULT_DELIMITER),
            (ValueKind::String, Yaml::Number(n)) => Ok(Value::String(n.to_string())),
            (ValueKind::String, Yaml::Bool(b)) => Ok(Value::String(b.to_string())),
            (ValueKind::Integer, Yaml::Number(n)) => n
                .as_i64()
                .map(Value::Integer)
                .ok_or_else(|| format!("'{}' is not an integer", n)),
            (ValueKind::Float, Yaml::Number(n)) => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("'{}' is not a float", n)),
            (ValueKind::Boolean, Yaml::Bool(b)) => Ok(Value::Boolean(*b)),
            (ValueKind::Boolean, Yaml::Number(n)) => coerce(kind, &n.to_string(), DEFAULT_DELIMITER),
            (ValueKind::List, Yaml::Sequence(items)) => items
                .iter()
                .map(|item| match item {
                    Yaml::String(s) => Ok(s.clone()),
                    Yaml::Number(n) => Ok(n.to_string()),
                    Yaml::Bool(b) => Ok(b.to_string()),
                    _ => Err("list items must be scalars".to_string()),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (_, Yaml::Null) => Err("value is null".to_string()),
            _ => Err(format!("cannot use this YAML value as {}", kind)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

/// Coerce a raw token into a value of `kind`
pub fn coerce(kind: ValueKind, raw: &str, delimiter: char) -> Result<Value, String> {
    match kind {
        ValueKind::String => Ok(Value::String(raw.to_string())),
        ValueKind::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("invalid integer value: '{}'", raw)),
        ValueKind::Float => raw
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid float value: '{}'", raw)),
        ValueKind::Boolean => to_bool(raw).map(Value::Boolean),
        ValueKind::List => Ok(Value::List(to_list(raw, delimiter))),
    }
}

/// Boolean-like token to `bool`
pub fn to_bool(raw: &str) -> Result<bool, String> {
    let token = raw.trim();
    if TRUE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(token)) {
        Ok(true)
    } else if FALSE_TOKENS.iter().any(|t| t.eq_ignore_ascii_case(token)) {
        Ok(false)
    } else {
        Err(format!(
            "invalid boolean value: '{}' (expected one of {} or {})",
            raw,
            TRUE_TOKENS.join("/"),
            FALSE_TOKENS.join("/")
        ))
    }
}

/// Delimited string to an ordered list
pub fn to_list(raw: &str, delimiter: char) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(delimiter).map(str::to_string).collect()
}

/// Extraction of a Rust type from a [`Value`]
pub trait FromValue: Sized {
    const KIND: ValueKind;

    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for String {
    const KIND: ValueKind = ValueKind::String;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    const KIND: ValueKind = ValueKind::Integer;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    const KIND: ValueKind = ValueKind::Float;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }
}

impl FromValue for bool {
    const KIND: ValueKind = ValueKind::Boolean;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for Vec<String> {
    const KIND: ValueKind = ValueKind::List;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::List(items.into_iter().map(str::to_string).collect())
    }
}
