//! Parsed argument instances

use std::fmt;
use std::sync::Arc;

use super::Schema;
use crate::error::{Result, TaskMasterError};
use crate::value::{FromValue, Value};

/// A parsed instance of a [`Schema`]: one value per field, in field order
#[derive(Clone)]
pub struct Arguments {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl Arguments {
    pub(crate) fn new(schema: Arc<Schema>, values: Vec<Value>) -> Self {
        debug_assert_eq!(schema.fields().len(), values.len());
        Self { schema, values }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema.position(name).map(|i| &self.values[i])
    }

    /// Typed read of a field
    pub fn value<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| self.unknown(name))?;
        T::from_value(value).ok_or_else(|| TaskMasterError::TypeMismatch {
            field: name.to_string(),
            expected: T::KIND.to_string(),
            found: value.kind().to_string(),
        })
    }

    /// Update a field after parsing
    ///
    /// Fails for read-only fields, unknown names and values whose kind
    /// doesn't match the field declaration.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self.schema.position(name).ok_or_else(|| self.unknown(name))?;
        let field = &self.schema.fields()[index];
        if field.is_read_only() {
            return Err(TaskMasterError::ReadOnlyViolation {
                schema: self.schema.name().to_string(),
                field: name.to_string(),
            });
        }

        let value = value.into();
        if value.kind() != field.kind() {
            return Err(TaskMasterError::TypeMismatch {
                field: name.to_string(),
                expected: field.kind().to_string(),
                found: value.kind().to_string(),
            });
        }

        self.values[index] = value;
        Ok(())
    }

    /// `(field name, value)` pairs in field order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema.field_names().zip(self.values.iter())
    }

    fn unknown(&self, name: &str) -> TaskMasterError {
        TaskMasterError::UnknownField {
            schema: self.schema.name().to_string(),
            field: name.to_string(),
        }
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let render = |value: &Value| match value {
            Value::String(s) => format!("'{}'", s),
            other => other.to_string(),
        };

        match self.values.len() {
            0 => write!(f, "<{}>", self.schema.name()),
            1 => {
                let (name, value) = (self.schema.fields()[0].name(), &self.values[0]);
                write!(f, "<{} {}={}>", self.schema.name(), name, render(value))
            }
            _ => {
                writeln!(f, "<{}", self.schema.name())?;
                for (name, value) in self.iter() {
                    writeln!(f, "\t{}={}", name, render(value))?;
                }
                write!(f, ">")
            }
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in self.iter() {
            map.entry(&name, value);
        }
        map.finish()
    }
}
