use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use serde_json::Value;

/// Coercion applied to an attribute value when it is set and when it is
/// encoded. Coercion is lenient: a value that cannot be converted passes
/// through unchanged, and `Null` always passes through.
#[derive(Clone)]
pub enum DataType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    /// RFC 3339 timestamps are normalized; other strings pass through.
    DateTime,
    /// Caller-supplied coercion function.
    Custom(Arc<dyn Fn(Value) -> Value + Send + Sync>),
}

impl DataType {
    pub fn coerce(&self, value: Value) -> Value {
        if value.is_null() {
            return value;
        }

        match self {
            DataType::String => match value {
                Value::String(_) => value,
                Value::Number(n) => Value::String(n.to_string()),
                Value::Bool(b) => Value::String(b.to_string()),
                other => other,
            },
            DataType::Number => match value {
                Value::Number(_) => value,
                Value::String(s) => {
                    if let Ok(i) = s.parse::<i64>() {
                        Value::Number(i.into())
                    } else if let Some(f) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
                        Value::Number(f)
                    } else {
                        Value::String(s)
                    }
                }
                Value::Bool(b) => Value::Number(i64::from(b).into()),
                other => other,
            },
            DataType::Boolean => match value {
                Value::Bool(_) => value,
                Value::String(s) => match s.as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => Value::String(s),
                },
                other => other,
            },
            // Objects and arrays are already plain data.
            DataType::Object | DataType::Array => value,
            DataType::DateTime => match value {
                Value::String(s) => match DateTime::parse_from_rfc3339(&s) {
                    Ok(parsed) => Value::String(parsed.to_rfc3339()),
                    Err(_) => Value::String(s),
                },
                other => other,
            },
            DataType::Custom(coerce) => coerce(value),
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "String",
            DataType::Number => "Number",
            DataType::Boolean => "Boolean",
            DataType::Object => "Object",
            DataType::Array => "Array",
            DataType::DateTime => "DateTime",
            DataType::Custom(_) => "Custom",
        };
        write!(f, "DataType::{}", name)
    }
}

/// Declared attribute of a resource type. `id` is never declared as an
/// attribute; it is implicit on every record.
#[derive(Clone, Debug)]
pub struct AttributeDefinition {
    pub name: String,
    pub data_type: DataType,
    pub default: Option<Value>,
}

impl AttributeDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        AttributeDefinition {
            name: name.into(),
            data_type,
            default: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}
