use std::sync::Arc;

use serde_json::Value;

/// A single failed check, as reported against one attribute. `key` is a
/// stable machine-readable name for the failure kind; `message` is for
/// humans.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationFailure {
    pub key: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationFailure {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn blank() -> Self {
        ValidationFailure::new("blank", "can't be blank")
    }
}

pub type Validator = Arc<dyn Fn(&Value) -> Option<ValidationFailure> + Send + Sync>;

/// Declared validation rule: a named check bound to one attribute. A record
/// fails validation when any rule returns a failure for the attribute's
/// current value.
#[derive(Clone)]
pub struct ValidationDefinition {
    pub attribute: String,
    pub check: Validator,
}

impl ValidationDefinition {
    pub fn new(attribute: impl Into<String>, check: Validator) -> Self {
        ValidationDefinition {
            attribute: attribute.into(),
            check,
        }
    }

    /// Requires a present value: `Null` and `""` fail, anything else
    /// passes (including whitespace-only strings).
    pub fn presence(attribute: impl Into<String>) -> Self {
        ValidationDefinition::new(
            attribute,
            Arc::new(|value| match value {
                Value::Null => Some(ValidationFailure::blank()),
                Value::String(s) if s.is_empty() => Some(ValidationFailure::blank()),
                _ => None,
            }),
        )
    }
}

impl std::fmt::Debug for ValidationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationDefinition")
            .field("attribute", &self.attribute)
            .finish()
    }
}
