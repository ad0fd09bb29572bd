use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::ValidationFailure;
use crate::transport::TransportError;

/// One entry in a record's `errors` map.
///
/// Keys are attribute names for validation failures, `"status"` for a
/// non-2xx server response, `"network"` for a transport-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Validation failures for one attribute.
    Validation(Vec<ValidationFailure>),
    /// HTTP status of a rejected request.
    Status(u16),
    /// Raw transport error message.
    Network(String),
}

/// Error type for store, record, and codec operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A shared lock was poisoned during the named operation.
    LockPoisoned(&'static str),
    /// The resource type has no schema entry.
    UnknownType(String),
    /// The relationship is not declared on the resource type.
    UnknownRelationship { type_name: String, name: String },
    /// A fetch-backed operation was called on a store with no transport.
    NoTransport(&'static str),
    /// Malformed input: a wire document or call argument that cannot be
    /// interpreted (missing `type`, non-object attributes, ...).
    InvalidDocument(String),
    /// Local validation failed before any network call was made.
    /// Carries the record's serialized errors map.
    Validation {
        errors: HashMap<String, ErrorDetail>,
    },
    /// The transport collaborator failed (network-level, not HTTP status).
    Transport(TransportError),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::UnknownType(type_name) => {
                write!(f, "no schema entry for resource type {}", type_name)
            }
            StoreError::UnknownRelationship { type_name, name } => {
                write!(f, "relationship {} is not declared on {}", name, type_name)
            }
            StoreError::NoTransport(operation) => {
                write!(f, "no transport configured for {}", operation)
            }
            StoreError::InvalidDocument(msg) => write!(f, "invalid document: {}", msg),
            StoreError::Validation { errors } => {
                let mut keys: Vec<&str> = errors.keys().map(|k| k.as_str()).collect();
                keys.sort_unstable();
                write!(f, "validation failed for [{}]", keys.join(", "))
            }
            StoreError::Transport(e) => write!(f, "transport error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        StoreError::Transport(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let err = StoreError::UnknownType("todos".to_string());
        assert_eq!(err.to_string(), "no schema entry for resource type todos");

        let err = StoreError::UnknownRelationship {
            type_name: "todos".to_string(),
            name: "notes".to_string(),
        };
        assert_eq!(err.to_string(), "relationship notes is not declared on todos");
    }

    #[test]
    fn validation_display_lists_keys() {
        let mut errors = HashMap::new();
        errors.insert(
            "title".to_string(),
            ErrorDetail::Validation(vec![ValidationFailure::blank()]),
        );
        let err = StoreError::Validation { errors };
        assert_eq!(err.to_string(), "validation failed for [title]");
    }

    #[test]
    fn error_detail_serializes_like_a_plain_map() {
        let mut errors: HashMap<String, ErrorDetail> = HashMap::new();
        errors.insert("status".to_string(), ErrorDetail::Status(422));
        errors.insert(
            "title".to_string(),
            ErrorDetail::Validation(vec![ValidationFailure::blank()]),
        );

        let value = serde_json::to_value(&errors).unwrap();
        assert_eq!(value["status"], 422);
        assert_eq!(value["title"][0]["key"], "blank");
        assert_eq!(value["title"][0]["message"], "can't be blank");
    }

    #[test]
    fn transport_source() {
        let err = StoreError::Transport(TransportError::Request("refused".to_string()));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "transport error: request failed: refused");
    }
}
