use serde::{Deserialize, Serialize};

/// What changed on a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// An attribute value was written.
    Attribute,
    /// A relationship was linked or unlinked.
    Relationship,
    /// The record itself appeared, was replaced, or was removed.
    Record,
}

/// Emitted on the store's `change` topic after every mutation. Payloads
/// cross the emitter as JSON strings, so listeners deserialize with
/// [`ChangeEvent::from_payload`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn attribute(
        type_name: impl Into<String>,
        id: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        ChangeEvent {
            type_name: type_name.into(),
            id: id.into(),
            property: Some(property.into()),
            kind: ChangeKind::Attribute,
        }
    }

    pub fn relationship(
        type_name: impl Into<String>,
        id: impl Into<String>,
        property: impl Into<String>,
    ) -> Self {
        ChangeEvent {
            type_name: type_name.into(),
            id: id.into(),
            property: Some(property.into()),
            kind: ChangeKind::Relationship,
        }
    }

    pub fn record(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        ChangeEvent {
            type_name: type_name.into(),
            id: id.into(),
            property: None,
            kind: ChangeKind::Record,
        }
    }

    pub fn to_payload(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_payload(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        let event = ChangeEvent::attribute("todos", "1", "title");
        let restored = ChangeEvent::from_payload(&event.to_payload()).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn record_events_omit_property() {
        let payload = ChangeEvent::record("todos", "1").to_payload();
        assert_eq!(payload, r#"{"type":"todos","id":"1","kind":"record"}"#);
    }

    #[test]
    fn kind_serializes_lowercase() {
        let payload = ChangeEvent::relationship("notes", "2", "todo").to_payload();
        assert!(payload.contains(r#""kind":"relationship""#));
    }
}
