use serde_json::{Map, Value};

use crate::codec::document::{stringify_id, Identifier, RelationshipData};
use crate::error::StoreError;

/// A resource object pulled apart for the store: type and id normalized,
/// attributes raw, relationship entries reduced to linkage. Relationship
/// entries without a `data` member are meta-only placeholders and are
/// dropped here, so applying a parsed resource never clobbers linkage the
/// server did not send.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ParsedResource {
    pub(crate) type_name: String,
    pub(crate) id: String,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) relationships: Vec<(String, RelationshipData)>,
    pub(crate) meta: Option<Value>,
}

impl ParsedResource {
    pub(crate) fn identifier(&self) -> Identifier {
        Identifier::new(self.type_name.clone(), self.id.clone())
    }
}

pub(crate) fn parse_resource(value: &Value) -> Result<ParsedResource, StoreError> {
    let object = value.as_object().ok_or_else(|| {
        StoreError::InvalidDocument("resource must be an object".to_string())
    })?;

    let type_name = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StoreError::InvalidDocument("resource is missing a string \"type\"".to_string())
        })?
        .to_string();
    let id = object
        .get("id")
        .and_then(stringify_id)
        .ok_or_else(|| {
            StoreError::InvalidDocument(format!("resource of type {} has no usable id", type_name))
        })?;

    let attributes = match object.get("attributes") {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err(StoreError::InvalidDocument(
                "resource attributes must be an object".to_string(),
            ))
        }
    };

    let mut relationships = Vec::new();
    if let Some(section) = object.get("relationships") {
        let entries = section.as_object().ok_or_else(|| {
            StoreError::InvalidDocument("resource relationships must be an object".to_string())
        })?;
        for (name, entry) in entries {
            let entry_object = entry.as_object().ok_or_else(|| {
                StoreError::InvalidDocument(format!("relationship {} must be an object", name))
            })?;
            match entry_object.get("data") {
                None => continue,
                Some(data) => relationships.push((name.clone(), parse_relationship_data(data)?)),
            }
        }
    }

    Ok(ParsedResource {
        type_name,
        id,
        attributes,
        relationships,
        meta: object.get("meta").cloned(),
    })
}

fn parse_relationship_data(value: &Value) -> Result<RelationshipData, StoreError> {
    match value {
        Value::Null => Ok(RelationshipData::One(None)),
        Value::Object(_) => Ok(RelationshipData::One(Some(parse_identifier(value)?))),
        Value::Array(items) => {
            let mut identifiers = Vec::with_capacity(items.len());
            for item in items {
                identifiers.push(parse_identifier(item)?);
            }
            Ok(RelationshipData::Many(identifiers))
        }
        _ => Err(StoreError::InvalidDocument(
            "relationship data must be null, an object, or an array".to_string(),
        )),
    }
}

fn parse_identifier(value: &Value) -> Result<Identifier, StoreError> {
    let object = value.as_object().ok_or_else(|| {
        StoreError::InvalidDocument("resource identifier must be an object".to_string())
    })?;
    let type_name = object.get("type").and_then(Value::as_str).ok_or_else(|| {
        StoreError::InvalidDocument("resource identifier is missing a string \"type\"".to_string())
    })?;
    let id = object.get("id").and_then(stringify_id).ok_or_else(|| {
        StoreError::InvalidDocument(format!(
            "resource identifier of type {} has no usable id",
            type_name
        ))
    })?;
    Ok(Identifier::new(type_name, id))
}
