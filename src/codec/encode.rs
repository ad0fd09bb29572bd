use std::collections::HashSet;

use serde_json::{json, Value};

use crate::codec::document::{Identifier, RelationshipData, RelationshipObject, Resource};
use crate::error::StoreError;
use crate::record::{is_temp_id, Record};
use crate::schema::Cardinality;

/// Filters applied when encoding one record. `attributes: None` means all
/// declared attributes; `relationships: None` means no relationship section
/// at all. Relationships are only ever emitted when explicitly requested.
#[derive(Clone, Debug, Default)]
pub struct JsonapiOptions {
    pub attributes: Option<Vec<String>>,
    pub relationships: Option<Vec<String>>,
}

impl JsonapiOptions {
    pub fn new() -> Self {
        JsonapiOptions::default()
    }

    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_relationships<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relationships = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

/// Encodes one record as a `{data}` document.
pub fn to_full_jsonapi(record: &Record, options: &JsonapiOptions) -> Result<Value, StoreError> {
    let resource = encode_resource(record, options)?;
    Ok(json!({ "data": as_value(&resource)? }))
}

/// Encodes one record plus everything reachable from its relationships as a
/// full `{data, included}` document string, the shape a server would send.
pub fn server_response(record: &Record) -> Result<String, StoreError> {
    let mut seen = HashSet::new();
    seen.insert(record.identifier()?);

    let resource = encode_resource(record, &full_options(record)?)?;
    let mut included = Vec::new();
    add_included(record, &mut seen, &mut included)?;

    let document = json!({ "data": as_value(&resource)?, "included": included });
    serde_json::to_string(&document).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Array form of [`server_response`]. The seen-set is seeded with every
/// primary resource before any traversal, so siblings never duplicate into
/// `included`. An empty slice yields `{"data": []}` with no `included` key.
pub fn server_response_all(records: &[Record]) -> Result<String, StoreError> {
    if records.is_empty() {
        let document = json!({ "data": [] });
        return serde_json::to_string(&document)
            .map_err(|e| StoreError::InvalidDocument(e.to_string()));
    }

    let mut seen = HashSet::new();
    for record in records {
        seen.insert(record.identifier()?);
    }

    let mut data = Vec::with_capacity(records.len());
    for record in records {
        data.push(as_value(&encode_resource(record, &full_options(record)?)?)?);
    }
    let mut included = Vec::new();
    for record in records {
        add_included(record, &mut seen, &mut included)?;
    }

    let document = json!({ "data": data, "included": included });
    serde_json::to_string(&document).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

/// Builds the resource object for one record. Attribute keys follow
/// declaration order; a stored falsy value is emitted as-is, only a key
/// with no stored value at all is dropped. The id is omitted entirely
/// while the record is new.
pub(crate) fn encode_resource(
    record: &Record,
    options: &JsonapiOptions,
) -> Result<Resource, StoreError> {
    let schema = record.store.schema();
    let data = record.read("codec.encode_resource")?;
    if !schema.contains(&data.type_name) {
        return Err(StoreError::UnknownType(data.type_name.clone()));
    }

    let mut resource = Resource::new(data.type_name.clone());
    if !is_temp_id(&data.id) {
        resource.id = Some(data.id.clone());
    }

    for definition in schema.structure_for(&data.type_name) {
        if let Some(filter) = &options.attributes {
            if !filter.iter().any(|name| name == &definition.name) {
                continue;
            }
        }
        if let Some(value) = data.attributes.get(&definition.name) {
            resource
                .attributes
                .insert(definition.name.clone(), definition.data_type.coerce(value.clone()));
        }
    }

    if let Some(requested) = &options.relationships {
        for definition in schema.relations_for(&data.type_name) {
            if !requested.iter().any(|name| name == &definition.name) {
                continue;
            }
            let object = match data.relationships.get(&definition.name) {
                Some(RelationshipData::One(linked)) => RelationshipObject::one(linked.clone()),
                Some(RelationshipData::Many(members)) => {
                    RelationshipObject::many(members.clone())
                }
                None => match definition.cardinality {
                    Cardinality::ToOne => RelationshipObject::one(None),
                    Cardinality::ToMany => RelationshipObject::many(Vec::new()),
                },
            };
            resource.relationships.push((definition.name.clone(), object));
        }
    }

    if let Some(meta) = &data.meta {
        resource.meta = Some(meta.clone());
    }
    Ok(resource)
}

/// Walks every relationship of `from` depth-first in declaration order and
/// appends each reachable store record to `included` exactly once. Each
/// resource enters the seen-set before its own relationships are walked,
/// which is what terminates cyclic graphs.
fn add_included(
    from: &Record,
    seen: &mut HashSet<Identifier>,
    included: &mut Vec<Value>,
) -> Result<(), StoreError> {
    let store = &from.store;
    let linked: Vec<Identifier> = {
        let data = from.read("codec.add_included")?;
        let mut linked = Vec::new();
        for definition in store.schema().relations_for(&data.type_name) {
            match data.relationships.get(&definition.name) {
                Some(RelationshipData::One(Some(identifier))) => linked.push(identifier.clone()),
                Some(RelationshipData::Many(members)) => linked.extend(members.iter().cloned()),
                _ => {}
            }
        }
        linked
    };

    for identifier in linked {
        if seen.contains(&identifier) {
            continue;
        }
        let record = match store.get_one(&identifier.type_name, &identifier.id)? {
            Some(record) => record,
            // dangling reference, nothing to include
            None => continue,
        };
        // a re-keyed record may already be included under its current id
        let current = record.identifier()?;
        if identifier != current && seen.contains(&current) {
            seen.insert(identifier);
            continue;
        }
        seen.insert(identifier);
        seen.insert(current);

        let resource = encode_resource(&record, &full_options(&record)?)?;
        included.push(as_value(&resource)?);
        add_included(&record, seen, included)?;
    }
    Ok(())
}

/// All attributes plus every declared relationship, the shape used for
/// primaries and included resources in full documents.
fn full_options(record: &Record) -> Result<JsonapiOptions, StoreError> {
    let type_name = record.type_name()?;
    let names: Vec<String> = record
        .store
        .schema()
        .relations_for(&type_name)
        .iter()
        .map(|definition| definition.name.clone())
        .collect();
    Ok(JsonapiOptions {
        attributes: None,
        relationships: Some(names),
    })
}

fn as_value(resource: &Resource) -> Result<Value, StoreError> {
    serde_json::to_value(resource).map_err(|e| StoreError::InvalidDocument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeDefinition, DataType, RelationshipDefinition, Schema};
    use crate::store::Store;
    use serde_json::json;

    fn store() -> Store {
        let schema = Schema::new()
            .attribute("todos", AttributeDefinition::new("title", DataType::String))
            .attribute(
                "todos",
                AttributeDefinition::new("completed", DataType::Boolean).with_default(json!(false)),
            )
            .relationship(
                "todos",
                RelationshipDefinition::to_many("notes", "notes").with_inverse("todo"),
            )
            .attribute("notes", AttributeDefinition::new("description", DataType::String))
            .relationship(
                "notes",
                RelationshipDefinition::to_one("todo", "todos").with_inverse("notes"),
            );
        Store::new(schema)
    }

    #[test]
    fn new_records_encode_without_an_id() {
        let store = store();
        let todo = store.add("todos", json!({"title": "Buy Milk"})).unwrap();
        let doc = todo.jsonapi(&JsonapiOptions::default()).unwrap();
        assert_eq!(
            doc,
            json!({"data": {"type": "todos", "attributes": {"title": "Buy Milk", "completed": false}}})
        );
    }

    #[test]
    fn persisted_records_encode_their_id_as_a_string() {
        let store = store();
        let todo = store.add("todos", json!({"id": 5, "title": "Buy Milk"})).unwrap();
        let doc = todo.jsonapi(&JsonapiOptions::default()).unwrap();
        assert_eq!(doc["data"]["id"], json!("5"));
    }

    #[test]
    fn falsy_values_are_emitted_not_omitted() {
        let store = store();
        let todo = store.add("todos", json!({"title": ""})).unwrap();
        let doc = todo.jsonapi(&JsonapiOptions::default()).unwrap();
        // the attributes() view would drop these, the encoder keeps them
        assert_eq!(doc["data"]["attributes"]["title"], json!(""));
        assert_eq!(doc["data"]["attributes"]["completed"], json!(false));
    }

    #[test]
    fn attribute_filter_limits_the_payload() {
        let store = store();
        let todo = store
            .add("todos", json!({"title": "Buy Milk", "completed": true}))
            .unwrap();
        let doc = todo
            .jsonapi(&JsonapiOptions::new().with_attributes(["title"]))
            .unwrap();
        assert_eq!(doc["data"]["attributes"], json!({"title": "Buy Milk"}));
    }

    #[test]
    fn relationships_appear_only_when_requested() {
        let store = store();
        let todo = store.add("todos", json!({"title": "Buy Milk"})).unwrap();
        let note = store.add("notes", json!({"description": "2%"})).unwrap();
        todo.to_many("notes").unwrap().add(&note).unwrap();

        let bare = todo.jsonapi(&JsonapiOptions::default()).unwrap();
        assert!(bare["data"].get("relationships").is_none());

        let with_rels = todo
            .jsonapi(&JsonapiOptions::new().with_relationships(["notes"]))
            .unwrap();
        let linkage = &with_rels["data"]["relationships"]["notes"]["data"];
        assert_eq!(linkage[0]["type"], json!("notes"));
        // the note is unsaved, so the linkage carries its temporary id
        assert_eq!(linkage[0]["id"], json!(note.id().unwrap()));
    }

    #[test]
    fn empty_to_one_encodes_null_data() {
        let store = store();
        let note = store.add("notes", json!({})).unwrap();
        let doc = note
            .jsonapi(&JsonapiOptions::new().with_relationships(["todo"]))
            .unwrap();
        assert_eq!(doc["data"]["relationships"]["todo"]["data"], json!(null));
    }

    #[test]
    fn meta_is_attached_verbatim() {
        let store = store();
        let todo = store.add("todos", json!({})).unwrap();
        todo.set_meta(json!({"etag": "abc"})).unwrap();
        let doc = todo.jsonapi(&JsonapiOptions::default()).unwrap();
        assert_eq!(doc["data"]["meta"], json!({"etag": "abc"}));
    }

    #[test]
    fn server_response_includes_each_related_resource_once() {
        let store = store();
        let todo = store.add("todos", json!({"id": "1", "title": "Buy Milk"})).unwrap();
        let first = store.add("notes", json!({"id": "2", "description": "2%"})).unwrap();
        let second = store.add("notes", json!({"id": "3", "description": "oat"})).unwrap();
        let notes = todo.to_many("notes").unwrap();
        notes.add(&first).unwrap();
        notes.add(&second).unwrap();

        // cyclic: each note points back at the todo through its inverse
        let text = server_response(&todo).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["data"]["id"], json!("1"));
        assert_eq!(doc["data"]["relationships"]["notes"]["data"][1]["id"], json!("3"));
        let included = doc["included"].as_array().unwrap();
        assert_eq!(included.len(), 2);
        let mut ids: Vec<&str> = included
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["2", "3"]);
        // included notes expose their own relationships
        assert_eq!(included[0]["relationships"]["todo"]["data"]["id"], json!("1"));
    }

    #[test]
    fn server_response_all_seeds_siblings_into_the_seen_set() {
        let store = store();
        let first = store.add("todos", json!({"id": "1", "title": "a"})).unwrap();
        let second = store.add("todos", json!({"id": "2", "title": "b"})).unwrap();
        let note = store.add("notes", json!({"id": "9", "description": "n"})).unwrap();
        first.to_many("notes").unwrap().add(&note).unwrap();

        let text = server_response_all(&[first, second]).unwrap();
        let doc: Value = serde_json::from_str(&text).unwrap();

        assert_eq!(doc["data"].as_array().unwrap().len(), 2);
        let included = doc["included"].as_array().unwrap();
        // only the note: the sibling primary never duplicates into included
        assert_eq!(included.len(), 1);
        assert_eq!(included[0]["id"], json!("9"));
    }

    #[test]
    fn empty_primary_slice_has_no_included_key() {
        let text = server_response_all(&[]).unwrap();
        assert_eq!(text, r#"{"data":[]}"#);
    }
}
