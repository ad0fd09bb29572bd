use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A `{type, id}` pair, the unit of linkage in every document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl Identifier {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Identifier {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// Linkage payload of one relationship: absent member, null, a single
/// identifier, or a list of identifiers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationshipData {
    One(Option<Identifier>),
    Many(Vec<Identifier>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipObject {
    pub data: RelationshipData,
}

impl RelationshipObject {
    pub fn one(identifier: Option<Identifier>) -> Self {
        RelationshipObject {
            data: RelationshipData::One(identifier),
        }
    }

    pub fn many(identifiers: Vec<Identifier>) -> Self {
        RelationshipObject {
            data: RelationshipData::Many(identifiers),
        }
    }
}

/// One resource object as it appears under `data` or `included`. The id is
/// absent on a primary resource that has never been saved; servers assign
/// ids on create.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "relationship_entries")]
    pub relationships: Vec<(String, RelationshipObject)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Resource {
    pub fn new(type_name: impl Into<String>) -> Self {
        Resource {
            type_name: type_name.into(),
            id: None,
            attributes: Map::new(),
            relationships: Vec::new(),
            meta: None,
        }
    }

    pub fn with_id(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Resource {
            type_name: type_name.into(),
            id: Some(id.into()),
            attributes: Map::new(),
            relationships: Vec::new(),
            meta: None,
        }
    }

    pub fn identifier(&self) -> Option<Identifier> {
        self.id
            .as_ref()
            .map(|id| Identifier::new(self.type_name.clone(), id.clone()))
    }
}

/// Relationships keep declaration order, so they live in a `Vec` of
/// entries rather than a map. On the wire they are still one JSON object.
mod relationship_entries {
    use super::RelationshipObject;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        entries: &[(String, RelationshipObject)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, object) in entries {
            map.serialize_entry(name, object)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, RelationshipObject)>, D::Error> {
        let entries: Vec<(String, RelationshipObject)> =
            serde_json::Map::deserialize(deserializer)?
                .into_iter()
                .filter_map(|(name, value)| {
                    serde_json::from_value(value).ok().map(|object| (name, object))
                })
                .collect();
        Ok(entries)
    }
}

/// Primary data of a document: a single (possibly null) resource or a list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryData {
    One(Option<Box<Resource>>),
    Many(Vec<Resource>),
}

/// A full `{data, included}` document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub data: PrimaryData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub included: Vec<Resource>,
}

impl Document {
    pub fn one(resource: Resource) -> Self {
        Document {
            data: PrimaryData::One(Some(Box::new(resource))),
            included: Vec::new(),
        }
    }

    pub fn many(resources: Vec<Resource>) -> Self {
        Document {
            data: PrimaryData::Many(resources),
            included: Vec::new(),
        }
    }
}

/// Servers are loose about id types; numbers arrive as JSON numbers. Both
/// forms normalize to the string keys the identity map uses.
pub fn stringify_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifier_wire_shape() {
        let id = Identifier::new("todos", "1");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!({"type": "todos", "id": "1"}));
    }

    #[test]
    fn relationship_object_shapes() {
        let empty = RelationshipObject::one(None);
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!({"data": null}));

        let one = RelationshipObject::one(Some(Identifier::new("todos", "1")));
        assert_eq!(
            serde_json::to_value(&one).unwrap(),
            json!({"data": {"type": "todos", "id": "1"}})
        );

        let many = RelationshipObject::many(vec![
            Identifier::new("notes", "1"),
            Identifier::new("notes", "2"),
        ]);
        assert_eq!(
            serde_json::to_value(&many).unwrap(),
            json!({"data": [{"type": "notes", "id": "1"}, {"type": "notes", "id": "2"}]})
        );
    }

    #[test]
    fn empty_members_are_omitted() {
        let doc = Document::one(Resource::with_id("todos", "1"));
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({"data": {"type": "todos", "id": "1"}})
        );
        // an unsaved resource has no id member at all
        assert_eq!(
            serde_json::to_value(Resource::new("todos")).unwrap(),
            json!({"type": "todos"})
        );
    }

    #[test]
    fn relationship_order_survives_serialization() {
        let mut resource = Resource::with_id("todos", "1");
        resource.relationships = vec![
            ("zebra".to_string(), RelationshipObject::one(None)),
            ("alpha".to_string(), RelationshipObject::one(None)),
        ];
        let text = serde_json::to_string(&resource).unwrap();
        let zebra = text.find("zebra").unwrap();
        let alpha = text.find("alpha").unwrap();
        assert!(zebra < alpha);
    }

    #[test]
    fn stringify_id_accepts_numbers() {
        assert_eq!(stringify_id(&json!("12")), Some("12".to_string()));
        assert_eq!(stringify_id(&json!(12)), Some("12".to_string()));
        assert_eq!(stringify_id(&json!(null)), None);
    }

    #[test]
    fn primary_data_null_round_trip() {
        let doc: Document = serde_json::from_value(json!({"data": null})).unwrap();
        assert_eq!(doc.data, PrimaryData::One(None));
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"data": null}));
    }
}
