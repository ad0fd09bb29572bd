use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::codec::RelationshipData;

/// Plain-data capture of a record's attributes and relationship linkage at a
/// point in time. Holds cloned values, never live references. Taken at
/// construction and after every successful save; read by dirty-diffing and
/// restored wholesale by rollback.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    attributes: Map<String, Value>,
    relationships: HashMap<String, RelationshipData>,
}

impl Snapshot {
    pub(crate) fn capture(
        attributes: &Map<String, Value>,
        relationships: &HashMap<String, RelationshipData>,
    ) -> Self {
        Snapshot {
            attributes: attributes.clone(),
            relationships: relationships.clone(),
        }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn relationships(&self) -> &HashMap<String, RelationshipData> {
        &self.relationships
    }

    /// Paths of attributes that differ between this snapshot and `current`.
    /// Nested objects diff per key and report dotted paths, so a change
    /// inside `address` surfaces as `address.city`.
    pub(crate) fn changed_attribute_paths(&self, current: &Map<String, Value>) -> Vec<String> {
        let mut paths = Vec::new();
        collect_changed_paths("", &self.attributes, current, &mut paths);
        paths
    }
}

fn collect_changed_paths(
    prefix: &str,
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    out: &mut Vec<String>,
) {
    for (key, new_value) in new {
        let path = join_path(prefix, key);
        match old.get(key) {
            None => out.push(path),
            Some(old_value) if old_value == new_value => {}
            Some(Value::Object(old_map)) => {
                if let Value::Object(new_map) = new_value {
                    collect_changed_paths(&path, old_map, new_map, out);
                } else {
                    out.push(path);
                }
            }
            Some(_) => out.push(path),
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            out.push(join_path(prefix, key));
        }
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
