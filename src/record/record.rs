use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};

use crate::codec::{stringify_id, Identifier, JsonapiOptions, RelationshipData};
use crate::error::{ErrorDetail, StoreError};
use crate::events::ChangeEvent;
use crate::persist::{self, DestroyOptions, SaveOptions};
use crate::record::collection::{clear_inverse, resolves_to, write_inverse, RelatedCollection};
use crate::record::snapshot::Snapshot;
use crate::record::temp_id::{is_temp_id, temp_id};
use crate::schema::{Cardinality, Schema};
use crate::store::Store;

pub(crate) type RecordCell = Arc<RwLock<RecordData>>;

/// The state behind a record handle. Owned by the store's identity map;
/// every handle for a given (type, id) shares the same cell.
#[derive(Clone, Debug)]
pub(crate) struct RecordData {
    pub(crate) type_name: String,
    pub(crate) id: String,
    pub(crate) attributes: Map<String, Value>,
    pub(crate) relationships: HashMap<String, RelationshipData>,
    pub(crate) meta: Option<Value>,
    pub(crate) errors: HashMap<String, ErrorDetail>,
    pub(crate) dirty: bool,
    pub(crate) in_flight: bool,
    pub(crate) previous: Snapshot,
}

impl RecordData {
    /// Seeds attributes from schema defaults merged with `initial`, assigns
    /// a temporary id unless `initial` carries one, seeds declared
    /// relationships empty, and captures the first snapshot.
    pub(crate) fn build(schema: &Schema, type_name: &str, mut initial: Map<String, Value>) -> Self {
        let id = initial
            .remove("id")
            .and_then(|value| stringify_id(&value))
            .unwrap_or_else(temp_id);

        let mut attributes = Map::new();
        for definition in schema.structure_for(type_name) {
            if let Some(default) = &definition.default {
                attributes.insert(
                    definition.name.clone(),
                    definition.data_type.coerce(default.clone()),
                );
            }
        }
        for (name, value) in initial {
            let coerced = match schema.attribute_for(type_name, &name) {
                Some(definition) => definition.data_type.coerce(value),
                None => value,
            };
            attributes.insert(name, coerced);
        }

        let mut relationships = HashMap::new();
        for definition in schema.relations_for(type_name) {
            let empty = match definition.cardinality {
                Cardinality::ToOne => RelationshipData::One(None),
                Cardinality::ToMany => RelationshipData::Many(Vec::new()),
            };
            relationships.insert(definition.name.clone(), empty);
        }

        let previous = Snapshot::capture(&attributes, &relationships);
        RecordData {
            type_name: type_name.to_string(),
            id,
            attributes,
            relationships,
            meta: None,
            errors: HashMap::new(),
            dirty: false,
            in_flight: false,
            previous,
        }
    }

    pub(crate) fn identifier(&self) -> Identifier {
        Identifier::new(self.type_name.clone(), self.id.clone())
    }
}

/// Blank values are dropped from the `attributes()` view, so defaults of
/// `""`/`0`/`[]` do not round-trip unless explicitly set. A documented
/// quirk of the attribute map, not of the encoder.
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Handle to one identity-mapped resource instance. Cloning the handle
/// never copies the record; all clones read and write the same cell, and
/// equality is reference identity.
#[derive(Clone)]
pub struct Record {
    pub(crate) store: Store,
    pub(crate) cell: RecordCell,
}

impl Record {
    pub(crate) fn from_cell(store: Store, cell: RecordCell) -> Self {
        Record { store, cell }
    }

    pub(crate) fn read(&self, op: &'static str) -> Result<RwLockReadGuard<'_, RecordData>, StoreError> {
        self.cell.read().map_err(|_| StoreError::LockPoisoned(op))
    }

    pub(crate) fn write(&self, op: &'static str) -> Result<RwLockWriteGuard<'_, RecordData>, StoreError> {
        self.cell.write().map_err(|_| StoreError::LockPoisoned(op))
    }

    pub fn type_name(&self) -> Result<String, StoreError> {
        Ok(self.read("record.type_name")?.type_name.clone())
    }

    pub fn id(&self) -> Result<String, StoreError> {
        Ok(self.read("record.id")?.id.clone())
    }

    pub fn identifier(&self) -> Result<Identifier, StoreError> {
        Ok(self.read("record.identifier")?.identifier())
    }

    /// True while the id still matches the temporary pattern, which is the
    /// only thing that distinguishes an unsaved record.
    pub fn is_new(&self) -> Result<bool, StoreError> {
        Ok(is_temp_id(&self.read("record.is_new")?.id))
    }

    /// Explicit dirty flag, or newness; a record that has never been saved
    /// always counts as dirty.
    pub fn is_dirty(&self) -> Result<bool, StoreError> {
        let data = self.read("record.is_dirty")?;
        Ok(data.dirty || is_temp_id(&data.id))
    }

    pub fn is_in_flight(&self) -> Result<bool, StoreError> {
        Ok(self.read("record.is_in_flight")?.in_flight)
    }

    pub fn errors(&self) -> Result<HashMap<String, ErrorDetail>, StoreError> {
        Ok(self.read("record.errors")?.errors.clone())
    }

    pub fn has_errors(&self) -> Result<bool, StoreError> {
        Ok(!self.read("record.errors")?.errors.is_empty())
    }

    pub fn meta(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.read("record.meta")?.meta.clone())
    }

    /// Meta is carried verbatim into encoded documents. It is not part of
    /// the snapshot and does not affect dirtiness.
    pub fn set_meta(&self, value: Value) -> Result<(), StoreError> {
        self.write("record.set_meta")?.meta = Some(value);
        Ok(())
    }

    /// Raw stored value under `name`, declared or not.
    pub fn attribute(&self, name: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.read("record.attribute")?.attributes.get(name).cloned())
    }

    /// Writes an attribute, coercing through the declared data type when
    /// one exists and storing undeclared names raw. Marks the record dirty
    /// and publishes a change event.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) -> Result<(), StoreError> {
        let name = name.into();
        if name == "id" {
            return Err(StoreError::InvalidDocument(
                "\"id\" is not an attribute".to_string(),
            ));
        }
        let event = {
            let mut data = self.write("record.set_attribute")?;
            let coerced = match self.store.schema().attribute_for(&data.type_name, &name) {
                Some(definition) => definition.data_type.coerce(value),
                None => value,
            };
            data.attributes.insert(name.clone(), coerced);
            data.dirty = true;
            ChangeEvent::attribute(data.type_name.clone(), data.id.clone(), name)
        };
        self.store.publish_change(event);
        Ok(())
    }

    /// Current values of the declared attributes, omitting blanks.
    pub fn attributes(&self) -> Result<Map<String, Value>, StoreError> {
        let data = self.read("record.attributes")?;
        let mut out = Map::new();
        for definition in self.store.schema().structure_for(&data.type_name) {
            if let Some(value) = data.attributes.get(&definition.name) {
                if !is_blank(value) {
                    out.insert(definition.name.clone(), value.clone());
                }
            }
        }
        Ok(out)
    }

    /// Attribute paths that differ from the last snapshot. Nested object
    /// attributes report dotted paths like `address.city`.
    pub fn dirty_attributes(&self) -> Result<Vec<String>, StoreError> {
        let data = self.read("record.dirty_attributes")?;
        Ok(data.previous.changed_attribute_paths(&data.attributes))
    }

    /// Clears `errors`, runs every declared validation against the current
    /// values, and records failures keyed by attribute. The schema keeps at
    /// most one rule per attribute, so each key maps to one failure.
    /// Returns whether the record passed.
    pub fn validate(&self) -> Result<bool, StoreError> {
        let mut data = self.write("record.validate")?;
        data.errors.clear();
        for rule in self.store.schema().validations_for(&data.type_name) {
            let value = data
                .attributes
                .get(&rule.attribute)
                .cloned()
                .unwrap_or(Value::Null);
            if let Some(failure) = (rule.check)(&value) {
                data.errors
                    .insert(rule.attribute.clone(), ErrorDetail::Validation(vec![failure]));
            }
        }
        Ok(data.errors.is_empty())
    }

    /// Restores attributes and relationships from the last snapshot in one
    /// batch, clears errors and the dirty flag, and re-captures the
    /// snapshot as the new baseline.
    pub fn rollback(&self) -> Result<(), StoreError> {
        let event = {
            let mut data = self.write("record.rollback")?;
            let attributes = data.previous.attributes().clone();
            let relationships = data.previous.relationships().clone();
            data.attributes = attributes;
            data.relationships = relationships;
            data.errors.clear();
            data.dirty = false;
            let baseline = Snapshot::capture(&data.attributes, &data.relationships);
            data.previous = baseline;
            ChangeEvent::record(data.type_name.clone(), data.id.clone())
        };
        self.store.publish_change(event);
        Ok(())
    }

    /// Captures the current attributes and relationships as the new
    /// baseline. Does not touch flags or errors.
    pub fn set_previous_snapshot(&self) -> Result<(), StoreError> {
        let mut data = self.write("record.set_previous_snapshot")?;
        let baseline = Snapshot::capture(&data.attributes, &data.relationships);
        data.previous = baseline;
        Ok(())
    }

    pub fn previous_snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(self.read("record.previous_snapshot")?.previous.clone())
    }

    /// Linked identifier of a declared to-one relationship.
    pub fn to_one_identifier(&self, name: &str) -> Result<Option<Identifier>, StoreError> {
        let data = self.read("record.to_one")?;
        match data.relationships.get(name) {
            Some(RelationshipData::One(linked)) => Ok(linked.clone()),
            _ => Err(StoreError::UnknownRelationship {
                type_name: data.type_name.clone(),
                name: name.to_string(),
            }),
        }
    }

    /// Resolves a to-one relationship through the store. A dangling
    /// identifier resolves to `None`.
    pub fn to_one(&self, name: &str) -> Result<Option<Record>, StoreError> {
        match self.to_one_identifier(name)? {
            Some(identifier) => self.store.get_one(&identifier.type_name, &identifier.id),
            None => Ok(None),
        }
    }

    /// Links or clears a to-one relationship, keeping the declared inverse
    /// on the displaced and new targets consistent.
    pub fn set_to_one(&self, name: &str, target: Option<&Record>) -> Result<(), StoreError> {
        let (owner_type, owner_id) = {
            let data = self.read("record.set_to_one")?;
            (data.type_name.clone(), data.id.clone())
        };
        let definition = self
            .store
            .schema()
            .relationship_for(&owner_type, name)
            .filter(|definition| definition.cardinality == Cardinality::ToOne)
            .cloned()
            .ok_or_else(|| StoreError::UnknownRelationship {
                type_name: owner_type.clone(),
                name: name.to_string(),
            })?;

        let owner_ident = Identifier::new(owner_type.clone(), owner_id.clone());
        let new_ident = match target {
            Some(record) => Some(record.identifier()?),
            None => None,
        };
        let old_ident = match self.read("record.set_to_one")?.relationships.get(name) {
            Some(RelationshipData::One(linked)) => linked.clone(),
            _ => None,
        };

        // no-op when the requested target is already linked
        if let Some(record) = target {
            if let Some(old) = &old_ident {
                if Some(old) == new_ident.as_ref() || resolves_to(&self.store, old, &record.cell)? {
                    return Ok(());
                }
            }
        } else if old_ident.is_none() {
            return Ok(());
        }

        {
            let mut data = self.write("record.set_to_one")?;
            data.relationships
                .insert(name.to_string(), RelationshipData::One(new_ident));
            data.dirty = true;
        }
        let mut events = vec![ChangeEvent::relationship(
            owner_type.clone(),
            owner_id.clone(),
            name,
        )];

        if let Some(inverse_name) = definition.inverse.as_deref() {
            if let Some(old) = &old_ident {
                if let Some(old_record) = self.store.get_one(&old.type_name, &old.id)? {
                    let displaced_by_self = target
                        .map(|record| Arc::ptr_eq(&record.cell, &old_record.cell))
                        .unwrap_or(false);
                    if !displaced_by_self {
                        if let Some(event) =
                            clear_inverse(&self.store, &old_record, inverse_name, &owner_ident, &self.cell)?
                        {
                            events.push(event);
                        }
                    }
                }
            }
            if let Some(record) = target {
                if let Some(event) =
                    write_inverse(&self.store, record, inverse_name, &owner_ident, &self.cell)?
                {
                    events.push(event);
                }
            }
        }

        for event in events {
            self.store.publish_change(event);
        }
        Ok(())
    }

    /// The collection handle for a declared to-many relationship.
    pub fn to_many(&self, name: &str) -> Result<RelatedCollection, StoreError> {
        let type_name = self.read("record.to_many")?.type_name.clone();
        match self.store.schema().relationship_for(&type_name, name) {
            Some(definition) if definition.cardinality == Cardinality::ToMany => Ok(
                RelatedCollection::new(self.store.clone(), self.cell.clone(), name.to_string()),
            ),
            _ => Err(StoreError::UnknownRelationship {
                type_name,
                name: name.to_string(),
            }),
        }
    }

    /// Encodes this record as a `{data}` document. See [`crate::codec`].
    pub fn jsonapi(&self, options: &JsonapiOptions) -> Result<Value, StoreError> {
        crate::codec::to_full_jsonapi(self, options)
    }

    /// Persists this record. See [`crate::persist`].
    pub async fn save(&self, options: SaveOptions) -> Result<Record, StoreError> {
        persist::save(self, options).await
    }

    /// Deletes this record. See [`crate::persist`].
    pub async fn destroy(&self, options: DestroyOptions) -> Result<Record, StoreError> {
        persist::destroy(self, options).await
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.read() {
            Ok(data) => f
                .debug_struct("Record")
                .field("type", &data.type_name)
                .field("id", &data.id)
                .field("dirty", &data.dirty)
                .field("in_flight", &data.in_flight)
                .finish(),
            Err(_) => f.debug_struct("Record").field("lock", &"poisoned").finish(),
        }
    }
}
