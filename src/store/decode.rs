use serde_json::Value;

use crate::codec::{parse_resource, ParsedResource};
use crate::error::StoreError;
use crate::events::ChangeEvent;
use crate::record::{Record, RecordData, Snapshot};
use crate::store::Store;

impl Store {
    /// Merge raw resource objects into the identity map.
    ///
    /// Every entry must parse as a resource; entries whose type has no
    /// schema entry are skipped. A known `(type, id)` pair is updated in
    /// place, anything else is constructed with declared defaults first and
    /// the wire values layered on top.
    pub fn create_records_from_data(&self, resources: &[Value]) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        for resource in resources {
            let parsed = parse_resource(resource)?;
            if let Some(record) = self.upsert_resource(parsed)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Apply a full wire document: primary `data` first, then `included`.
    /// Returns handles for the primary resources only.
    pub(crate) fn decode_document(&self, document: &Value) -> Result<Vec<Record>, StoreError> {
        let object = document
            .as_object()
            .ok_or_else(|| StoreError::InvalidDocument("document must be an object".to_string()))?;
        let data = object.get("data").ok_or_else(|| {
            StoreError::InvalidDocument("document is missing \"data\"".to_string())
        })?;

        let mut primaries = Vec::new();
        match data {
            Value::Null => {}
            Value::Object(_) => {
                if let Some(record) = self.upsert_resource(parse_resource(data)?)? {
                    primaries.push(record);
                }
            }
            Value::Array(items) => {
                for item in items {
                    if let Some(record) = self.upsert_resource(parse_resource(item)?)? {
                        primaries.push(record);
                    }
                }
            }
            _ => {
                return Err(StoreError::InvalidDocument(
                    "document \"data\" must be null, an object, or an array".to_string(),
                ))
            }
        }

        if let Some(included) = object.get("included") {
            let items = included.as_array().ok_or_else(|| {
                StoreError::InvalidDocument("\"included\" must be an array".to_string())
            })?;
            for item in items {
                self.upsert_resource(parse_resource(item)?)?;
            }
        }

        Ok(primaries)
    }

    pub(crate) fn upsert_resource(
        &self,
        parsed: ParsedResource,
    ) -> Result<Option<Record>, StoreError> {
        if !self.schema().contains(&parsed.type_name) {
            tracing::debug!(type_name = %parsed.type_name, "skipping resource of undeclared type");
            return Ok(None);
        }
        match self.get_one(&parsed.type_name, &parsed.id)? {
            Some(record) => {
                self.merge_parsed(&record, &parsed)?;
                Ok(Some(record))
            }
            None => Ok(Some(self.construct_parsed(parsed)?)),
        }
    }

    /// Update an existing instance in place from a parsed resource. Flags,
    /// errors, and the rollback baseline are left alone.
    pub(crate) fn merge_parsed(
        &self,
        record: &Record,
        parsed: &ParsedResource,
    ) -> Result<(), StoreError> {
        let event = {
            let mut data = record.write("store.merge")?;
            for (name, value) in &parsed.attributes {
                let coerced = match self.schema().attribute_for(&data.type_name, name) {
                    Some(definition) => definition.data_type.coerce(value.clone()),
                    None => value.clone(),
                };
                data.attributes.insert(name.clone(), coerced);
            }
            for (name, state) in &parsed.relationships {
                data.relationships.insert(name.clone(), state.clone());
            }
            if parsed.meta.is_some() {
                data.meta = parsed.meta.clone();
            }
            ChangeEvent::record(data.type_name.clone(), data.id.clone())
        };
        self.publish_change(event);
        Ok(())
    }

    /// Fold a successful save response into the saved record: server values
    /// win, flags and errors clear, the baseline moves to the saved state,
    /// and a server-assigned id replaces a temp id with the old key left
    /// behind as an alias.
    pub(crate) fn apply_saved_resource(
        &self,
        record: &Record,
        parsed: &ParsedResource,
    ) -> Result<(), StoreError> {
        let (event, type_name, old_id) = {
            let mut data = record.write("store.apply_saved")?;
            if data.type_name != parsed.type_name {
                tracing::warn!(
                    expected = %data.type_name,
                    got = %parsed.type_name,
                    "save response carries a different resource type"
                );
            }
            for (name, value) in &parsed.attributes {
                let coerced = match self.schema().attribute_for(&data.type_name, name) {
                    Some(definition) => definition.data_type.coerce(value.clone()),
                    None => value.clone(),
                };
                data.attributes.insert(name.clone(), coerced);
            }
            for (name, state) in &parsed.relationships {
                data.relationships.insert(name.clone(), state.clone());
            }
            if parsed.meta.is_some() {
                data.meta = parsed.meta.clone();
            }
            let old_id = data.id.clone();
            data.id = parsed.id.clone();
            data.errors.clear();
            data.dirty = false;
            data.in_flight = false;
            data.previous = Snapshot::capture(&data.attributes, &data.relationships);
            (
                ChangeEvent::record(data.type_name.clone(), data.id.clone()),
                data.type_name.clone(),
                old_id,
            )
        };
        if old_id != parsed.id {
            self.rekey(&type_name, &old_id, &parsed.id)?;
        }
        self.publish_change(event);
        Ok(())
    }

    fn construct_parsed(&self, parsed: ParsedResource) -> Result<Record, StoreError> {
        let ParsedResource {
            type_name,
            id,
            mut attributes,
            relationships,
            meta,
        } = parsed;
        attributes.insert("id".to_string(), Value::String(id));
        let mut data = RecordData::build(self.schema(), &type_name, attributes);
        for (name, state) in relationships {
            data.relationships.insert(name, state);
        }
        if meta.is_some() {
            data.meta = meta;
        }
        // server state is the baseline, not a pending change
        data.previous = Snapshot::capture(&data.attributes, &data.relationships);
        self.register(data)
    }
}
