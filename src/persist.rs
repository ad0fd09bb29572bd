//! Save and destroy orchestration around the transport collaborator.
//!
//! Both operations drive the same lifecycle: validate (save only), mark the
//! record in flight, issue the request, then fold the response back into the
//! identity map. A rejected response is not an `Err`: it lands in the
//! record's `errors` map so callers can render it without a control-flow
//! exception. Only transport-level failures propagate.

use serde_json::Value;

use crate::codec::{parse_resource, JsonapiOptions};
use crate::error::{ErrorDetail, StoreError};
use crate::events::ChangeEvent;
use crate::record::Record;
use crate::store::Store;
use crate::transport::{FetchRequest, Method};

/// Options for [`Record::save`].
#[derive(Clone, Debug, Default)]
pub struct SaveOptions {
    /// Attribute names to serialize. `None` serializes every declared
    /// attribute.
    pub attributes: Option<Vec<String>>,
    /// Relationship names to serialize. `None` serializes none.
    pub relationships: Option<Vec<String>>,
    /// Skip local validation before issuing the request.
    pub skip_validations: bool,
}

impl SaveOptions {
    pub fn new() -> Self {
        SaveOptions::default()
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

    fn encoder_options(&self) -> JsonapiOptions {
        JsonapiOptions {
            attributes: self.attributes.clone(),
            relationships: self.relationships.clone(),
        }
    }
}

/// Options for [`Record::destroy`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DestroyOptions {
    /// Keep the record in the store after a successful destroy.
    pub skip_remove: bool,
}

impl DestroyOptions {
    pub fn new() -> Self {
        DestroyOptions::default()
    }
}

/// Persist `record` through its store's transport.
///
/// Validation failures short-circuit before any network call. A new record
/// goes out as `POST` against the type URL, a persisted one as `PATCH`
/// against its record URL. On 200/201 the response resource overwrites the
/// record in one batch and a server-assigned id re-keys it in the store.
pub async fn save(record: &Record, options: SaveOptions) -> Result<Record, StoreError> {
    let store = record.store.clone();

    if !options.skip_validations && !record.validate()? {
        return Err(StoreError::Validation {
            errors: record.errors()?,
        });
    }

    let transport = store.transport_for("save")?;
    let type_name = record.type_name()?;
    let (method, url) = if record.is_new()? {
        (Method::Post, store.url_for_type(&type_name)?)
    } else {
        (Method::Patch, store.url_for_record(&type_name, &record.id()?)?)
    };
    let body = record.jsonapi(&options.encoder_options())?;

    set_in_flight(record, true)?;
    tracing::debug!(%url, method = method.as_str(), "save");

    let request = FetchRequest {
        method,
        headers: store.request_headers()?,
        body: Some(body),
    };
    match transport.fetch(&url, request).await {
        Ok(response) => match response.status {
            200 | 201 => {
                let document = match response.body {
                    Some(document) => document,
                    None => {
                        set_in_flight(record, false)?;
                        return Err(StoreError::InvalidDocument(
                            "save response has no body".to_string(),
                        ));
                    }
                };
                apply_save_response(&store, record, &document)
            }
            status => {
                tracing::debug!(status, "save rejected");
                record_failure(record, "status", ErrorDetail::Status(status))?;
                Ok(record.clone())
            }
        },
        Err(error) => {
            record_failure(record, "network", ErrorDetail::Network(error.to_string()))?;
            Err(StoreError::Transport(error))
        }
    }
}

/// Delete `record` through its store's transport.
///
/// A record that was never persisted is removed locally, no network call.
/// Otherwise issues `DELETE`; only 202 and 204 count as success, anything
/// else is absorbed into `errors` and leaves the record in the store.
pub async fn destroy(record: &Record, options: DestroyOptions) -> Result<Record, StoreError> {
    let store = record.store.clone();
    let type_name = record.type_name()?;
    let id = record.id()?;

    if record.is_new()? {
        store.remove(&type_name, &id)?;
        return Ok(record.clone());
    }

    let transport = store.transport_for("destroy")?;
    let url = store.url_for_record(&type_name, &id)?;
    set_in_flight(record, true)?;
    tracing::debug!(%url, "destroy");

    let request = FetchRequest {
        method: Method::Delete,
        headers: store.request_headers()?,
        body: None,
    };
    match transport.fetch(&url, request).await {
        Ok(response) => match response.status {
            202 | 204 => {
                set_in_flight(record, false)?;
                if let Some(document) = &response.body {
                    apply_destroy_body(&store, record, document)?;
                }
                if !options.skip_remove {
                    store.remove(&type_name, &id)?;
                }
                Ok(record.clone())
            }
            status => {
                tracing::debug!(status, "destroy rejected");
                record_failure(record, "status", ErrorDetail::Status(status))?;
                Ok(record.clone())
            }
        },
        Err(error) => {
            record_failure(record, "network", ErrorDetail::Network(error.to_string()))?;
            Err(StoreError::Transport(error))
        }
    }
}

fn apply_save_response(
    store: &Store,
    record: &Record,
    document: &Value,
) -> Result<Record, StoreError> {
    let object = match document.as_object() {
        Some(object) => object,
        None => {
            set_in_flight(record, false)?;
            return Err(StoreError::InvalidDocument(
                "save response must be an object".to_string(),
            ));
        }
    };
    let data = match object.get("data") {
        Some(data) if data.is_object() => data,
        _ => {
            set_in_flight(record, false)?;
            return Err(StoreError::InvalidDocument(
                "save response needs a \"data\" resource object".to_string(),
            ));
        }
    };
    let parsed = match parse_resource(data) {
        Ok(parsed) => parsed,
        Err(error) => {
            set_in_flight(record, false)?;
            return Err(error);
        }
    };
    store.apply_saved_resource(record, &parsed)?;

    if let Some(included) = object.get("included") {
        let items = included.as_array().ok_or_else(|| {
            StoreError::InvalidDocument("\"included\" must be an array".to_string())
        })?;
        for item in items {
            store.upsert_resource(parse_resource(item)?)?;
        }
    }
    Ok(record.clone())
}

/// Destroy responses rarely carry a body; when one does show up, resource
/// data in it is merged leniently and never treated as fatal.
fn apply_destroy_body(
    store: &Store,
    record: &Record,
    document: &Value,
) -> Result<(), StoreError> {
    let object = match document.as_object() {
        Some(object) => object,
        None => return Ok(()),
    };
    if let Some(data) = object.get("data") {
        if data.is_object() {
            if let Ok(parsed) = parse_resource(data) {
                store.merge_parsed(record, &parsed)?;
            }
        }
    }
    if let Some(items) = object.get("included").and_then(Value::as_array) {
        for item in items {
            if let Ok(parsed) = parse_resource(item) {
                store.upsert_resource(parsed)?;
            }
        }
    }
    Ok(())
}

fn set_in_flight(record: &Record, in_flight: bool) -> Result<(), StoreError> {
    record.write("persist.in_flight")?.in_flight = in_flight;
    Ok(())
}

fn record_failure(record: &Record, key: &str, detail: ErrorDetail) -> Result<(), StoreError> {
    let event = {
        let mut data = record.write("persist.failure")?;
        data.in_flight = false;
        data.errors.clear();
        data.errors.insert(key.to_string(), detail);
        ChangeEvent::record(data.type_name.clone(), data.id.clone())
    };
    record.store.publish_change(event);
    Ok(())
}
