use std::collections::{HashMap, HashSet};
use std::fmt;
#[cfg(feature = "emitter")]
use std::sync::Mutex;
use std::sync::{Arc, RwLock};

#[cfg(feature = "emitter")]
use event_emitter_rs::EventEmitter;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::events::ChangeEvent;
use crate::record::{Record, RecordCell, RecordData};
use crate::schema::Schema;
use crate::transport::{FetchRequest, Method, Transport};

/// Media type stamped on every request this crate issues.
pub const JSONAPI_MEDIA_TYPE: &str = "application/vnd.api+json";

/// Options for the fetch-backed lookups.
#[derive(Clone, Copy, Debug)]
pub struct FindOptions {
    /// Refresh from the configured transport before answering. On by default.
    pub from_server: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions { from_server: true }
    }
}

impl FindOptions {
    /// Answer from the identity map without touching the transport.
    pub fn local() -> Self {
        FindOptions { from_server: false }
    }
}

struct StoreInner {
    schema: Schema,
    records: RwLock<HashMap<String, HashMap<String, RecordCell>>>,
    base_url: RwLock<String>,
    headers: RwLock<Vec<(String, String)>>,
    transport: RwLock<Option<Arc<dyn Transport>>>,
    #[cfg(feature = "emitter")]
    events: Mutex<EventEmitter>,
}

/// Identity-mapped record storage.
///
/// One instance per `(type, id)` pair: every lookup of the same pair hands
/// back a handle to the same underlying cell, so an update made through one
/// handle is visible through all of them. Clone-friendly via `Arc`.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Create an empty store over the given schema.
    pub fn new(schema: Schema) -> Self {
        Store {
            inner: Arc::new(StoreInner {
                schema,
                records: RwLock::new(HashMap::new()),
                base_url: RwLock::new(String::new()),
                headers: RwLock::new(Vec::new()),
                transport: RwLock::new(None),
                #[cfg(feature = "emitter")]
                events: Mutex::new(EventEmitter::new()),
            }),
        }
    }

    /// Set the base URL fetches are issued against.
    pub fn with_base_url(self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if let Ok(mut slot) = self.inner.base_url.write() {
            *slot = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    /// Install the transport used for server-backed operations.
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        if let Ok(mut slot) = self.inner.transport.write() {
            *slot = Some(Arc::new(transport));
        }
        self
    }

    /// Append a header to every outgoing request.
    pub fn with_header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut headers) = self.inner.headers.write() {
            headers.push((name.into(), value.into()));
        }
        self
    }

    /// The schema this store was built over.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The configured base URL, trailing slash removed.
    pub fn base_url(&self) -> Result<String, StoreError> {
        Ok(self
            .inner
            .base_url
            .read()
            .map_err(|_| StoreError::LockPoisoned("store.base_url"))?
            .clone())
    }

    /// Construct a record of `type_name` and register it under its id.
    ///
    /// `attributes` may be `null` or an object. Declared defaults fill any
    /// gap, declared types coerce the rest, and a temp id is assigned unless
    /// the object carries an `"id"` of its own.
    pub fn add(&self, type_name: &str, attributes: Value) -> Result<Record, StoreError> {
        if !self.inner.schema.contains(type_name) {
            return Err(StoreError::UnknownType(type_name.to_string()));
        }
        let initial = match attributes {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(StoreError::InvalidDocument(format!(
                    "initial attributes must be an object, got {}",
                    other
                )))
            }
        };
        let data = RecordData::build(&self.inner.schema, type_name, initial);
        self.register(data)
    }

    /// Look up the record registered under `(type_name, id)`.
    pub fn get_one(&self, type_name: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let records = self
            .inner
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("store.get_one"))?;
        Ok(records
            .get(type_name)
            .and_then(|bucket| bucket.get(id))
            .map(|cell| Record::from_cell(self.clone(), cell.clone())))
    }

    /// Drop the record registered under `(type_name, id)`, along with every
    /// alias key pointing at the same instance.
    pub fn remove(&self, type_name: &str, id: &str) -> Result<(), StoreError> {
        let removed = {
            let mut records = self
                .inner
                .records
                .write()
                .map_err(|_| StoreError::LockPoisoned("store.remove"))?;
            match records.get_mut(type_name) {
                Some(bucket) => match bucket.get(id).cloned() {
                    Some(cell) => {
                        bucket.retain(|_, candidate| !Arc::ptr_eq(candidate, &cell));
                        true
                    }
                    None => false,
                },
                None => false,
            }
        };
        if removed {
            self.publish_change(ChangeEvent::record(type_name, id));
        }
        Ok(())
    }

    /// Fetch one record from the server, then answer from the identity map.
    ///
    /// A non-200 response leaves the map untouched, so the answer falls back
    /// to whatever is already known locally.
    pub async fn find_one(
        &self,
        type_name: &str,
        id: &str,
        options: FindOptions,
    ) -> Result<Option<Record>, StoreError> {
        if options.from_server {
            let url = self.url_for_record(type_name, id)?;
            let transport = self.transport_for("find_one")?;
            let response = transport.fetch(&url, self.get_request()?).await?;
            tracing::debug!(%url, status = response.status, "find_one");
            if response.status == 200 {
                if let Some(body) = &response.body {
                    self.decode_document(body)?;
                }
            }
        }
        self.get_one(type_name, id)
    }

    /// Fetch every record of `type_name` from the server, then enumerate the
    /// identity map for that type.
    pub async fn find_all(
        &self,
        type_name: &str,
        options: FindOptions,
    ) -> Result<Vec<Record>, StoreError> {
        if options.from_server {
            let url = self.url_for_type(type_name)?;
            let transport = self.transport_for("find_all")?;
            let response = transport.fetch(&url, self.get_request()?).await?;
            tracing::debug!(%url, status = response.status, "find_all");
            if response.status == 200 {
                if let Some(body) = &response.body {
                    self.decode_document(body)?;
                }
            }
        }
        self.local_records(type_name)
    }

    /// Forget every record. Configuration and listeners stay.
    pub fn reset(&self) -> Result<(), StoreError> {
        self.inner
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("store.reset"))?
            .clear();
        Ok(())
    }

    /// Subscribe to change notifications. Returns a listener id accepted by
    /// [`Store::remove_change_listener`].
    ///
    /// Callbacks run on the emitter's delivery thread, not on the thread
    /// performing the mutation.
    #[cfg(feature = "emitter")]
    pub fn on_change<F>(&self, listener: F) -> Result<String, StoreError>
    where
        F: Fn(ChangeEvent) + Send + Sync + 'static,
    {
        let mut events = self
            .inner
            .events
            .lock()
            .map_err(|_| StoreError::LockPoisoned("store.on_change"))?;
        Ok(events.on("change", move |payload: String| {
            if let Some(event) = ChangeEvent::from_payload(&payload) {
                listener(event);
            }
        }))
    }

    /// Drop a listener registered through [`Store::on_change`]. Returns
    /// whether the id was known.
    #[cfg(feature = "emitter")]
    pub fn remove_change_listener(&self, id: &str) -> Result<bool, StoreError> {
        let mut events = self
            .inner
            .events
            .lock()
            .map_err(|_| StoreError::LockPoisoned("store.remove_listener"))?;
        Ok(events.remove_listener(id).is_some())
    }

    /// Notify listeners. Callers publish after dropping record and map
    /// guards, never while holding one.
    pub(crate) fn publish_change(&self, event: ChangeEvent) {
        #[cfg(feature = "emitter")]
        if let Ok(mut events) = self.inner.events.lock() {
            events.emit("change", event.to_payload());
        }
        #[cfg(not(feature = "emitter"))]
        let _ = event;
    }

    /// Insert `data` under its current id and hand back the live handle.
    pub(crate) fn register(&self, data: RecordData) -> Result<Record, StoreError> {
        let type_name = data.type_name.clone();
        let id = data.id.clone();
        let cell: RecordCell = Arc::new(RwLock::new(data));
        {
            let mut records = self
                .inner
                .records
                .write()
                .map_err(|_| StoreError::LockPoisoned("store.register"))?;
            records
                .entry(type_name.clone())
                .or_default()
                .insert(id.clone(), cell.clone());
        }
        let record = Record::from_cell(self.clone(), cell);
        self.publish_change(ChangeEvent::record(type_name, id));
        Ok(record)
    }

    /// Key the instance stored under `old_id` under `new_id` as well. The
    /// old key stays behind as an alias, so identifiers captured before the
    /// change still resolve to the same instance.
    pub(crate) fn rekey(
        &self,
        type_name: &str,
        old_id: &str,
        new_id: &str,
    ) -> Result<(), StoreError> {
        let mut records = self
            .inner
            .records
            .write()
            .map_err(|_| StoreError::LockPoisoned("store.rekey"))?;
        if let Some(bucket) = records.get_mut(type_name) {
            if let Some(cell) = bucket.get(old_id).cloned() {
                bucket.insert(new_id.to_string(), cell);
            }
        }
        Ok(())
    }

    pub(crate) fn transport_for(
        &self,
        operation: &'static str,
    ) -> Result<Arc<dyn Transport>, StoreError> {
        self.inner
            .transport
            .read()
            .map_err(|_| StoreError::LockPoisoned("store.transport"))?
            .clone()
            .ok_or(StoreError::NoTransport(operation))
    }

    pub(crate) fn url_for_type(&self, type_name: &str) -> Result<String, StoreError> {
        Ok(format!("{}/{}", self.base_url()?, type_name))
    }

    pub(crate) fn url_for_record(&self, type_name: &str, id: &str) -> Result<String, StoreError> {
        Ok(format!("{}/{}/{}", self.base_url()?, type_name, id))
    }

    /// Headers for an outgoing request: the wire media type first, then any
    /// configured extras.
    pub(crate) fn request_headers(&self) -> Result<Vec<(String, String)>, StoreError> {
        let mut headers = vec![
            ("content-type".to_string(), JSONAPI_MEDIA_TYPE.to_string()),
            ("accept".to_string(), JSONAPI_MEDIA_TYPE.to_string()),
        ];
        headers.extend(
            self.inner
                .headers
                .read()
                .map_err(|_| StoreError::LockPoisoned("store.headers"))?
                .iter()
                .cloned(),
        );
        Ok(headers)
    }

    fn get_request(&self) -> Result<FetchRequest, StoreError> {
        Ok(FetchRequest {
            method: Method::Get,
            headers: self.request_headers()?,
            body: None,
        })
    }

    fn local_records(&self, type_name: &str) -> Result<Vec<Record>, StoreError> {
        let records = self
            .inner
            .records
            .read()
            .map_err(|_| StoreError::LockPoisoned("store.find_all"))?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        if let Some(bucket) = records.get(type_name) {
            for cell in bucket.values() {
                // alias keys point at the same cell; yield each instance once
                if seen.insert(Arc::as_ptr(cell) as usize) {
                    out.push(Record::from_cell(self.clone(), cell.clone()));
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Store");
        debug.field("types", &self.inner.schema.type_names().collect::<Vec<_>>());
        if let Ok(records) = self.inner.records.read() {
            let keys: usize = records.values().map(|bucket| bucket.len()).sum();
            debug.field("keys", &keys);
        }
        debug.finish()
    }
}
