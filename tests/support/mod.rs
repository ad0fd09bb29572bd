use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use jsonapi_store::{
    AttributeDefinition, DataType, FetchRequest, FetchResponse, RelationshipDefinition, Schema,
    Store, Transport, TransportError, ValidationDefinition,
};
use serde_json::{json, Value};

static TRACING: Once = Once::new();

/// Routes `tracing` output through the test harness, filtered by
/// `RUST_LOG`. Safe to call from every test; only the first call in a
/// process installs the subscriber.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Schema shared across the integration tests: todos carry a defaulted
/// title and a date, and link to notes both ways.
pub fn todo_schema() -> Schema {
    Schema::new()
        .register("todos")
        .attribute(
            "todos",
            AttributeDefinition::new("title", DataType::String).with_default(json!("NEW TODO")),
        )
        .attribute(
            "todos",
            AttributeDefinition::new("created_at", DataType::DateTime),
        )
        .relationship(
            "todos",
            RelationshipDefinition::to_many("notes", "notes").with_inverse("todo"),
        )
        .validation("todos", ValidationDefinition::presence("title"))
        .register("notes")
        .attribute("notes", AttributeDefinition::new("body", DataType::String))
        .relationship(
            "notes",
            RelationshipDefinition::to_one("todo", "todos").with_inverse("notes"),
        )
}

pub fn todo_store() -> Store {
    init_tracing();
    Store::new(todo_schema()).with_base_url("http://api.test")
}

/// Transport double: hands out scripted responses in order and records
/// every call. Clones share the script and the call log, so tests keep a
/// handle after giving one to the store.
#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<VecDeque<FetchResponse>>>,
    calls: Arc<Mutex<Vec<(String, FetchRequest)>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    pub fn push_response(&self, status: u16, body: Option<Value>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(FetchResponse::new(status, body));
    }

    pub fn calls(&self) -> Vec<(String, FetchRequest)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(
        &self,
        url: &str,
        request: FetchRequest,
    ) -> Result<FetchResponse, TransportError> {
        self.calls.lock().unwrap().push((url.to_string(), request));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Request("connection refused".to_string()))
    }
}
