mod codec;
mod error;
mod events;
mod persist;
mod record;
mod schema;
mod store;
mod transport;

pub use codec::{
    server_response, server_response_all, stringify_id, to_full_jsonapi, Document, Identifier,
    JsonapiOptions, PrimaryData, RelationshipData, RelationshipObject, Resource,
};
pub use error::{ErrorDetail, StoreError};
pub use events::{ChangeEvent, ChangeKind};
pub use persist::{DestroyOptions, SaveOptions};
pub use record::{Record, RelatedCollection, Snapshot};
pub use schema::{
    AttributeDefinition, Cardinality, DataType, RelationshipDefinition, Schema,
    ValidationDefinition, ValidationFailure, Validator,
};
pub use store::{FindOptions, Store, JSONAPI_MEDIA_TYPE};
pub use transport::{FetchRequest, FetchResponse, Method, Transport, TransportError};

// Re-export the reqwest-backed transport when the http feature is enabled
#[cfg(feature = "http")]
pub use transport::HttpTransport;
