//! Identity-mapped record storage.
//!
//! A [`Store`] owns one shared cell per `(type, id)` pair and hands out
//! [`Record`](crate::record::Record) handles onto those cells. Wire
//! documents decoded through the store land in the same map, so a server
//! payload and a local edit always meet on the same instance.
//!
//! # Example
//!
//! ```ignore
//! use jsonapi_store::{AttributeDefinition, DataType, Schema, Store};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .register("todos")
//!     .attribute("todos", AttributeDefinition::new("title", DataType::String));
//!
//! let store = Store::new(schema).with_base_url("http://localhost:3000");
//! let todo = store.add("todos", json!({"title": "Buy Milk"}))?;
//! ```

mod decode;
mod store;

pub use store::{FindOptions, Store, JSONAPI_MEDIA_TYPE};
