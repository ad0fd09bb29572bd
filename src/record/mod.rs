//! Records and their lifecycle: attributes, relationships, dirty tracking,
//! snapshots, and rollback.
//!
//! A [`Record`] is a cheap handle; the state lives in the store's identity
//! map, so every lookup of the same (type, id) yields a handle to the same
//! instance and `==` means identity. Records are constructed through
//! [`crate::store::Store::add`], never directly.
//!
//! ```ignore
//! let todo = store.add("todos", json!({"title": "Buy Milk"}))?;
//! assert!(todo.is_new()? && todo.is_dirty()?);
//!
//! todo.set_attribute("title", json!("Buy Oat Milk"))?;
//! assert_eq!(todo.dirty_attributes()?, vec!["title"]);
//! todo.rollback()?;
//! ```

mod collection;
mod record;
mod snapshot;
mod temp_id;

pub use collection::RelatedCollection;
pub use record::Record;
pub use snapshot::Snapshot;

pub(crate) use record::{RecordCell, RecordData};
pub(crate) use temp_id::is_temp_id;
