//! JSON:API codec: wire-shape types plus the encode and decode halves.
//!
//! Encoding turns store records into `{data, included}` documents. The
//! `included` walk is recursive, depth-first in relationship declaration
//! order, and cycle-safe: a seen-set of (type, id) pairs is seeded with
//! every primary resource and each included resource enters it before its
//! own relationships are walked, so cyclic graphs terminate and nothing is
//! included twice.
//!
//! Decoding works on raw `serde_json::Value` documents rather than the
//! typed structs, because the store has to distinguish a relationship entry
//! with no `data` member (a meta-only placeholder, skipped) from one whose
//! `data` is null (an explicit clearing), and has to accept numeric ids.

mod decode;
mod document;
mod encode;

pub use document::{
    stringify_id, Document, Identifier, PrimaryData, RelationshipData, RelationshipObject,
    Resource,
};
pub use encode::{server_response, server_response_all, to_full_jsonapi, JsonapiOptions};

pub(crate) use decode::{parse_resource, ParsedResource};
