//! Schema registry: declared resource types, their attributes,
//! relationships, and validation rules.
//!
//! A [`Schema`] is built once, up front, and handed to the store. It is an
//! explicit object with normal ownership, so independent stores (and tests)
//! can each carry their own. Definitions accumulate in declaration order,
//! which fixes the attribute order of encoded documents and the traversal
//! order of `included` resources. Re-declaring a (type, property) pair
//! overwrites the earlier definition; last writer wins.
//!
//! ```ignore
//! let schema = Schema::new()
//!     .attribute("todos", AttributeDefinition::new("title", DataType::String)
//!         .with_default(json!("NEW TODO")))
//!     .attribute("todos", AttributeDefinition::new("completed", DataType::Boolean))
//!     .relationship("todos", RelationshipDefinition::to_many("notes", "notes")
//!         .with_inverse("todo"))
//!     .validation("todos", ValidationDefinition::presence("title"))
//!     .attribute("notes", AttributeDefinition::new("description", DataType::String))
//!     .relationship("notes", RelationshipDefinition::to_one("todo", "todos")
//!         .with_inverse("notes"));
//! ```

mod attribute;
mod relationship;
mod validation;

pub use attribute::{AttributeDefinition, DataType};
pub use relationship::{Cardinality, RelationshipDefinition};
pub use validation::{ValidationDefinition, ValidationFailure, Validator};

#[derive(Clone, Debug, Default)]
struct TypeEntry {
    attributes: Vec<AttributeDefinition>,
    relationships: Vec<RelationshipDefinition>,
    validations: Vec<ValidationDefinition>,
}

/// The registry itself. Append-only: definitions are added during setup and
/// read for the rest of the session; there is no removal operation.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    types: Vec<(String, TypeEntry)>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    /// Registers a type with no definitions yet. Registration also happens
    /// implicitly on the first definition added for a type.
    pub fn register(mut self, type_name: impl Into<String>) -> Self {
        self.entry(type_name.into());
        self
    }

    pub fn attribute(mut self, type_name: impl Into<String>, definition: AttributeDefinition) -> Self {
        let entry = self.entry(type_name.into());
        match entry.attributes.iter_mut().find(|a| a.name == definition.name) {
            Some(existing) => *existing = definition,
            None => entry.attributes.push(definition),
        }
        self
    }

    pub fn relationship(
        mut self,
        type_name: impl Into<String>,
        definition: RelationshipDefinition,
    ) -> Self {
        let entry = self.entry(type_name.into());
        match entry.relationships.iter_mut().find(|r| r.name == definition.name) {
            Some(existing) => *existing = definition,
            None => entry.relationships.push(definition),
        }
        self
    }

    pub fn validation(
        mut self,
        type_name: impl Into<String>,
        definition: ValidationDefinition,
    ) -> Self {
        let entry = self.entry(type_name.into());
        match entry
            .validations
            .iter_mut()
            .find(|v| v.attribute == definition.attribute)
        {
            Some(existing) => *existing = definition,
            None => entry.validations.push(definition),
        }
        self
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.iter().any(|(name, _)| name == type_name)
    }

    /// Declared attributes of a type, in declaration order. Empty for an
    /// unregistered type.
    pub fn structure_for(&self, type_name: &str) -> &[AttributeDefinition] {
        self.find(type_name).map(|e| e.attributes.as_slice()).unwrap_or(&[])
    }

    /// Declared relationships of a type, in declaration order.
    pub fn relations_for(&self, type_name: &str) -> &[RelationshipDefinition] {
        self.find(type_name).map(|e| e.relationships.as_slice()).unwrap_or(&[])
    }

    pub fn validations_for(&self, type_name: &str) -> &[ValidationDefinition] {
        self.find(type_name).map(|e| e.validations.as_slice()).unwrap_or(&[])
    }

    pub fn attribute_for(&self, type_name: &str, name: &str) -> Option<&AttributeDefinition> {
        self.structure_for(type_name).iter().find(|a| a.name == name)
    }

    pub fn relationship_for(&self, type_name: &str, name: &str) -> Option<&RelationshipDefinition> {
        self.relations_for(type_name).iter().find(|r| r.name == name)
    }

    /// Registered type names in declaration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|(name, _)| name.as_str())
    }

    fn find(&self, type_name: &str) -> Option<&TypeEntry> {
        self.types
            .iter()
            .find(|(name, _)| name == type_name)
            .map(|(_, entry)| entry)
    }

    fn entry(&mut self, type_name: String) -> &mut TypeEntry {
        if let Some(position) = self.types.iter().position(|(name, _)| *name == type_name) {
            return &mut self.types[position].1;
        }
        self.types.push((type_name, TypeEntry::default()));
        &mut self.types.last_mut().expect("just pushed").1
    }
}
