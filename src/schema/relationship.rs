/// Cardinality of a declared relationship.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Declared relationship of a resource type. `targets` lists the resource
/// types the relationship may point at; more than one makes a polymorphic
/// to-one. `inverse` names the relationship on the target type that mirrors
/// this one; when present the store keeps both sides consistent on every
/// mutation.
#[derive(Clone, Debug)]
pub struct RelationshipDefinition {
    pub name: String,
    pub targets: Vec<String>,
    pub cardinality: Cardinality,
    pub inverse: Option<String>,
}

impl RelationshipDefinition {
    pub fn to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        RelationshipDefinition {
            name: name.into(),
            targets: vec![target.into()],
            cardinality: Cardinality::ToOne,
            inverse: None,
        }
    }

    pub fn to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        RelationshipDefinition {
            name: name.into(),
            targets: vec![target.into()],
            cardinality: Cardinality::ToMany,
            inverse: None,
        }
    }

    /// Adds another allowed target type.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn with_inverse(mut self, name: impl Into<String>) -> Self {
        self.inverse = Some(name.into());
        self
    }

    /// The primary target type. `None` only for a hand-built definition
    /// with an empty `targets`; the constructors always set one.
    pub fn target(&self) -> Option<&str> {
        self.targets.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_cardinality() {
        let one = RelationshipDefinition::to_one("author", "users");
        assert_eq!(one.cardinality, Cardinality::ToOne);
        assert_eq!(one.target(), Some("users"));
        assert!(one.inverse.is_none());

        let many = RelationshipDefinition::to_many("comments", "comments").with_inverse("post");
        assert_eq!(many.cardinality, Cardinality::ToMany);
        assert_eq!(many.inverse.as_deref(), Some("post"));
    }

    #[test]
    fn polymorphic_targets() {
        let rel = RelationshipDefinition::to_one("owner", "users").with_target("organizations");
        assert_eq!(rel.targets, vec!["users", "organizations"]);
        assert_eq!(rel.target(), Some("users"));
    }

    #[test]
    fn hand_built_definitions_may_have_no_target() {
        let rel = RelationshipDefinition {
            name: "owner".to_string(),
            targets: Vec::new(),
            cardinality: Cardinality::ToOne,
            inverse: None,
        };
        assert_eq!(rel.target(), None);
    }
}
