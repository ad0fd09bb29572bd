use std::sync::Arc;

use crate::codec::{Identifier, RelationshipData};
use crate::error::StoreError;
use crate::events::ChangeEvent;
use crate::record::record::{Record, RecordCell};
use crate::store::Store;

/// Handle over the many-side of a to-many relationship. Membership is a
/// set keyed by (type, id); order carries no meaning. Mutations mark the
/// owner dirty and keep the declared inverse on the target consistent.
pub struct RelatedCollection {
    store: Store,
    owner: RecordCell,
    name: String,
}

impl RelatedCollection {
    pub(crate) fn new(store: Store, owner: RecordCell, name: String) -> Self {
        RelatedCollection { store, owner, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The linked identifiers, dangling ones included.
    pub fn identifiers(&self) -> Result<Vec<Identifier>, StoreError> {
        let data = self
            .owner
            .read()
            .map_err(|_| StoreError::LockPoisoned("collection.identifiers"))?;
        match data.relationships.get(&self.name) {
            Some(RelationshipData::Many(members)) => Ok(members.clone()),
            _ => Err(StoreError::UnknownRelationship {
                type_name: data.type_name.clone(),
                name: self.name.clone(),
            }),
        }
    }

    /// Resolves the membership through the store, skipping identifiers that
    /// no longer resolve.
    pub fn records(&self) -> Result<Vec<Record>, StoreError> {
        let mut records = Vec::new();
        for identifier in self.identifiers()? {
            if let Some(record) = self.store.get_one(&identifier.type_name, &identifier.id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.identifiers()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.identifiers()?.is_empty())
    }

    /// Membership test that survives re-keying: an identifier counts as the
    /// record if it is equal or resolves to the same instance.
    pub fn contains(&self, record: &Record) -> Result<bool, StoreError> {
        let target_ident = record.identifier()?;
        for identifier in self.identifiers()? {
            if identifier == target_ident || resolves_to(&self.store, &identifier, &record.cell)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Adds a record. Idempotent on (type, id); a record already present
    /// leaves the membership and the inverse untouched.
    pub fn add(&self, record: &Record) -> Result<(), StoreError> {
        if self.contains(record)? {
            return Ok(());
        }
        let target_ident = record.identifier()?;
        let (owner_type, owner_id) = {
            let data = self
                .owner
                .read()
                .map_err(|_| StoreError::LockPoisoned("collection.add"))?;
            (data.type_name.clone(), data.id.clone())
        };
        let owner_ident = Identifier::new(owner_type.clone(), owner_id.clone());

        {
            let mut data = self
                .owner
                .write()
                .map_err(|_| StoreError::LockPoisoned("collection.add"))?;
            match data.relationships.get_mut(&self.name) {
                Some(RelationshipData::Many(members)) => members.push(target_ident),
                _ => {
                    return Err(StoreError::UnknownRelationship {
                        type_name: owner_type,
                        name: self.name.clone(),
                    })
                }
            }
            data.dirty = true;
        }
        let mut events = vec![ChangeEvent::relationship(
            owner_type.clone(),
            owner_id,
            self.name.clone(),
        )];

        if let Some(inverse_name) = self
            .store
            .schema()
            .relationship_for(&owner_type, &self.name)
            .and_then(|definition| definition.inverse.clone())
        {
            if let Some(event) =
                write_inverse(&self.store, record, &inverse_name, &owner_ident, &self.owner)?
            {
                events.push(event);
            }
        }

        for event in events {
            self.store.publish_change(event);
        }
        Ok(())
    }

    /// Removes a record, clearing the inverse side when it still points at
    /// the owner. No-op when the record is not a member.
    pub fn remove(&self, record: &Record) -> Result<(), StoreError> {
        let target_ident = record.identifier()?;
        let (owner_type, owner_id, members) = {
            let data = self
                .owner
                .read()
                .map_err(|_| StoreError::LockPoisoned("collection.remove"))?;
            match data.relationships.get(&self.name) {
                Some(RelationshipData::Many(members)) => {
                    (data.type_name.clone(), data.id.clone(), members.clone())
                }
                _ => {
                    return Err(StoreError::UnknownRelationship {
                        type_name: data.type_name.clone(),
                        name: self.name.clone(),
                    })
                }
            }
        };

        let mut kept = Vec::with_capacity(members.len());
        let mut removed = false;
        for member in members {
            if member == target_ident || resolves_to(&self.store, &member, &record.cell)? {
                removed = true;
            } else {
                kept.push(member);
            }
        }
        if !removed {
            return Ok(());
        }

        {
            let mut data = self
                .owner
                .write()
                .map_err(|_| StoreError::LockPoisoned("collection.remove"))?;
            data.relationships
                .insert(self.name.clone(), RelationshipData::Many(kept));
            data.dirty = true;
        }
        let owner_ident = Identifier::new(owner_type.clone(), owner_id.clone());
        let mut events = vec![ChangeEvent::relationship(
            owner_type.clone(),
            owner_id,
            self.name.clone(),
        )];

        if let Some(inverse_name) = self
            .store
            .schema()
            .relationship_for(&owner_type, &self.name)
            .and_then(|definition| definition.inverse.clone())
        {
            if let Some(event) =
                clear_inverse(&self.store, record, &inverse_name, &owner_ident, &self.owner)?
            {
                events.push(event);
            }
        }

        for event in events {
            self.store.publish_change(event);
        }
        Ok(())
    }
}

/// Whether `identifier` currently resolves to the given cell. Used for
/// identity checks that must hold across temp-id re-keying.
pub(crate) fn resolves_to(
    store: &Store,
    identifier: &Identifier,
    cell: &RecordCell,
) -> Result<bool, StoreError> {
    Ok(match store.get_one(&identifier.type_name, &identifier.id)? {
        Some(record) => Arc::ptr_eq(&record.cell, cell),
        None => false,
    })
}

fn matches_owner(
    store: &Store,
    identifier: &Identifier,
    owner_ident: &Identifier,
    owner_cell: &RecordCell,
) -> Result<bool, StoreError> {
    if identifier == owner_ident {
        return Ok(true);
    }
    resolves_to(store, identifier, owner_cell)
}

/// Points the target's inverse relationship back at the owner by writing
/// the target's state directly. Single-level propagation: this never calls
/// back through the forward mutators, so mutual inverses cannot recurse.
pub(crate) fn write_inverse(
    store: &Store,
    target: &Record,
    inverse_name: &str,
    owner_ident: &Identifier,
    owner_cell: &RecordCell,
) -> Result<Option<ChangeEvent>, StoreError> {
    let (target_type, target_id, state) = {
        let data = target.read("collection.write_inverse")?;
        (
            data.type_name.clone(),
            data.id.clone(),
            data.relationships.get(inverse_name).cloned(),
        )
    };

    let already_linked = match &state {
        Some(RelationshipData::One(Some(linked))) => {
            matches_owner(store, linked, owner_ident, owner_cell)?
        }
        Some(RelationshipData::One(None)) => false,
        Some(RelationshipData::Many(members)) => {
            let mut linked = false;
            for member in members {
                if matches_owner(store, member, owner_ident, owner_cell)? {
                    linked = true;
                    break;
                }
            }
            linked
        }
        // the target's type does not declare the inverse; nothing to sync
        None => return Ok(None),
    };
    if already_linked {
        return Ok(None);
    }

    let mut data = target.write("collection.write_inverse")?;
    match data.relationships.get_mut(inverse_name) {
        Some(RelationshipData::One(slot)) => *slot = Some(owner_ident.clone()),
        Some(RelationshipData::Many(members)) => members.push(owner_ident.clone()),
        None => return Ok(None),
    }
    data.dirty = true;
    Ok(Some(ChangeEvent::relationship(
        target_type,
        target_id,
        inverse_name,
    )))
}

/// Clears the target's inverse reference, but only when it still points at
/// the owner. Direct field write, same non-recursive discipline as
/// [`write_inverse`].
pub(crate) fn clear_inverse(
    store: &Store,
    target: &Record,
    inverse_name: &str,
    owner_ident: &Identifier,
    owner_cell: &RecordCell,
) -> Result<Option<ChangeEvent>, StoreError> {
    let (target_type, target_id, state) = {
        let data = target.read("collection.clear_inverse")?;
        (
            data.type_name.clone(),
            data.id.clone(),
            data.relationships.get(inverse_name).cloned(),
        )
    };

    match state {
        Some(RelationshipData::One(Some(linked))) => {
            if !matches_owner(store, &linked, owner_ident, owner_cell)? {
                return Ok(None);
            }
            let mut data = target.write("collection.clear_inverse")?;
            data.relationships
                .insert(inverse_name.to_string(), RelationshipData::One(None));
            data.dirty = true;
            Ok(Some(ChangeEvent::relationship(
                target_type,
                target_id,
                inverse_name,
            )))
        }
        Some(RelationshipData::Many(members)) => {
            let mut kept = Vec::with_capacity(members.len());
            let mut removed = false;
            for member in members {
                if matches_owner(store, &member, owner_ident, owner_cell)? {
                    removed = true;
                } else {
                    kept.push(member);
                }
            }
            if !removed {
                return Ok(None);
            }
            let mut data = target.write("collection.clear_inverse")?;
            data.relationships
                .insert(inverse_name.to_string(), RelationshipData::Many(kept));
            data.dirty = true;
            Ok(Some(ChangeEvent::relationship(
                target_type,
                target_id,
                inverse_name,
            )))
        }
        _ => Ok(None),
    }
}
