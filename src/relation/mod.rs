//! Relation resolution.
//!
//! Given a write on one side of a relation, decides which physical operations
//! keep the other side in agreement. Resolution reads the current state of the
//! inverse side but never writes; the caller applies the returned [`Op`]s.

mod descriptor;

use tracing::trace;

use crate::error::{Error, ErrorKind, Result};
use crate::schema::{EntityType, FieldKind, Schema};
use crate::store::{keys, Store};

pub use descriptor::{Cardinality, RelationDescriptor};

/// A single physical write against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    ScalarSet { record: String, field: String, value: String },
    ScalarDelete { record: String, field: String },
    SetAdd { key: String, member: String },
    SetRemove { key: String, member: String },
    ListPush { key: String, member: String },
    ListRemove { key: String, member: String },
    SortedAdd { key: String, member: String, score: f64 },
    SortedRemove { key: String, member: String },
}

impl Op {
    pub fn apply(&self, store: &dyn Store) -> Result<()> {
        trace!(op = ?self, "apply");
        match self {
            Op::ScalarSet { record, field, value } => store.scalar_set(record, field, value),
            Op::ScalarDelete { record, field } => store.scalar_delete(record, field).map(drop),
            Op::SetAdd { key, member } => store.set_add(key, &[member.clone()]).map(drop),
            Op::SetRemove { key, member } => store.set_remove(key, &[member.clone()]).map(drop),
            Op::ListPush { key, member } => store.list_push(key, &[member.clone()]),
            Op::ListRemove { key, member } => store.list_remove(key, &[member.clone()]).map(drop),
            Op::SortedAdd { key, member, score } => {
                store.sorted_add(key, &[(member.clone(), *score)]).map(drop)
            }
            Op::SortedRemove { key, member } => {
                store.sorted_remove(key, &[member.clone()]).map(drop)
            }
        }
    }
}

pub fn apply_all(ops: &[Op], store: &dyn Store) -> Result<()> {
    for op in ops {
        op.apply(store)?;
    }
    Ok(())
}

/// Resolves relation side effects for one entity.
pub struct Resolver<'a> {
    schema: &'a Schema,
    owner: &'a EntityType,
    id: &'a str,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a Schema, owner: &'a EntityType, id: &'a str) -> Resolver<'a> {
        Resolver { schema, owner, id }
    }

    fn inverse_of(&self, field: &str) -> Result<Option<(&'a RelationDescriptor, &'a FieldKind)>> {
        let descriptor = match self.owner.relation(field) {
            Some(descriptor) => descriptor,
            None => return Ok(None),
        };
        let target = self.schema.get(&descriptor.target)?;
        let kind = target
            .any_field(&descriptor.inverse)
            .ok_or_else(|| Error::invalid_field(&descriptor.target, &descriptor.inverse))?;
        Ok(Some((descriptor, kind)))
    }

    /// Operations detaching this entity from `old` on the inverse side of `field`.
    ///
    /// A single-reference inverse is only cleared while it still points at this
    /// entity, so a value already reassigned elsewhere survives.
    pub fn unlink(&self, field: &str, old: &str, store: &dyn Store) -> Result<Vec<Op>> {
        match self.inverse_of(field)? {
            None => Ok(Vec::new()),
            Some((descriptor, kind)) => detach(
                kind,
                &descriptor.target,
                old,
                &descriptor.inverse,
                self.id,
                store,
            ),
        }
    }

    /// Operations attaching this entity to `new` on the inverse side of `field`.
    ///
    /// When the inverse is a single reference already owned by a third entity,
    /// that entity first loses `new` from its own `field`: an owner transfer.
    pub fn link(&self, field: &str, new: &str, store: &dyn Store) -> Result<Vec<Op>> {
        let (descriptor, kind) = match self.inverse_of(field)? {
            None => return Ok(Vec::new()),
            Some(found) => found,
        };
        let target = &descriptor.target;
        let inverse = &descriptor.inverse;
        match kind {
            FieldKind::Reference(_) => {
                let record = keys::record(target, new);
                let mut ops = Vec::new();
                match store.scalar_get(&record, inverse)? {
                    Some(previous) if previous == self.id => return Ok(ops),
                    Some(previous) => {
                        let local = self
                            .owner
                            .any_field(field)
                            .ok_or_else(|| Error::invalid_field(self.owner.prefix(), field))?;
                        ops.extend(detach(local, self.owner.prefix(), &previous, field, new, store)?);
                    }
                    None => {}
                }
                ops.push(Op::ScalarSet {
                    record,
                    field: inverse.clone(),
                    value: self.id.to_owned(),
                });
                Ok(ops)
            }
            FieldKind::Set(_) => {
                let key = keys::field(target, new, inverse);
                if store.set_contains(&key, self.id)? {
                    return Ok(Vec::new());
                }
                Ok(vec![Op::SetAdd { key, member: self.id.to_owned() }])
            }
            FieldKind::List(_) => {
                let key = keys::field(target, new, inverse);
                if store.list_items(&key)?.iter().any(|m| m == self.id) {
                    return Ok(Vec::new());
                }
                Ok(vec![Op::ListPush { key, member: self.id.to_owned() }])
            }
            FieldKind::SortedSet(_) => {
                let key = keys::field(target, new, inverse);
                if store.sorted_members(&key)?.iter().any(|(m, _)| m == self.id) {
                    return Ok(Vec::new());
                }
                Ok(vec![Op::SortedAdd {
                    key,
                    member: self.id.to_owned(),
                    score: 0.0,
                }])
            }
            FieldKind::Scalar(_) => Err(scalar_inverse(target, inverse)),
        }
    }
}

/// Removes `member` from `owner_id.field`, whose kind is `kind`.
fn detach(
    kind: &FieldKind,
    owner_prefix: &str,
    owner_id: &str,
    field: &str,
    member: &str,
    store: &dyn Store,
) -> Result<Vec<Op>> {
    let member = member.to_owned();
    match kind {
        FieldKind::Reference(_) => {
            let record = keys::record(owner_prefix, owner_id);
            if store.scalar_get(&record, field)?.as_deref() == Some(member.as_str()) {
                Ok(vec![Op::ScalarDelete { record, field: field.to_owned() }])
            } else {
                Ok(Vec::new())
            }
        }
        FieldKind::Set(_) => Ok(vec![Op::SetRemove {
            key: keys::field(owner_prefix, owner_id, field),
            member,
        }]),
        FieldKind::List(_) => Ok(vec![Op::ListRemove {
            key: keys::field(owner_prefix, owner_id, field),
            member,
        }]),
        FieldKind::SortedSet(_) => Ok(vec![Op::SortedRemove {
            key: keys::field(owner_prefix, owner_id, field),
            member,
        }]),
        FieldKind::Scalar(_) => Err(scalar_inverse(owner_prefix, field)),
    }
}

fn scalar_inverse(prefix: &str, field: &str) -> Error {
    Error::new(
        ErrorKind::UnsupportedFieldShape,
        format!("`{}.{}` holds a primitive and cannot be a relation side", prefix, field),
    )
}
