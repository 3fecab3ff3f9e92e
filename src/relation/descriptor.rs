use serde_derive::{Deserialize, Serialize};

use crate::schema::FieldKind;

/// How many entities sit on each side of a relation, seen from the field
/// that owns the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    OneToOne,
    /// This side holds a collection, the other side a single reference.
    OneToMany,
    /// This side holds a single reference, the other side a collection.
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    pub fn between(local: &FieldKind, inverse: &FieldKind) -> Cardinality {
        match (local.is_collection(), inverse.is_collection()) {
            (false, false) => Cardinality::OneToOne,
            (true, false) => Cardinality::OneToMany,
            (false, true) => Cardinality::ManyToOne,
            (true, true) => Cardinality::ManyToMany,
        }
    }
}

/// One side of a declared relation: where the inverse lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    pub target: String,
    pub inverse: String,
    pub cardinality: Cardinality,
    /// The inverse is a hidden back-reference set kept only so deletion can
    /// find and clear referrers of a one-directional relation.
    pub back_reference: bool,
    /// Same type and same field on both sides, e.g. mutual friends.
    pub reflexive: bool,
}
