//! Entity type declarations.
//!
//! Types are declared through a [`Registry`], then frozen into an immutable
//! [`Schema`] that every entity operation consults.

mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::hash::BuildHasherDefault;

use hashers::fx_hash::FxHasher;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, ErrorKind, Result};
use crate::relation::RelationDescriptor;

pub use registry::Registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    String,
    Integer,
    Boolean,
    Float,
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
            Primitive::Float => "float",
        })
    }
}

/// What a collection field holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementKind {
    Primitive(Primitive),
    /// Ids of entities of the named type.
    Reference(String),
}

impl ElementKind {
    pub fn target(&self) -> Option<&str> {
        match self {
            ElementKind::Reference(prefix) => Some(prefix),
            ElementKind::Primitive(_) => None,
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ElementKind::Primitive(p) => write!(f, "{}", p),
            ElementKind::Reference(prefix) => write!(f, "reference to {}", prefix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Scalar(Primitive),
    /// A single id of an entity of the named type.
    Reference(String),
    Set(ElementKind),
    List(ElementKind),
    SortedSet(ElementKind),
}

impl FieldKind {
    /// The entity type this field points at, if any.
    pub fn target(&self) -> Option<&str> {
        match self {
            FieldKind::Scalar(_) => None,
            FieldKind::Reference(prefix) => Some(prefix),
            FieldKind::Set(e) | FieldKind::List(e) | FieldKind::SortedSet(e) => e.target(),
        }
    }

    pub fn element(&self) -> Option<&ElementKind> {
        match self {
            FieldKind::Set(e) | FieldKind::List(e) | FieldKind::SortedSet(e) => Some(e),
            FieldKind::Scalar(_) | FieldKind::Reference(_) => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        self.element().is_some()
    }

    /// Lists and sorted sets: containers whose order carries meaning.
    pub fn is_sequence(&self) -> bool {
        matches!(self, FieldKind::List(_) | FieldKind::SortedSet(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldKind::Scalar(p) => write!(f, "{}", p),
            FieldKind::Reference(prefix) => write!(f, "reference to {}", prefix),
            FieldKind::Set(e) => write!(f, "set of {}", e),
            FieldKind::List(e) => write!(f, "list of {}", e),
            FieldKind::SortedSet(e) => write!(f, "sorted set of {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    /// Back-reference bookkeeping for one-directional relations. Not readable
    /// or writable through entity handles.
    pub hidden: bool,
}

/// Container shape of one side of a relation, as passed to
/// [`Registry::relate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Container {
    One,
    Set,
    List,
    Sorted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub prefix: String,
    pub container: Container,
}

impl Endpoint {
    /// Kind of a field that points at this endpoint.
    pub(crate) fn kind(&self) -> FieldKind {
        let element = ElementKind::Reference(self.prefix.clone());
        match self.container {
            Container::One => FieldKind::Reference(self.prefix.clone()),
            Container::Set => FieldKind::Set(element),
            Container::List => FieldKind::List(element),
            Container::Sorted => FieldKind::SortedSet(element),
        }
    }
}

pub fn one(prefix: &str) -> Endpoint {
    Endpoint { prefix: prefix.to_owned(), container: Container::One }
}

pub fn set(prefix: &str) -> Endpoint {
    Endpoint { prefix: prefix.to_owned(), container: Container::Set }
}

pub fn list(prefix: &str) -> Endpoint {
    Endpoint { prefix: prefix.to_owned(), container: Container::List }
}

pub fn sorted(prefix: &str) -> Endpoint {
    Endpoint { prefix: prefix.to_owned(), container: Container::Sorted }
}

/// A declared record kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityType {
    prefix: String,
    fields: Vec<FieldDef>,
    relations: BTreeMap<String, RelationDescriptor>,
    lookups: BTreeMap<String, bool>,
}

impl EntityType {
    pub(crate) fn new(prefix: &str) -> EntityType {
        EntityType {
            prefix: prefix.to_owned(),
            fields: Vec::new(),
            relations: BTreeMap::new(),
            lookups: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Fields visible to callers, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| !f.hidden)
    }

    /// Every field including hidden back-references, in declaration order.
    pub(crate) fn all_fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Kind of a caller-visible field.
    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|f| f.name == name && !f.hidden)
            .map(|f| &f.kind)
    }

    pub(crate) fn any_field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.kind)
    }

    pub(crate) fn require_field(&self, name: &str) -> Result<&FieldKind> {
        self.field(name)
            .ok_or_else(|| Error::invalid_field(&self.prefix, name))
    }

    pub fn relation(&self, field: &str) -> Option<&RelationDescriptor> {
        self.relations.get(field)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&String, &RelationDescriptor)> {
        self.relations.iter()
    }

    /// `Some(injective)` if `field` carries a lookup.
    pub fn lookup(&self, field: &str) -> Option<bool> {
        self.lookups.get(field).copied()
    }

    pub(crate) fn add_field(&mut self, name: &str, kind: FieldKind, hidden: bool) -> Result<()> {
        if self.any_field(name).is_some() {
            return Err(Error::new(
                ErrorKind::InvalidField,
                format!("`{}` already has a field named `{}`", self.prefix, name),
            ));
        }
        self.fields.push(FieldDef {
            name: name.to_owned(),
            kind,
            hidden,
        });
        Ok(())
    }

    pub(crate) fn add_relation(&mut self, field: &str, descriptor: RelationDescriptor) {
        self.relations.insert(field.to_owned(), descriptor);
    }

    pub(crate) fn add_lookup(&mut self, field: &str, injective: bool) {
        self.lookups.insert(field.to_owned(), injective);
    }
}

pub(crate) type TypeMap = HashMap<String, EntityType, BuildHasherDefault<FxHasher>>;

/// The frozen set of entity types a database operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    types: TypeMap,
}

impl Schema {
    pub(crate) fn new(types: TypeMap) -> Schema {
        Schema { types }
    }

    pub fn get(&self, prefix: &str) -> Result<&EntityType> {
        self.types
            .get(prefix)
            .ok_or_else(|| Error::unregistered(prefix))
    }

    pub fn types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Schema> {
        Ok(serde_json::from_str(json)?)
    }
}
