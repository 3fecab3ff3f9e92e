use std::collections::BTreeMap;

use tracing::info;

use super::{ElementKind, Endpoint, EntityType, FieldKind, Schema, TypeMap};
use crate::error::{Error, ErrorKind, Result};
use crate::relation::{Cardinality, RelationDescriptor};

/// Collects entity type declarations until [`Registry::freeze`].
///
/// Every declaration is staged on copies of the affected types and only
/// committed once it is fully valid, so a rejected `relate` leaves the
/// registry as it was.
#[derive(Debug, Default)]
pub struct Registry {
    types: TypeMap,
    order: Vec<String>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn define_type(&mut self, prefix: &str, fields: Vec<(String, FieldKind)>) -> Result<&mut Registry> {
        check_name("type prefix", prefix)?;
        if self.types.contains_key(prefix) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("entity type `{}` is already defined", prefix),
            ));
        }
        let mut entity_type = EntityType::new(prefix);
        for (name, kind) in fields {
            check_name("field name", &name)?;
            entity_type.add_field(&name, kind, false)?;
        }
        self.types.insert(prefix.to_owned(), entity_type);
        self.order.push(prefix.to_owned());
        Ok(self)
    }

    /// Relates `field_a` on `a`'s type with `field_b` on `b`'s type.
    ///
    /// Each new field takes the container shape of the *other* endpoint:
    /// `relate(one("person"), "cats", set("cat"), Some("owner"))` gives every
    /// person a set of cats and every cat a single owner. Without `field_b`
    /// the relation is one-directional.
    pub fn relate(
        &mut self,
        a: Endpoint,
        field_a: &str,
        b: Endpoint,
        field_b: Option<&str>,
    ) -> Result<&mut Registry> {
        check_name("field name", field_a)?;
        let kind_a = b.kind();
        let mut staged: BTreeMap<String, EntityType> = BTreeMap::new();
        staged.insert(a.prefix.clone(), self.get(&a.prefix)?.clone());
        if !staged.contains_key(&b.prefix) {
            staged.insert(b.prefix.clone(), self.get(&b.prefix)?.clone());
        }

        let field_b = match field_b {
            None => {
                stage(&mut staged, &a.prefix)?.add_field(field_a, kind_a, false)?;
                return self.commit(staged);
            }
            Some(field_b) => field_b,
        };
        check_name("field name", field_b)?;
        let kind_b = a.kind();
        if kind_a.is_sequence() && kind_b.is_sequence() {
            return Err(Error::new(
                ErrorKind::UnsupportedFieldShape,
                format!(
                    "`{}.{}` and `{}.{}` are both ordered containers",
                    a.prefix, field_a, b.prefix, field_b
                ),
            ));
        }

        let reflexive = a.prefix == b.prefix && field_a == field_b;
        if reflexive {
            if kind_a != kind_b {
                return Err(Error::new(
                    ErrorKind::UnsupportedFieldShape,
                    format!(
                        "self relation `{}.{}` needs the same shape on both sides",
                        a.prefix, field_a
                    ),
                ));
            }
            let cardinality = Cardinality::between(&kind_a, &kind_b);
            let entity_type = stage(&mut staged, &a.prefix)?;
            entity_type.add_field(field_a, kind_a, false)?;
            entity_type.add_relation(
                field_a,
                RelationDescriptor {
                    target: a.prefix.clone(),
                    inverse: field_a.to_owned(),
                    cardinality,
                    back_reference: false,
                    reflexive: true,
                },
            );
            return self.commit(staged);
        }

        let cardinality_a = Cardinality::between(&kind_a, &kind_b);
        let cardinality_b = Cardinality::between(&kind_b, &kind_a);
        let type_a = stage(&mut staged, &a.prefix)?;
        type_a.add_field(field_a, kind_a, false)?;
        type_a.add_relation(
            field_a,
            RelationDescriptor {
                target: b.prefix.clone(),
                inverse: field_b.to_owned(),
                cardinality: cardinality_a,
                back_reference: false,
                reflexive: false,
            },
        );
        let type_b = stage(&mut staged, &b.prefix)?;
        type_b.add_field(field_b, kind_b, false)?;
        type_b.add_relation(
            field_b,
            RelationDescriptor {
                target: a.prefix.clone(),
                inverse: field_a.to_owned(),
                cardinality: cardinality_b,
                back_reference: false,
                reflexive: false,
            },
        );
        self.commit(staged)
    }

    pub fn add_lookup(&mut self, prefix: &str, field: &str, injective: bool) -> Result<&mut Registry> {
        let entity_type = self.get(prefix)?;
        match entity_type.require_field(field)? {
            FieldKind::Scalar(_) | FieldKind::Set(ElementKind::Primitive(_)) => {}
            other => {
                return Err(Error::new(
                    ErrorKind::UnsupportedFieldShape,
                    format!("cannot index `{}.{}`, a {}", prefix, field, other),
                ))
            }
        }
        if let Some(entity_type) = self.types.get_mut(prefix) {
            entity_type.add_lookup(field, injective);
        }
        Ok(self)
    }

    /// Validates every reference and produces the immutable schema.
    ///
    /// Reference fields that are not part of a two-sided relation get a hidden
    /// back-reference set on their target type, so deleting the target can
    /// clear them.
    pub fn freeze(self) -> Result<Schema> {
        let mut types = self.types;
        let mut back_references = Vec::new();
        for prefix in &self.order {
            let entity_type = &types[prefix];
            for field in entity_type.all_fields() {
                let target = match field.kind.target() {
                    Some(target) => target,
                    None => continue,
                };
                if !types.contains_key(target) {
                    return Err(Error::new(
                        ErrorKind::UnregisteredEntity,
                        format!("`{}.{}` points at unregistered type `{}`", prefix, field.name, target),
                    ));
                }
                if entity_type.relation(&field.name).is_none() {
                    back_references.push((prefix.clone(), field.name.clone(), field.kind.clone(), target.to_owned()));
                }
            }
        }

        for (prefix, field, kind, target) in back_references {
            let hidden = format!("~{}.{}", prefix, field);
            let hidden_kind = FieldKind::Set(ElementKind::Reference(prefix.clone()));
            let cardinality = Cardinality::between(&kind, &hidden_kind);
            if let Some(source) = types.get_mut(&prefix) {
                source.add_relation(
                    &field,
                    RelationDescriptor {
                        target: target.clone(),
                        inverse: hidden.clone(),
                        cardinality,
                        back_reference: true,
                        reflexive: false,
                    },
                );
            }
            if let Some(target_type) = types.get_mut(&target) {
                target_type.add_field(&hidden, hidden_kind.clone(), true)?;
                target_type.add_relation(
                    &hidden,
                    RelationDescriptor {
                        target: prefix.clone(),
                        inverse: field.clone(),
                        cardinality: Cardinality::between(&hidden_kind, &kind),
                        back_reference: true,
                        reflexive: false,
                    },
                );
            }
        }

        info!(types = types.len(), "schema frozen");
        Ok(Schema::new(types))
    }

    fn get(&self, prefix: &str) -> Result<&EntityType> {
        self.types
            .get(prefix)
            .ok_or_else(|| Error::unregistered(prefix))
    }

    fn commit(&mut self, staged: BTreeMap<String, EntityType>) -> Result<&mut Registry> {
        for (prefix, entity_type) in staged {
            self.types.insert(prefix, entity_type);
        }
        Ok(self)
    }
}

fn stage<'a>(staged: &'a mut BTreeMap<String, EntityType>, prefix: &str) -> Result<&'a mut EntityType> {
    staged
        .get_mut(prefix)
        .ok_or_else(|| Error::unregistered(prefix))
}

fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('~') || name.contains(':') || name.contains(char::is_whitespace) {
        return Err(Error::new(
            ErrorKind::InvalidField,
            format!("invalid {} `{}`", what, name),
        ));
    }
    Ok(())
}
