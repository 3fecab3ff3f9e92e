//! The consistency engine: every mutating entity operation, expressed as a
//! sequence of store calls that keeps relations and lookups in agreement.
//!
//! Each operation follows the same path: validate and encode the input, read
//! the current value, unlink the old value on the inverse side, link the new
//! one, update lookups, then commit the local write. Run through
//! [`Store::atomic`] the whole path is all-or-nothing; run directly it is
//! best-effort and a failure can leave earlier steps applied.

use std::collections::BTreeSet;

use crate::config::LookupConflict;
use crate::error::{Error, ErrorKind, Result};
use crate::lookup::LookupIndex;
use crate::relation::{apply_all, Resolver};
use crate::schema::{ElementKind, EntityType, FieldKind, Primitive, Schema};
use crate::store::{keys, Store};
use crate::value::{EntityRef, Value};

/// The entity an operation acts on.
#[derive(Clone, Copy)]
pub(crate) struct Subject<'a> {
    pub schema: &'a Schema,
    pub owner: &'a EntityType,
    pub id: &'a str,
    pub policy: LookupConflict,
}

impl<'a> Subject<'a> {
    fn record(&self) -> String {
        keys::record(self.owner.prefix(), self.id)
    }

    fn key(&self, field: &str) -> String {
        keys::field(self.owner.prefix(), self.id, field)
    }

    fn resolver(&self) -> Resolver<'a> {
        Resolver::new(self.schema, self.owner, self.id)
    }

    fn lookups(&self) -> LookupIndex<'a> {
        LookupIndex::new(self.owner, self.id, self.policy)
    }

    pub fn ensure_exists(&self, store: &dyn Store) -> Result<()> {
        if store.existence_contains(self.owner.prefix(), self.id)? {
            Ok(())
        } else {
            Err(Error::not_found(self.owner.prefix(), self.id))
        }
    }

    fn unlink(&self, field: &str, old: &str, store: &dyn Store) -> Result<()> {
        apply_all(&self.resolver().unlink(field, old, store)?, store)
    }

    fn link(&self, field: &str, new: &str, store: &dyn Store) -> Result<()> {
        apply_all(&self.resolver().link(field, new, store)?, store)
    }

    /// Turns `value` into its stored form for an element of kind `kind`.
    ///
    /// References must name an existing entity of the declared type unless
    /// `must_exist` is false (removal of a member that may already be gone).
    fn encode(
        &self,
        field: &str,
        kind: &ElementKind,
        value: &Value,
        must_exist: bool,
        store: &dyn Store,
    ) -> Result<String> {
        match kind {
            ElementKind::Primitive(p) => p
                .encode(value)
                .ok_or_else(|| Error::type_mismatch(self.owner.prefix(), field, p)),
            ElementKind::Reference(target) => {
                let id = match value {
                    Value::String(id) => id,
                    Value::Ref(r) if &r.prefix == target => &r.id,
                    _ => {
                        return Err(Error::type_mismatch(
                            self.owner.prefix(),
                            field,
                            format!("an id of {}", target),
                        ))
                    }
                };
                if must_exist && !store.existence_contains(target, id)? {
                    return Err(Error::new(
                        ErrorKind::DanglingReference,
                        format!("{}.{} cannot point at missing {} `{}`", self.owner.prefix(), field, target, id),
                    ));
                }
                Ok(id.clone())
            }
        }
    }

    fn decode(&self, kind: &ElementKind, raw: &str) -> Result<Value> {
        match kind {
            ElementKind::Primitive(p) => p.decode(raw),
            ElementKind::Reference(target) => Ok(Value::Ref(EntityRef::new(target.as_str(), raw))),
        }
    }
}

/// Element kind of a scalar or reference field.
fn single_element(subject: &Subject, field: &str) -> Result<ElementKind> {
    match subject.owner.require_field(field)? {
        FieldKind::Scalar(p) => Ok(ElementKind::Primitive(*p)),
        FieldKind::Reference(target) => Ok(ElementKind::Reference(target.clone())),
        other => Err(Error::type_mismatch(
            subject.owner.prefix(),
            field,
            format!("collection operations, it is a {}", other),
        )),
    }
}

fn collection_element<'k>(
    subject: &Subject<'k>,
    field: &str,
    expected: fn(&FieldKind) -> Option<&ElementKind>,
) -> Result<&'k ElementKind> {
    let kind = subject.owner.require_field(field)?;
    expected(kind).ok_or_else(|| {
        Error::type_mismatch(subject.owner.prefix(), field, format!("another operation, it is a {}", kind))
    })
}

fn as_set(kind: &FieldKind) -> Option<&ElementKind> {
    match kind {
        FieldKind::Set(e) => Some(e),
        _ => None,
    }
}

fn as_list(kind: &FieldKind) -> Option<&ElementKind> {
    match kind {
        FieldKind::List(e) => Some(e),
        _ => None,
    }
}

fn as_sorted(kind: &FieldKind) -> Option<&ElementKind> {
    match kind {
        FieldKind::SortedSet(e) => Some(e),
        _ => None,
    }
}

/// Order-preserving de-duplication.
fn distinct(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

pub(crate) fn create(schema: &Schema, prefix: &str, id: &str, store: &dyn Store) -> Result<()> {
    schema.get(prefix)?;
    if !store.existence_add(prefix, id)? {
        return Err(Error::new(
            ErrorKind::AlreadyExists,
            format!("{} `{}` already exists", prefix, id),
        ));
    }
    Ok(())
}

pub(crate) fn get(subject: &Subject, field: &str, store: &dyn Store) -> Result<Option<Value>> {
    let element = single_element(subject, field)?;
    subject.ensure_exists(store)?;
    match store.scalar_get(&subject.record(), field)? {
        Some(raw) => Ok(Some(subject.decode(&element, &raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn set(subject: &Subject, field: &str, value: &Value, store: &dyn Store) -> Result<()> {
    let element = single_element(subject, field)?;
    subject.ensure_exists(store)?;
    let new = subject.encode(field, &element, value, true, store)?;
    let record = subject.record();
    let old = store.scalar_get(&record, field)?;
    if old.as_deref() == Some(new.as_str()) {
        return Ok(());
    }
    let lookups = subject.lookups();
    lookups.check(field, std::slice::from_ref(&new), store)?;

    if let Some(old) = &old {
        subject.unlink(field, old, store)?;
        lookups.detach(field, old, store)?;
    }
    subject.link(field, &new, store)?;
    lookups.attach(field, &new, store)?;
    store.scalar_set(&record, field, &new)
}

/// Removes a scalar or reference value together with its inverse link and
/// lookup entry. Returns whether there was a value.
pub(crate) fn clear(subject: &Subject, field: &str, store: &dyn Store) -> Result<bool> {
    single_element(subject, field)?;
    subject.ensure_exists(store)?;
    let record = subject.record();
    match store.scalar_get(&record, field)? {
        None => Ok(false),
        Some(old) => {
            subject.unlink(field, &old, store)?;
            subject.lookups().detach(field, &old, store)?;
            store.scalar_delete(&record, field)
        }
    }
}

pub(crate) fn increment(subject: &Subject, field: &str, by: i64, store: &dyn Store) -> Result<i64> {
    if subject.owner.require_field(field)? != &FieldKind::Scalar(Primitive::Integer) {
        return Err(Error::type_mismatch(subject.owner.prefix(), field, "an integer field to increment"));
    }
    let current = match get(subject, field, store)? {
        Some(Value::Integer(i)) => i,
        _ => 0,
    };
    let next = current.checked_add(by).ok_or_else(|| {
        Error::new(
            ErrorKind::Overflow,
            format!("{}.{} would overflow adding {} to {}", subject.owner.prefix(), field, by, current),
        )
    })?;
    set(subject, field, &Value::Integer(next), store)?;
    Ok(next)
}

/// Adds members to a set field. Members already present are skipped, so
/// their inverse links are not applied twice. Returns how many were added.
pub(crate) fn add(subject: &Subject, field: &str, values: &[Value], store: &dyn Store) -> Result<usize> {
    let element = collection_element(subject, field, as_set)?;
    subject.ensure_exists(store)?;
    let key = subject.key(field);
    let current = store.set_members(&key)?;
    let mut fresh = Vec::with_capacity(values.len());
    for value in values {
        let encoded = subject.encode(field, element, value, true, store)?;
        if !current.contains(&encoded) {
            fresh.push(encoded);
        }
    }
    let fresh = distinct(fresh);
    let lookups = subject.lookups();
    lookups.check(field, &fresh, store)?;
    for member in &fresh {
        subject.link(field, member, store)?;
        lookups.attach(field, member, store)?;
    }
    // a self-link may already have inserted the member, so count the input
    store.set_add(&key, &fresh)?;
    Ok(fresh.len())
}

/// Removes members from a set field, unlinking each one that was present.
pub(crate) fn remove(subject: &Subject, field: &str, values: &[Value], store: &dyn Store) -> Result<usize> {
    let element = collection_element(subject, field, as_set)?;
    subject.ensure_exists(store)?;
    let key = subject.key(field);
    let current = store.set_members(&key)?;
    let mut present = Vec::with_capacity(values.len());
    for value in values {
        let encoded = subject.encode(field, element, value, false, store)?;
        if current.contains(&encoded) {
            present.push(encoded);
        }
    }
    let present = distinct(present);
    let lookups = subject.lookups();
    for member in &present {
        subject.unlink(field, member, store)?;
        lookups.detach(field, member, store)?;
    }
    store.set_remove(&key, &present)?;
    Ok(present.len())
}

pub(crate) fn members(subject: &Subject, field: &str, store: &dyn Store) -> Result<Vec<Value>> {
    let element = collection_element(subject, field, as_set)?;
    subject.ensure_exists(store)?;
    store
        .set_members(&subject.key(field))?
        .iter()
        .map(|raw| subject.decode(element, raw))
        .collect()
}

/// Appends to a list field. Lists keep duplicates; an inverse link is only
/// created the first time a member appears.
pub(crate) fn push(subject: &Subject, field: &str, values: &[Value], store: &dyn Store) -> Result<()> {
    let element = collection_element(subject, field, as_list)?;
    subject.ensure_exists(store)?;
    let encoded = values
        .iter()
        .map(|v| subject.encode(field, element, v, true, store))
        .collect::<Result<Vec<_>>>()?;
    let key = subject.key(field);
    let current = store.list_items(&key)?;
    for member in distinct(encoded.clone()) {
        if !current.contains(&member) {
            subject.link(field, &member, store)?;
        }
    }
    store.list_push(&key, &encoded)
}

/// Removes every occurrence of the given members from a list field.
pub(crate) fn pull(subject: &Subject, field: &str, values: &[Value], store: &dyn Store) -> Result<usize> {
    let element = collection_element(subject, field, as_list)?;
    subject.ensure_exists(store)?;
    let key = subject.key(field);
    let current = store.list_items(&key)?;
    let mut present = Vec::with_capacity(values.len());
    for value in values {
        let encoded = subject.encode(field, element, value, false, store)?;
        if current.contains(&encoded) {
            present.push(encoded);
        }
    }
    let present = distinct(present);
    for member in &present {
        subject.unlink(field, member, store)?;
    }
    store.list_remove(&key, &present)
}

pub(crate) fn items(subject: &Subject, field: &str, store: &dyn Store) -> Result<Vec<Value>> {
    let element = collection_element(subject, field, as_list)?;
    subject.ensure_exists(store)?;
    store
        .list_items(&subject.key(field))?
        .iter()
        .map(|raw| subject.decode(element, raw))
        .collect()
}

/// Adds or re-scores members of a sorted set field. Returns how many were new.
pub(crate) fn add_scored(
    subject: &Subject,
    field: &str,
    values: &[(Value, f64)],
    store: &dyn Store,
) -> Result<usize> {
    let element = collection_element(subject, field, as_sorted)?;
    subject.ensure_exists(store)?;
    let key = subject.key(field);
    let current: BTreeSet<String> = store.sorted_members(&key)?.into_iter().map(|(m, _)| m).collect();
    let mut scored = Vec::with_capacity(values.len());
    for (value, score) in values {
        scored.push((subject.encode(field, element, value, true, store)?, *score));
    }
    let fresh = distinct(
        scored
            .iter()
            .filter(|(m, _)| !current.contains(m))
            .map(|(m, _)| m.clone())
            .collect(),
    );
    for member in &fresh {
        subject.link(field, member, store)?;
    }
    store.sorted_add(&key, &scored)?;
    Ok(fresh.len())
}

pub(crate) fn remove_scored(subject: &Subject, field: &str, values: &[Value], store: &dyn Store) -> Result<usize> {
    let element = collection_element(subject, field, as_sorted)?;
    subject.ensure_exists(store)?;
    let key = subject.key(field);
    let current: BTreeSet<String> = store.sorted_members(&key)?.into_iter().map(|(m, _)| m).collect();
    let mut present = Vec::with_capacity(values.len());
    for value in values {
        let encoded = subject.encode(field, element, value, false, store)?;
        if current.contains(&encoded) {
            present.push(encoded);
        }
    }
    let present = distinct(present);
    for member in &present {
        subject.unlink(field, member, store)?;
    }
    store.sorted_remove(&key, &present)?;
    Ok(present.len())
}

pub(crate) fn scored(subject: &Subject, field: &str, store: &dyn Store) -> Result<Vec<(Value, f64)>> {
    let element = collection_element(subject, field, as_sorted)?;
    subject.ensure_exists(store)?;
    store
        .sorted_members(&subject.key(field))?
        .iter()
        .map(|(raw, score)| Ok((subject.decode(element, raw)?, *score)))
        .collect()
}

/// Unwinds every relation and lookup of the entity, then removes its keys and
/// its membership in the existence set.
pub(crate) fn delete(subject: &Subject, store: &dyn Store) -> Result<()> {
    subject.ensure_exists(store)?;
    let record = subject.record();
    let lookups = subject.lookups();
    for field in subject.owner.all_fields() {
        let name = field.name.as_str();
        let related = subject.owner.relation(name).is_some();
        match &field.kind {
            FieldKind::Scalar(_) | FieldKind::Reference(_) => {
                if let Some(old) = store.scalar_get(&record, name)? {
                    if related {
                        subject.unlink(name, &old, store)?;
                    }
                    lookups.detach(name, &old, store)?;
                    store.scalar_delete(&record, name)?;
                }
            }
            FieldKind::Set(_) => {
                let key = subject.key(name);
                for member in store.set_members(&key)? {
                    if related {
                        subject.unlink(name, &member, store)?;
                    }
                    lookups.detach(name, &member, store)?;
                }
                store.set_delete(&key)?;
            }
            FieldKind::List(_) => {
                let key = subject.key(name);
                if related {
                    for member in distinct(store.list_items(&key)?) {
                        subject.unlink(name, &member, store)?;
                    }
                }
                store.list_delete(&key)?;
            }
            FieldKind::SortedSet(_) => {
                let key = subject.key(name);
                if related {
                    for (member, _) in store.sorted_members(&key)? {
                        subject.unlink(name, &member, store)?;
                    }
                }
                store.sorted_delete(&key)?;
            }
        }
    }
    store.record_delete(&record)?;
    store.existence_remove(subject.owner.prefix(), subject.id)?;
    Ok(())
}
