use std::collections::BTreeSet;

use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::database::Database;
use crate::engine::{self, Subject};
use crate::error::Result;
use crate::schema::{EntityType, FieldKind};
use crate::store::{SledStore, Store};
use crate::value::{EntityRef, Value};

/// Handle on one existing entity.
///
/// Every mutation goes through the consistency engine: relation inverses and
/// lookup indices are updated in the same step as the field itself.
pub struct Entity<'db, S: Store = SledStore> {
    db: &'db Database<S>,
    owner: &'db EntityType,
    id: String,
}

impl<'db, S: Store> Entity<'db, S> {
    pub(crate) fn new(db: &'db Database<S>, owner: &'db EntityType, id: &str) -> Entity<'db, S> {
        Entity {
            db,
            owner,
            id: id.to_owned(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn prefix(&self) -> &str {
        self.owner.prefix()
    }

    pub fn entity_type(&self) -> &'db EntityType {
        self.owner
    }

    pub fn reference(&self) -> EntityRef {
        EntityRef::new(self.owner.prefix(), self.id.as_str())
    }

    fn subject(&self) -> Subject<'_> {
        Subject {
            schema: self.db.schema(),
            owner: self.owner,
            id: &self.id,
            policy: self.db.config().lookup_conflict,
        }
    }

    /// Value of a scalar or reference field; `None` when unset.
    pub fn get(&self, field: &str) -> Result<Option<Value>> {
        engine::get(&self.subject(), field, self.db.store())
    }

    /// Sets a scalar or reference field, replacing any previous value.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let subject = self.subject();
        self.db.mutate(|store| engine::set(&subject, field, &value, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, "set field");
        Ok(())
    }

    /// Unsets a scalar or reference field. Returns whether it held a value.
    pub fn clear(&self, field: &str) -> Result<bool> {
        let subject = self.subject();
        let cleared = self.db.mutate(|store| engine::clear(&subject, field, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, cleared, "cleared field");
        Ok(cleared)
    }

    /// Adds `by` to an integer field, treating an unset field as zero.
    pub fn increment(&self, field: &str, by: i64) -> Result<i64> {
        let subject = self.subject();
        let value = self.db.mutate(|store| engine::increment(&subject, field, by, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, value, "incremented field");
        Ok(value)
    }

    /// Adds members to a set field. Returns how many were not yet present.
    pub fn add<V: Into<Value>>(&self, field: &str, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let subject = self.subject();
        let added = self.db.mutate(|store| engine::add(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, added, "added to set");
        Ok(added)
    }

    /// Removes members from a set field. Returns how many were present.
    pub fn remove<V: Into<Value>>(&self, field: &str, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let subject = self.subject();
        let removed = self.db.mutate(|store| engine::remove(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, removed, "removed from set");
        Ok(removed)
    }

    pub fn members(&self, field: &str) -> Result<Vec<Value>> {
        engine::members(&self.subject(), field, self.db.store())
    }

    /// Ids held by a set field of references.
    pub fn related_ids(&self, field: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .members(field)?
            .into_iter()
            .filter_map(|v| v.as_id().map(str::to_owned))
            .collect())
    }

    pub fn push<V: Into<Value>>(&self, field: &str, values: impl IntoIterator<Item = V>) -> Result<()> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let subject = self.subject();
        self.db.mutate(|store| engine::push(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, "pushed to list");
        Ok(())
    }

    /// Removes every occurrence of the given members from a list field.
    pub fn pull<V: Into<Value>>(&self, field: &str, values: impl IntoIterator<Item = V>) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let subject = self.subject();
        let removed = self.db.mutate(|store| engine::pull(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, removed, "pulled from list");
        Ok(removed)
    }

    pub fn items(&self, field: &str) -> Result<Vec<Value>> {
        engine::items(&self.subject(), field, self.db.store())
    }

    pub fn add_scored<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = (V, f64)>,
    ) -> Result<usize> {
        let values: Vec<(Value, f64)> = values.into_iter().map(|(v, s)| (v.into(), s)).collect();
        let subject = self.subject();
        let added = self.db.mutate(|store| engine::add_scored(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, added, "added to sorted set");
        Ok(added)
    }

    pub fn remove_scored<V: Into<Value>>(
        &self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<usize> {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let subject = self.subject();
        let removed = self.db.mutate(|store| engine::remove_scored(&subject, field, &values, store))?;
        debug!(prefix = self.prefix(), id = %self.id, field, removed, "removed from sorted set");
        Ok(removed)
    }

    /// Members of a sorted set field in ascending score order.
    pub fn scored(&self, field: &str) -> Result<Vec<(Value, f64)>> {
        engine::scored(&self.subject(), field, self.db.store())
    }

    /// Deletes the entity, detaching it from every relation and lookup first.
    ///
    /// Deleting an id that another handle already deleted fails with `NotFound`.
    pub fn delete(self) -> Result<()> {
        let subject = self.subject();
        self.db.mutate(|store| engine::delete(&subject, store))?;
        debug!(prefix = self.prefix(), id = %self.id, "deleted entity");
        Ok(())
    }

    /// Snapshot of every visible field as JSON. Unset fields are omitted.
    pub fn export(&self) -> Result<Json> {
        let mut object = Map::new();
        object.insert(String::from("id"), Json::from(self.id.as_str()));
        for field in self.owner.fields() {
            let name = field.name.as_str();
            let value = match &field.kind {
                FieldKind::Scalar(_) | FieldKind::Reference(_) => match self.get(name)? {
                    Some(value) => value.to_json(),
                    None => continue,
                },
                FieldKind::Set(_) => Json::Array(self.members(name)?.iter().map(Value::to_json).collect()),
                FieldKind::List(_) => Json::Array(self.items(name)?.iter().map(Value::to_json).collect()),
                FieldKind::SortedSet(_) => Json::Array(
                    self.scored(name)?
                        .iter()
                        .map(|(v, s)| Json::Array(vec![v.to_json(), Json::from(*s)]))
                        .collect(),
                ),
            };
            object.insert(name.to_owned(), value);
        }
        Ok(Json::Object(object))
    }
}

impl<S: Store> From<&Entity<'_, S>> for Value {
    fn from(entity: &Entity<'_, S>) -> Self {
        Value::Ref(entity.reference())
    }
}
