use std::cell::Cell;
use std::collections::BTreeSet;

use tracing::debug;

use crate::config::Config;
use crate::engine;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::lookup;
use crate::schema::{ElementKind, FieldKind, Schema};
use crate::store::{SledStore, Store};
use crate::value::Value;

/// A frozen schema bound to a store.
pub struct Database<S: Store = SledStore> {
    store: S,
    schema: Schema,
    config: Config,
}

impl Database<SledStore> {
    pub fn open(config: Config, schema: Schema) -> Result<Database<SledStore>> {
        let store = config.open_store()?;
        Ok(Database::with_store(store, schema, config))
    }

    pub fn flush(&self) -> Result<usize> {
        self.store.flush()
    }
}

impl<S: Store> Database<S> {
    pub fn with_store(store: S, schema: Schema, config: Config) -> Database<S> {
        Database { store, schema, config }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers `id` in the existence set of `prefix` and returns its handle.
    /// Fails with `AlreadyExists` if the id is taken.
    pub fn create(&self, prefix: &str, id: &str) -> Result<Entity<'_, S>> {
        let schema = &self.schema;
        self.mutate(|store| engine::create(schema, prefix, id, store))?;
        debug!(prefix, id, "created entity");
        self.instance(prefix, id)
    }

    /// Handle on an existing entity. Fails with `NotFound` if `id` was never
    /// created or has been deleted.
    pub fn instance(&self, prefix: &str, id: &str) -> Result<Entity<'_, S>> {
        let owner = self.schema.get(prefix)?;
        if !self.store.existence_contains(prefix, id)? {
            return Err(Error::not_found(prefix, id));
        }
        Ok(Entity::new(self, owner, id))
    }

    pub fn exists(&self, prefix: &str, id: &str) -> Result<bool> {
        self.schema.get(prefix)?;
        self.store.existence_contains(prefix, id)
    }

    pub fn ids(&self, prefix: &str) -> Result<BTreeSet<String>> {
        self.schema.get(prefix)?;
        self.store.existence_members(prefix)
    }

    /// Ids indexed under `value` by the lookup on `prefix.field`.
    pub fn lookup(&self, prefix: &str, field: &str, value: impl Into<Value>) -> Result<Vec<String>> {
        let owner = self.schema.get(prefix)?;
        let primitive = match owner.require_field(field)? {
            FieldKind::Scalar(p) | FieldKind::Set(ElementKind::Primitive(p)) => *p,
            other => return Err(Error::type_mismatch(prefix, field, other)),
        };
        let encoded = primitive
            .encode(&value.into())
            .ok_or_else(|| Error::type_mismatch(prefix, field, primitive))?;
        lookup::find(owner, field, &encoded, &self.store)
    }

    /// The single owner of `value` under an injective lookup.
    pub fn lookup_one(&self, prefix: &str, field: &str, value: impl Into<Value>) -> Result<Option<Entity<'_, S>>> {
        match self.lookup(prefix, field, value)?.first() {
            Some(id) => Ok(Some(self.instance(prefix, id)?)),
            None => Ok(None),
        }
    }

    /// Runs a mutation, inside a store transaction when `atomic_mutations` is set.
    pub(crate) fn mutate<T, F>(&self, op: F) -> Result<T>
    where
        T: Copy + Default,
        F: Fn(&dyn Store) -> Result<T>,
    {
        let out = Cell::new(T::default());
        let run = |store: &dyn Store| -> Result<()> {
            out.set(op(store)?);
            Ok(())
        };
        if self.config.atomic_mutations {
            self.store.atomic(&run)?;
        } else {
            run(&self.store)?;
        }
        Ok(out.get())
    }
}
