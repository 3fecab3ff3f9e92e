//! Secondary value → id indices.
//!
//! An injective lookup maps each value to exactly one owner id; a
//! non-injective one keeps a set of ids per value.

use tracing::warn;

use crate::config::LookupConflict;
use crate::error::{Error, ErrorKind, Result};
use crate::schema::EntityType;
use crate::store::{keys, Store};

pub(crate) struct LookupIndex<'a> {
    owner: &'a EntityType,
    id: &'a str,
    policy: LookupConflict,
}

impl<'a> LookupIndex<'a> {
    pub fn new(owner: &'a EntityType, id: &'a str, policy: LookupConflict) -> LookupIndex<'a> {
        LookupIndex { owner, id, policy }
    }

    /// Fails if writing `values` into `field` would take an injective entry
    /// from another entity under the `Reject` policy. Performs no writes.
    pub fn check(&self, field: &str, values: &[String], store: &dyn Store) -> Result<()> {
        if self.owner.lookup(field) != Some(true) || self.policy != LookupConflict::Reject {
            return Ok(());
        }
        for value in values {
            if let Some(claimant) = self.claimant(field, value, store)? {
                if claimant != self.id {
                    return Err(Error::new(
                        ErrorKind::LookupConflict,
                        format!(
                            "{}.{} = `{}` already belongs to `{}`",
                            self.owner.prefix(),
                            field,
                            value,
                            claimant
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn attach(&self, field: &str, value: &str, store: &dyn Store) -> Result<()> {
        let key = keys::lookup(self.owner.prefix(), field, value);
        match self.owner.lookup(field) {
            None => Ok(()),
            Some(true) => {
                if let Some(claimant) = self.claimant(field, value, store)? {
                    if claimant != self.id {
                        warn!(
                            prefix = self.owner.prefix(),
                            field,
                            value,
                            from = %claimant,
                            to = self.id,
                            "reassigning lookup entry"
                        );
                    }
                }
                store.scalar_set(&key, keys::LOOKUP_OWNER, self.id)
            }
            Some(false) => store.set_add(&key, &[self.id.to_owned()]).map(drop),
        }
    }

    /// Removes this entity from the entry for `value`. An injective entry
    /// already reassigned to another entity is left alone.
    pub fn detach(&self, field: &str, value: &str, store: &dyn Store) -> Result<()> {
        let key = keys::lookup(self.owner.prefix(), field, value);
        match self.owner.lookup(field) {
            None => Ok(()),
            Some(true) => {
                if self.claimant(field, value, store)?.as_deref() == Some(self.id) {
                    store.record_delete(&key)?;
                }
                Ok(())
            }
            Some(false) => store.set_remove(&key, &[self.id.to_owned()]).map(drop),
        }
    }

    fn claimant(&self, field: &str, value: &str, store: &dyn Store) -> Result<Option<String>> {
        store.scalar_get(&keys::lookup(self.owner.prefix(), field, value), keys::LOOKUP_OWNER)
    }
}

/// Ids indexed under `value` for a lookup on `owner.field`.
pub(crate) fn find(owner: &EntityType, field: &str, value: &str, store: &dyn Store) -> Result<Vec<String>> {
    let key = keys::lookup(owner.prefix(), field, value);
    match owner.lookup(field) {
        None => Err(Error::new(
            ErrorKind::InvalidField,
            format!("`{}.{}` has no lookup", owner.prefix(), field),
        )),
        Some(true) => Ok(store
            .scalar_get(&key, keys::LOOKUP_OWNER)?
            .into_iter()
            .collect()),
        Some(false) => Ok(store.set_members(&key)?.into_iter().collect()),
    }
}
