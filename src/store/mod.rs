//! The key-value primitives the consistency layer is written against.
//!
//! A [`Store`] knows nothing about entities or relations: it holds hash
//! records (field → string), unordered sets, lists and score-ordered sets,
//! each addressed by a logical string key. The four shapes live in separate
//! keyspaces: a hash and a set under the same logical key never touch each
//! other. [`keys`] decides how entity data is laid out on top of those
//! primitives.

pub mod keys;
mod raw;
mod sled_store;

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;

pub use raw::RawTree;
pub use sled_store::SledStore;

/// Primitive operations consumed by the consistency engine.
///
/// Every collection is created on first insertion and dropped from the store
/// once its last member is removed, so an emptied field leaves no key behind.
pub trait Store {
    /// Reads one field of a hash record.
    fn scalar_get(&self, record: &str, field: &str) -> Result<Option<String>>;
    /// Writes one field of a hash record, replacing any previous value.
    fn scalar_set(&self, record: &str, field: &str, value: &str) -> Result<()>;
    /// Removes one field of a hash record. Returns whether it was present.
    fn scalar_delete(&self, record: &str, field: &str) -> Result<bool>;
    /// Every field of a hash record.
    fn record(&self, record: &str) -> Result<BTreeMap<String, String>>;

    /// Adds members to an unordered set. Returns how many were not yet present.
    fn set_add(&self, key: &str, members: &[String]) -> Result<usize>;
    /// Removes members from an unordered set. Returns how many were present.
    fn set_remove(&self, key: &str, members: &[String]) -> Result<usize>;
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>>;
    fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.set_members(key)?.contains(member))
    }

    /// Appends members at the tail of a list.
    fn list_push(&self, key: &str, members: &[String]) -> Result<()>;
    /// Removes every occurrence of the given members. Returns how many items went away.
    fn list_remove(&self, key: &str, members: &[String]) -> Result<usize>;
    fn list_items(&self, key: &str) -> Result<Vec<String>>;

    /// Adds or re-scores members of a sorted set. Returns how many were new.
    fn sorted_add(&self, key: &str, members: &[(String, f64)]) -> Result<usize>;
    fn sorted_remove(&self, key: &str, members: &[String]) -> Result<usize>;
    /// Members in ascending score order, ties broken by member.
    fn sorted_members(&self, key: &str) -> Result<Vec<(String, f64)>>;

    /// Drops a whole hash record.
    fn record_delete(&self, record: &str) -> Result<()>;
    /// Drops a whole set.
    fn set_delete(&self, key: &str) -> Result<()>;
    /// Drops a whole list.
    fn list_delete(&self, key: &str) -> Result<()>;
    /// Drops a whole sorted set.
    fn sorted_delete(&self, key: &str) -> Result<()>;

    /// Runs `op` so that either all of its writes land or none do.
    ///
    /// `op` may be run more than once if the backend retries on conflict; it
    /// must derive everything from the store it is handed.
    fn atomic(&self, op: &dyn Fn(&dyn Store) -> Result<()>) -> Result<()>;

    fn existence_add(&self, prefix: &str, id: &str) -> Result<bool> {
        Ok(self.set_add(&keys::existence(prefix), &[id.to_owned()])? == 1)
    }

    fn existence_remove(&self, prefix: &str, id: &str) -> Result<bool> {
        Ok(self.set_remove(&keys::existence(prefix), &[id.to_owned()])? == 1)
    }

    fn existence_contains(&self, prefix: &str, id: &str) -> Result<bool> {
        self.set_contains(&keys::existence(prefix), id)
    }

    fn existence_members(&self, prefix: &str) -> Result<BTreeSet<String>> {
        self.set_members(&keys::existence(prefix))
    }
}
