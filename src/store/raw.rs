use std::collections::{BTreeMap, BTreeSet};

use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::TransactionalTree;
use sled::IVec;

use super::Store;
use crate::error::Result;

/// Byte-level access to one sled keyspace, either a plain tree or the
/// transactional view of one. Every [`Store`] primitive is written once
/// against this trait.
pub trait RawTree {
    fn get_raw(&self, key: &[u8]) -> Result<Option<IVec>>;
    fn insert_raw(&self, key: &[u8], value: Vec<u8>) -> Result<()>;
    fn remove_raw(&self, key: &[u8]) -> Result<()>;
    fn transact(&self, op: &dyn Fn(&dyn Store) -> Result<()>) -> Result<()>;
}

#[derive(Clone, Copy)]
enum Shape {
    Hash,
    Set,
    List,
    Sorted,
}

impl Shape {
    fn tag(self) -> &'static str {
        match self {
            Shape::Hash => "h/",
            Shape::Set => "s/",
            Shape::List => "l/",
            Shape::Sorted => "z/",
        }
    }
}

fn physical(shape: Shape, key: &str) -> Vec<u8> {
    [shape.tag().as_bytes(), key.as_bytes()].concat()
}

fn load<T: RawTree + ?Sized, V: DeserializeOwned + Default>(
    tree: &T,
    shape: Shape,
    key: &str,
) -> Result<V> {
    match tree.get_raw(&physical(shape, key))? {
        Some(bytes) => Ok(bincode::deserialize::<V>(bytes.as_ref())?),
        None => Ok(V::default()),
    }
}

fn save<T: RawTree + ?Sized, V: Serialize>(
    tree: &T,
    shape: Shape,
    key: &str,
    value: &V,
    empty: bool,
) -> Result<()> {
    let physical_key = physical(shape, key);
    if empty {
        tree.remove_raw(&physical_key)
    } else {
        tree.insert_raw(&physical_key, bincode::serialize(value)?)
    }
}

fn sort_scored(members: &mut [(String, f64)]) {
    members.sort_by(|(a, sa), (b, sb)| sa.total_cmp(sb).then_with(|| a.cmp(b)));
}

impl<T: RawTree> Store for T {
    fn scalar_get(&self, record: &str, field: &str) -> Result<Option<String>> {
        let mut hash: BTreeMap<String, String> = load(self, Shape::Hash, record)?;
        Ok(hash.remove(field))
    }

    fn scalar_set(&self, record: &str, field: &str, value: &str) -> Result<()> {
        let mut hash: BTreeMap<String, String> = load(self, Shape::Hash, record)?;
        hash.insert(field.to_owned(), value.to_owned());
        save(self, Shape::Hash, record, &hash, false)
    }

    fn scalar_delete(&self, record: &str, field: &str) -> Result<bool> {
        let mut hash: BTreeMap<String, String> = load(self, Shape::Hash, record)?;
        if hash.remove(field).is_none() {
            return Ok(false);
        }
        save(self, Shape::Hash, record, &hash, hash.is_empty())?;
        Ok(true)
    }

    fn record(&self, record: &str) -> Result<BTreeMap<String, String>> {
        load(self, Shape::Hash, record)
    }

    fn set_add(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut set: BTreeSet<String> = load(self, Shape::Set, key)?;
        let added = members
            .iter()
            .filter(|m| set.insert((*m).clone()))
            .count();
        if added > 0 {
            save(self, Shape::Set, key, &set, false)?;
        }
        Ok(added)
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut set: BTreeSet<String> = load(self, Shape::Set, key)?;
        let removed = members.iter().filter(|m| set.remove(m.as_str())).count();
        if removed > 0 {
            save(self, Shape::Set, key, &set, set.is_empty())?;
        }
        Ok(removed)
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        load(self, Shape::Set, key)
    }

    fn list_push(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut list: Vec<String> = load(self, Shape::List, key)?;
        list.extend(members.iter().cloned());
        save(self, Shape::List, key, &list, false)
    }

    fn list_remove(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut list: Vec<String> = load(self, Shape::List, key)?;
        let before = list.len();
        list.retain(|item| !members.contains(item));
        let removed = before - list.len();
        if removed > 0 {
            save(self, Shape::List, key, &list, list.is_empty())?;
        }
        Ok(removed)
    }

    fn list_items(&self, key: &str) -> Result<Vec<String>> {
        load(self, Shape::List, key)
    }

    fn sorted_add(&self, key: &str, members: &[(String, f64)]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut sorted: Vec<(String, f64)> = load(self, Shape::Sorted, key)?;
        let mut added = 0;
        for (member, score) in members {
            match sorted.iter_mut().find(|(m, _)| m == member) {
                Some(entry) => entry.1 = *score,
                None => {
                    sorted.push((member.clone(), *score));
                    added += 1;
                }
            }
        }
        sort_scored(&mut sorted);
        save(self, Shape::Sorted, key, &sorted, false)?;
        Ok(added)
    }

    fn sorted_remove(&self, key: &str, members: &[String]) -> Result<usize> {
        let mut sorted: Vec<(String, f64)> = load(self, Shape::Sorted, key)?;
        let before = sorted.len();
        sorted.retain(|(m, _)| !members.contains(m));
        let removed = before - sorted.len();
        if removed > 0 {
            save(self, Shape::Sorted, key, &sorted, sorted.is_empty())?;
        }
        Ok(removed)
    }

    fn sorted_members(&self, key: &str) -> Result<Vec<(String, f64)>> {
        load(self, Shape::Sorted, key)
    }

    fn record_delete(&self, record: &str) -> Result<()> {
        self.remove_raw(&physical(Shape::Hash, record))
    }

    fn set_delete(&self, key: &str) -> Result<()> {
        self.remove_raw(&physical(Shape::Set, key))
    }

    fn list_delete(&self, key: &str) -> Result<()> {
        self.remove_raw(&physical(Shape::List, key))
    }

    fn sorted_delete(&self, key: &str) -> Result<()> {
        self.remove_raw(&physical(Shape::Sorted, key))
    }

    fn atomic(&self, op: &dyn Fn(&dyn Store) -> Result<()>) -> Result<()> {
        self.transact(op)
    }
}

impl RawTree for TransactionalTree {
    fn get_raw(&self, key: &[u8]) -> Result<Option<IVec>> {
        Ok(self.get(key)?)
    }

    fn insert_raw(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.insert(key, value)?;
        Ok(())
    }

    fn remove_raw(&self, key: &[u8]) -> Result<()> {
        self.remove(key)?;
        Ok(())
    }

    // Already inside a transaction: nested atomic sections join it.
    fn transact(&self, op: &dyn Fn(&dyn Store) -> Result<()>) -> Result<()> {
        op(self)
    }
}
