use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Tree};
use tracing::info;

use super::{RawTree, Store};
use crate::config::Config;
use crate::error::{ErrorKind, Result};

/// A [`Store`] backed by one tree of a sled database.
#[derive(Clone)]
pub struct SledStore {
    db: Db,
    tree: Tree,
}

impl SledStore {
    pub fn open(config: &Config) -> Result<SledStore> {
        let db = config.sled_config().open()?;
        info!(
            path = ?config.path,
            temporary = config.temporary,
            tree = %config.tree_name,
            "opened sled store"
        );
        SledStore::from_db(db, &config.tree_name)
    }

    pub fn from_db(db: Db, tree_name: &str) -> Result<SledStore> {
        let tree = db.open_tree(tree_name)?;
        Ok(SledStore { db, tree })
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Flushes dirty pages to disk, returning the number of bytes written.
    pub fn flush(&self) -> Result<usize> {
        Ok(self.tree.flush()?)
    }

    /// Number of physical keys currently held.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Every physical key, decoded lossily. Meant for inspection and tests.
    pub fn physical_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in self.tree.iter().keys() {
            keys.push(String::from_utf8_lossy(entry?.as_ref()).into_owned());
        }
        Ok(keys)
    }
}

impl RawTree for SledStore {
    fn get_raw(&self, key: &[u8]) -> Result<Option<IVec>> {
        Ok(self.tree.get(key)?)
    }

    fn insert_raw(&self, key: &[u8], value: Vec<u8>) -> Result<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn remove_raw(&self, key: &[u8]) -> Result<()> {
        self.tree.remove(key)?;
        Ok(())
    }

    fn transact(&self, op: &dyn Fn(&dyn Store) -> Result<()>) -> Result<()> {
        self.tree
            .transaction(|tx| {
                op(tx).map_err(|e| match e.kind() {
                    ErrorKind::TransactionConflict => ConflictableTransactionError::Conflict,
                    _ => ConflictableTransactionError::Abort(e),
                })
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => e.into(),
            })
    }
}
