use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::SledStore;

/// What to do when an injective lookup value is already owned by another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LookupConflict {
    /// The new writer takes the entry; the old claimant keeps its field value
    /// but can no longer be found through the lookup.
    #[default]
    Reassign,
    /// The write fails with `ErrorKind::LookupConflict` and nothing changes.
    Reject,
}

/// Database configuration, usually read from a JSON file.
///
/// ```json
/// { "path": "/var/lib/app/db", "atomic_mutations": true, "lookup_conflict": "reject" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub path: Option<PathBuf>,
    /// Delete the database files when the last handle is dropped.
    pub temporary: bool,
    /// sled tree holding every key written by this crate.
    pub tree_name: String,
    pub cache_capacity: u64,
    pub flush_every_ms: Option<u64>,
    /// Wrap every mutation, cascades included, in a store transaction.
    pub atomic_mutations: bool,
    pub lookup_conflict: LookupConflict,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path: None,
            temporary: false,
            tree_name: String::from("__antler"),
            cache_capacity: 1024 * 1024 * 1024,
            flush_every_ms: Some(500),
            atomic_mutations: true,
            lookup_conflict: LookupConflict::Reassign,
        }
    }
}

impl Config {
    pub fn at(path: impl AsRef<Path>) -> Config {
        Config {
            path: Some(path.as_ref().to_path_buf()),
            ..Config::default()
        }
    }

    /// An in-memory database that leaves nothing on disk.
    pub fn temporary() -> Config {
        Config {
            temporary: true,
            ..Config::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Config> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Config> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn open_store(&self) -> Result<SledStore> {
        SledStore::open(self)
    }

    pub(crate) fn sled_config(&self) -> sled::Config {
        let mut config = sled::Config::new()
            .temporary(self.temporary)
            .cache_capacity(self.cache_capacity)
            .flush_every_ms(self.flush_every_ms);
        if let Some(path) = &self.path {
            config = config.path(path);
        }
        config
    }
}
