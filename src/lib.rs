//! Typed entities with bidirectional relations and lookup indices on top of a
//! schemaless key-value store.
//!
//! ```
//! use antler::{fields, one, set, Config, Database, Registry};
//!
//! let mut registry = Registry::new();
//! registry.define_type("person", fields! { "age" => Integer })?;
//! registry.define_type("cat", fields! { "age" => Integer })?;
//! registry.relate(one("person"), "cats", set("cat"), Some("owner"))?;
//! let db = Database::open(Config::temporary(), registry.freeze()?)?;
//!
//! let joe = db.create("person", "joe")?;
//! let sphinx = db.create("cat", "sphinx")?;
//! joe.add("cats", [&sphinx])?;
//! assert_eq!(sphinx.get("owner")?.unwrap().as_id(), Some("joe"));
//! # Ok::<(), antler::error::Error>(())
//! ```

mod macros;

pub mod config;
pub mod database;
mod engine;
pub mod entity;
pub mod error;
mod lookup;
pub mod relation;
pub mod schema;
pub mod store;
pub mod value;

pub use config::{Config, LookupConflict};
pub use database::Database;
pub use entity::Entity;
pub use error::{Error, ErrorKind, Result};
pub use schema::{list, one, set, sorted, Registry, Schema};
pub use sled;
pub use store::{SledStore, Store};
pub use value::{EntityRef, Value};

#[cfg(test)]
mod test;
