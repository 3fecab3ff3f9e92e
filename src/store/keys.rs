//! Logical key layout.
//!
//! | data | key |
//! |---|---|
//! | existence set of a type | `{prefix}s` |
//! | scalar fields of an entity (hash) | `{prefix}:{id}` |
//! | collection field of an entity | `{prefix}:{id}:{field}` |
//! | lookup entry | `~lookup:{prefix}:{field}:{value}` |
//!
//! Ids and lookup values are opaque and may contain `:`. Prefixes and field
//! names cannot, so each key still names a single owner within its shape.

pub fn existence(prefix: &str) -> String {
    format!("{}s", prefix)
}

pub fn record(prefix: &str, id: &str) -> String {
    format!("{}:{}", prefix, id)
}

pub fn field(prefix: &str, id: &str, field: &str) -> String {
    format!("{}:{}:{}", prefix, id, field)
}

pub fn lookup(prefix: &str, field: &str, value: &str) -> String {
    format!("~lookup:{}:{}:{}", prefix, field, value)
}

/// Hash field under which an injective lookup stores its single owner.
pub const LOOKUP_OWNER: &str = "id";
