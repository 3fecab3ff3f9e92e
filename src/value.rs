use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};
use crate::schema::Primitive;

/// A typed pointer to an entity: its type prefix and its id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub prefix: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(prefix: impl Into<String>, id: impl Into<String>) -> EntityRef {
        EntityRef {
            prefix: prefix.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.id)
    }
}

/// A field value as handed to and returned from entity operations.
///
/// Reference fields accept either a bare id (`Value::String`) or a typed
/// [`EntityRef`]; they are always read back as `Value::Ref`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    String(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Ref(EntityRef),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The id of a referenced entity.
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Value::Ref(r) => Some(&r.id),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::from(s.as_str()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Boolean(b) => serde_json::Value::from(*b),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Ref(r) => serde_json::Value::from(r.id.as_str()),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::String(v.clone())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v.into())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<EntityRef> for Value {
    fn from(v: EntityRef) -> Self {
        Value::Ref(v)
    }
}

impl Primitive {
    /// Stored string form of `value`, or `None` if it is not of this kind.
    pub(crate) fn encode(self, value: &Value) -> Option<String> {
        match (self, value) {
            (Primitive::String, Value::String(s)) => Some(s.clone()),
            (Primitive::Integer, Value::Integer(i)) => Some(i.to_string()),
            (Primitive::Boolean, Value::Boolean(b)) => Some(b.to_string()),
            (Primitive::Float, Value::Float(f)) => Some(f.to_string()),
            _ => None,
        }
    }

    pub(crate) fn decode(self, raw: &str) -> Result<Value> {
        let corrupt = || {
            Error::new(
                ErrorKind::SerializationError,
                format!("stored value `{}` is not a valid {}", raw, self),
            )
        };
        Ok(match self {
            Primitive::String => Value::String(raw.to_owned()),
            Primitive::Integer => Value::Integer(raw.parse().map_err(|_| corrupt())?),
            Primitive::Boolean => Value::Boolean(raw.parse().map_err(|_| corrupt())?),
            Primitive::Float => Value::Float(raw.parse().map_err(|_| corrupt())?),
        })
    }
}
