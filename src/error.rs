use std::fmt;

use sled::transaction::UnabortableTransactionError;

/// Error kind enum for antler-related errors.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Something went wrong at the `sled` level.
    SledError,
    /// Could not serialize or deserialize a stored value
    SerializationError,
    /// Any kind of file system error while using the database
    IOError,
    /// A field name is not declared on the entity type
    InvalidField,
    /// A supplied value does not match the declared kind of the field
    TypeMismatch,
    /// An entity or type with that identifier already exists
    AlreadyExists,
    /// An entity was not found
    NotFound,
    /// A relation target id is not in its type's existence set
    DanglingReference,
    /// A relation or lookup was declared on a field shape that cannot carry it
    UnsupportedFieldShape,
    /// An entity type was used without being registered first in the schema
    UnregisteredEntity,
    /// A concurrent transaction touched the same keys
    TransactionConflict,
    /// An injective lookup value is already claimed by another entity
    LookupConflict,
    /// An integer update would leave the representable range
    Overflow,
}

/// Error type for `antler`
#[derive(Debug)]
pub struct Error {
    error_kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates a new error from an error kind and a message
    pub fn new(error_kind: ErrorKind, message: impl Into<String>) -> Error {
        Error {
            error_kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error_kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn invalid_field(prefix: &str, field: &str) -> Error {
        Error::new(
            ErrorKind::InvalidField,
            format!("`{}` has no field named `{}`", prefix, field),
        )
    }

    pub(crate) fn type_mismatch(prefix: &str, field: &str, expected: impl fmt::Display) -> Error {
        Error::new(
            ErrorKind::TypeMismatch,
            format!("`{}.{}` expects {}", prefix, field, expected),
        )
    }

    pub(crate) fn not_found(prefix: &str, id: &str) -> Error {
        Error::new(
            ErrorKind::NotFound,
            format!("{} `{}` has not been created yet", prefix, id),
        )
    }

    pub(crate) fn unregistered(prefix: &str) -> Error {
        Error::new(
            ErrorKind::UnregisteredEntity,
            format!("entity type `{}` is not registered", prefix),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Antler Error of type {:?} : {}", self.error_kind, &self.message)
    }
}

impl std::error::Error for Error {}

/// Type definition to simplify the use of Result everywhere in the library
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::new(ErrorKind::IOError, source.to_string())
    }
}

impl From<sled::Error> for Error {
    fn from(source: sled::Error) -> Self {
        Error::new(ErrorKind::SledError, source.to_string())
    }
}

impl From<UnabortableTransactionError> for Error {
    fn from(source: UnabortableTransactionError) -> Self {
        match source {
            UnabortableTransactionError::Conflict => Error::new(
                ErrorKind::TransactionConflict,
                "conflicting concurrent transaction",
            ),
            UnabortableTransactionError::Storage(e) => e.into(),
        }
    }
}

impl From<bincode::Error> for Error {
    fn from(source: bincode::Error) -> Self {
        Error::new(ErrorKind::SerializationError, source.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Error::new(ErrorKind::SerializationError, source.to_string())
    }
}
