//! Error types and result types for query construction and execution.
//!
//! Every terminal executor resolves to a [`QueryResult<T>`]. Validation failures and driver
//! failures travel through the same error slot; callers tell them apart by the variant.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use std::fmt;
use thiserror::Error;

/// A single schema violation reported by the [`Validator`](crate::validator::Validator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Human readable description of the violation.
    pub message: String,
}

impl Violation {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Represents all possible errors that can occur while building or executing a query.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// The connection configuration is incomplete or names an unknown driver.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The write payload does not conform to the attached schema.
    /// No network operation was attempted.
    #[error("Validation failed: {}", join_violations(.0))]
    Validation(Vec<Violation>),
    /// The call chain is malformed (no collection, unsaved record, empty update, ...).
    #[error("Usage error: {0}")]
    Usage(String),
    /// A primary key value could not be converted to the driver's native id type.
    #[error("Invalid id: {0}")]
    InvalidId(String),
    /// Opening or closing a connection failed.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Serialization/deserialization error when converting between document formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// An error occurred in the underlying driver while running an operation.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl QueryError {
    /// Returns `true` if this error came from the schema validation gate.
    pub fn is_validation(&self) -> bool {
        matches!(self, QueryError::Validation(_))
    }

    /// Returns the schema violations if this is a validation error.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            QueryError::Validation(violations) => Some(violations),
            _ => None,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

impl From<BsonError> for QueryError {
    fn from(err: BsonError) -> Self {
        QueryError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for QueryError {
    fn from(err: SerdeJsonError) -> Self {
        QueryError::Serialization(err.to_string())
    }
}
