//! Convenient re-exports of commonly used types from docquery.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docquery::prelude::*;
//! ```
//!
//! This provides access to:
//! - The database handle, query builder and streaming queries
//! - Models and records
//! - Schemas and the validator
//! - Driver traits and configuration
//! - Error types and common BSON types

pub use docquery_core::{
    builder::{IntoDocuments, Materialize, QueryBuilder, StreamQuery},
    config::{DatabaseConfig, DatabaseConfigs, DriverKind},
    database::{Database, RawConnection},
    driver::{Connection, DeleteOutcome, Driver, DriverBuilder, InsertOutcome, UpdateOutcome},
    error::{QueryError, QueryResult, Violation},
    model::{Model, Record},
    query::{SortDirection, ID_FIELD},
    schema::{ScalarKind, SchemaNode},
    validator::Validator,
};

pub use bson::{doc, Bson, Document};
