//! Driver abstraction for the query layer.
//!
//! This module defines the traits that abstract over document-store drivers, allowing the
//! builder to run against any engine that can connect, run collection-scoped
//! find/insert/update/delete operations, and iterate a cursor.
//!
//! # Traits
//!
//! - [`Driver`]: Opens connections, generates primary keys and converts ids to the native type
//! - [`Connection`]: One open connection; runs exactly the operations the builder needs
//! - [`DriverBuilder`]: Factory trait for creating driver instances
//!
//! # Connection Lifecycle
//!
//! A terminal builder call opens one [`Connection`] through [`Driver::connect`], runs a single
//! operation, and then calls [`Connection::close`]. The only exception is
//! [`RawConnection`](crate::database::RawConnection), which hands the open connection to the
//! caller.

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::{any::Any, fmt::Debug};

use crate::{
    error::QueryResult,
    query::{Filter, QuerySpec},
};

/// A stream of documents produced by a find operation, in driver order.
///
/// The end of the stream is the end-of-cursor signal.
pub type DocumentStream = BoxStream<'static, QueryResult<Document>>;

/// Result of an insert operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOutcome {
    /// The primary keys of the inserted documents, in input order.
    pub inserted_ids: Vec<Bson>,
}

/// Result of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matching the filter.
    pub matched_count: u64,
    /// Number of documents actually changed.
    pub modified_count: u64,
}

/// Result of a delete operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Number of documents removed.
    pub deleted_count: u64,
}

/// Abstract interface for document-store drivers.
///
/// # Thread Safety
///
/// Implementations must be thread-safe; one driver is shared by every builder spawned from the
/// same [`Database`](crate::database::Database).
///
/// # Error Handling
///
/// Connection failures should be reported as
/// [`QueryError::Connection`](crate::error::QueryError::Connection), id conversion failures as
/// [`QueryError::InvalidId`](crate::error::QueryError::InvalidId).
#[async_trait]
pub trait Driver: Send + Sync + Debug {
    /// Short name used in log output (e.g. `"mongodb"`).
    fn name(&self) -> &'static str;

    /// Opens a new connection to the storage endpoint.
    async fn connect(&self) -> QueryResult<Box<dyn Connection>>;

    /// Generates a fresh primary key value.
    fn generate_id(&self) -> Bson;

    /// Converts a primary key value to the driver's native id representation.
    ///
    /// Native values are returned unchanged; string forms are parsed.
    fn to_native_id(&self, value: &Bson) -> QueryResult<Bson>;
}

/// An open connection to a storage endpoint.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Runs a find with the filter, sort, skip and limit of `spec`.
    ///
    /// The returned stream yields documents in the order the engine reports them.
    async fn find(&self, spec: &QuerySpec) -> QueryResult<DocumentStream>;

    /// Inserts a single document. The document already carries its primary key.
    async fn insert_one(&self, collection: &str, document: Document) -> QueryResult<InsertOutcome>;

    /// Inserts several documents in one operation. Every document already carries its primary key.
    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> QueryResult<InsertOutcome>;

    /// Sets `fields` on every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> QueryResult<UpdateOutcome>;

    /// Removes every document matching `filter`.
    async fn delete_many(&self, collection: &str, filter: &Filter) -> QueryResult<DeleteOutcome>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> QueryResult<()>;

    /// Returns the connection as `Any`, for downcasting to the concrete driver type.
    fn as_any(&self) -> &dyn Any;
}

#[async_trait]
pub trait DriverBuilder {
    type Driver: Driver;

    async fn build(self) -> QueryResult<Self::Driver>;
}
