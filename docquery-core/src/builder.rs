//! Fluent query construction with deferred execution.
//!
//! A [`QueryBuilder`] is created from [`Database::collection`] and refined by consuming methods
//! ([`filter`](QueryBuilder::filter), [`sort`](QueryBuilder::sort), [`skip`](QueryBuilder::skip),
//! [`limit`](QueryBuilder::limit), ...). Nothing touches the store until one of the terminal
//! calls runs: [`get`](QueryBuilder::get), [`insert`](QueryBuilder::insert),
//! [`update`](QueryBuilder::update), [`remove`](QueryBuilder::remove) or
//! [`stream`](QueryBuilder::stream). Each terminal call opens one connection, runs one driver
//! operation and closes the connection again, whatever the outcome.
//!
//! Builders are plain values. Clone one to branch a query; the branches never share state.
//!
//! ```ignore
//! let base = db.collection("items").filter("status", "active");
//! let newest = base.clone().sort("index", "desc").limit(10).get().await?;
//! let oldest = base.sort("index", "asc").limit(10).get().await?;
//! ```

use bson::{Bson, Document};
use futures::TryStreamExt;
use std::{fmt, marker::PhantomData, sync::Arc};

use crate::{
    database::{release, Database, RawConnection},
    driver::{Connection, DeleteOutcome, UpdateOutcome},
    error::{QueryError, QueryResult},
    model::{Model, Record},
    query::{canonical_field, Condition, Operation, QuerySpec, SortDirection, ID_FIELD},
    schema::SchemaNode,
    validator::Validator,
};

/// Converts a stored document into a builder's output type.
pub trait Materialize: Sized + Send {
    fn materialize(document: Document, db: &Database) -> QueryResult<Self>;
}

impl Materialize for Document {
    fn materialize(document: Document, _db: &Database) -> QueryResult<Self> {
        Ok(document)
    }
}

/// Payloads accepted by [`QueryBuilder::insert`]: one document or a batch.
pub trait IntoDocuments {
    fn into_documents(self) -> Vec<Document>;
}

impl IntoDocuments for Document {
    fn into_documents(self) -> Vec<Document> {
        vec![self]
    }
}

impl IntoDocuments for Vec<Document> {
    fn into_documents(self) -> Vec<Document> {
        self
    }
}

impl<const N: usize> IntoDocuments for [Document; N] {
    fn into_documents(self) -> Vec<Document> {
        Vec::from(self)
    }
}

/// A deferred query against one collection.
///
/// `T` is what terminal reads return: raw [`Document`]s by default, or model
/// [`Record`]s after [`model`](QueryBuilder::model).
pub struct QueryBuilder<T = Document> {
    db: Database,
    spec: QuerySpec,
    schema: Option<Arc<SchemaNode>>,
    error: Option<QueryError>,
    _output: PhantomData<fn() -> T>,
}

impl<T> Clone for QueryBuilder<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            spec: self.spec.clone(),
            schema: self.schema.clone(),
            error: self.error.clone(),
            _output: PhantomData,
        }
    }
}

impl<T> fmt::Debug for QueryBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("spec", &self.spec)
            .field("schema", &self.schema)
            .field("error", &self.error)
            .finish()
    }
}

impl<T> QueryBuilder<T> {
    pub(crate) fn new(db: Database, collection: String) -> Self {
        Self {
            db,
            spec: QuerySpec::new(collection),
            schema: None,
            error: None,
            _output: PhantomData,
        }
    }

    /// The accumulated query state.
    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    /// The schema writes are validated against, if any.
    pub fn schema_node(&self) -> Option<&SchemaNode> {
        self.schema.as_deref()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Restricts the query to documents whose `field` equals `value`.
    ///
    /// An array value matches documents whose field equals any of its elements. The field
    /// `id` is an alias for `_id`; primary key values are converted to the driver's native
    /// id type, and a value that cannot be converted fails the terminal call with
    /// [`QueryError::InvalidId`]. Setting the same field again replaces its condition.
    pub fn filter(mut self, field: impl AsRef<str>, value: impl Into<Bson>) -> Self {
        self.apply_filter(field.as_ref(), value.into());
        self
    }

    /// Replaces the whole filter with one equality (or any-of) condition per document entry.
    pub fn filter_by(mut self, document: Document) -> Self {
        self.spec.filter.clear();

        for (field, value) in document {
            self.apply_filter(&field, value);
        }

        self
    }

    /// Adds a sort key. `"asc"` (any case) and `1` sort ascending, anything else descending.
    ///
    /// Keys apply in the order they were added; sorting on a key twice updates its direction.
    pub fn sort(mut self, field: impl Into<String>, order: impl Into<SortDirection>) -> Self {
        self.spec.add_sort(field, order.into());
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.spec.skip = skip;
        self
    }

    /// Caps the number of returned documents. `0` means unbounded.
    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = limit;
        self
    }

    /// Sets (or with `None`, clears) the schema that gates insert and update payloads.
    pub fn schema(mut self, schema: impl Into<Option<SchemaNode>>) -> Self {
        self.schema = schema.into().map(Arc::new);
        self
    }

    /// Makes terminal reads wrap each document in a [`Record`] of `M`.
    pub fn model<M: Model>(self) -> QueryBuilder<Record<M>> {
        self.cast()
    }

    /// Makes terminal reads return plain documents again.
    pub fn documents(self) -> QueryBuilder<Document> {
        self.cast()
    }

    /// Opens a connection without running any operation. See [`Database::raw`].
    pub async fn raw(self) -> QueryResult<RawConnection> {
        self.db.raw().await
    }

    fn cast<U>(self) -> QueryBuilder<U> {
        QueryBuilder {
            db: self.db,
            spec: self.spec,
            schema: self.schema,
            error: self.error,
            _output: PhantomData,
        }
    }

    fn apply_filter(&mut self, field: &str, value: Bson) {
        let field = canonical_field(field);

        match self.condition_for(field, value) {
            Ok(condition) => self.spec.filter.set(field, condition),
            Err(err) => {
                if self.error.is_none() {
                    self.error = Some(err);
                }
            }
        }
    }

    fn condition_for(&self, field: &str, value: Bson) -> QueryResult<Condition> {
        let condition = Condition::from_value(value);

        if field != ID_FIELD {
            return Ok(condition);
        }

        let driver = self.db.driver();

        Ok(match condition {
            Condition::Eq(value) => Condition::Eq(driver.to_native_id(&value)?),
            Condition::AnyOf(values) => Condition::AnyOf(
                values
                    .iter()
                    .map(|value| driver.to_native_id(value))
                    .collect::<QueryResult<_>>()?
            ),
        })
    }

    /// Fails with any error recorded while building, or when the chain has no collection.
    fn check(&self) -> QueryResult<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        if self.spec.collection.is_empty() {
            return Err(QueryError::Usage("No collection specified".into()));
        }

        Ok(())
    }

    fn validate(&self, documents: &[Document], partial: bool) -> QueryResult<()> {
        let Some(schema) = self.schema.as_deref() else {
            return Ok(());
        };

        let validator = if partial {
            Validator::new(schema).partial()
        } else {
            Validator::new(schema)
        };
        let violations = validator.validate_documents(documents);

        if violations.is_empty() {
            return Ok(());
        }

        log::warn!(
            "rejected write to {}: {} validation error(s)",
            self.spec.collection,
            violations.len(),
        );

        Err(QueryError::Validation(violations))
    }
}

impl<T: Materialize> QueryBuilder<T> {
    /// Runs the query and returns every matching document, in driver order.
    pub async fn get(self) -> QueryResult<Vec<T>> {
        self.check()?;

        trace_read(&self.spec);

        let connection = self.db.open(Operation::Find, &self.spec.collection).await?;
        let documents = collect(connection.as_ref(), &self.spec).await;
        let documents = release(connection, documents).await?;

        self.materialize(documents)
    }

    /// Runs the query and returns the first matching document.
    pub async fn first(self) -> QueryResult<Option<T>> {
        Ok(self.limit(1).get().await?.into_iter().next())
    }

    /// Inserts one document or a batch and returns what was stored.
    ///
    /// With a schema set, every document is validated first; any violation fails the call
    /// with [`QueryError::Validation`] before a connection is opened. Documents without an
    /// `_id` receive one from the driver. An empty batch succeeds without touching the store.
    pub async fn insert(self, items: impl IntoDocuments) -> QueryResult<Vec<T>> {
        self.check()?;

        let documents = items.into_documents();
        self.validate(&documents, false)?;

        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let documents: Vec<Document> = documents
            .into_iter()
            .map(|document| self.with_id(document))
            .collect();

        let operation = if documents.len() == 1 { Operation::InsertOne } else { Operation::InsertMany };
        let collection = self.spec.collection.as_str();
        let connection = self.db.open(operation, collection).await?;

        let outcome = match operation {
            Operation::InsertOne => connection.insert_one(collection, documents[0].clone()).await,
            _ => connection.insert_many(collection, documents.clone()).await,
        };
        release(connection, outcome).await?;

        self.materialize(documents)
    }

    /// Sets `fields` on every matching document.
    ///
    /// With a schema set, the fields are validated in partial mode: keys absent from the
    /// payload are not required. The primary key cannot be updated.
    pub async fn update(self, fields: Document) -> QueryResult<UpdateOutcome> {
        self.check()?;

        if fields.is_empty() {
            return Err(QueryError::Usage("Nothing to update".into()));
        }

        if fields.contains_key(ID_FIELD) {
            return Err(QueryError::Usage(format!("{ID_FIELD} cannot be updated")));
        }

        self.validate(std::slice::from_ref(&fields), true)?;

        let collection = self.spec.collection.as_str();
        let connection = self.db.open(Operation::UpdateMany, collection).await?;
        let outcome = connection.update_many(collection, &self.spec.filter, fields).await;

        release(connection, outcome).await
    }

    /// Deletes every matching document.
    pub async fn remove(self) -> QueryResult<DeleteOutcome> {
        self.check()?;

        let collection = self.spec.collection.as_str();
        let connection = self.db.open(Operation::RemoveMany, collection).await?;
        let outcome = connection.delete_many(collection, &self.spec.filter).await;

        release(connection, outcome).await
    }

    /// Prepares a streaming read that hands each document to `each` as it arrives.
    ///
    /// Nothing runs until [`StreamQuery::done`] is awaited.
    pub fn stream<F, R>(self, each: F) -> StreamQuery<T, F>
    where
        F: FnMut(T) -> R + Send,
        R: Send,
    {
        StreamQuery { builder: self, each }
    }

    fn with_id(&self, document: Document) -> Document {
        if document.contains_key(ID_FIELD) {
            return document;
        }

        let mut stored = Document::new();
        stored.insert(ID_FIELD, self.db.driver().generate_id());

        for (key, value) in document {
            stored.insert(key, value);
        }

        stored
    }

    fn materialize(&self, documents: Vec<Document>) -> QueryResult<Vec<T>> {
        documents
            .into_iter()
            .map(|document| T::materialize(document, &self.db))
            .collect()
    }
}

fn trace_read(spec: &QuerySpec) {
    log::trace!(
        "{}: filter {:?}, sort {:?}, skip {}, limit {}",
        spec.collection,
        spec.filter,
        spec.sort,
        spec.skip,
        spec.limit,
    );
}

async fn collect(connection: &dyn Connection, spec: &QuerySpec) -> QueryResult<Vec<Document>> {
    connection
        .find(spec)
        .await?
        .try_collect()
        .await
}

/// A streaming read prepared by [`QueryBuilder::stream`].
pub struct StreamQuery<T, F> {
    builder: QueryBuilder<T>,
    each: F,
}

impl<T, F, R> StreamQuery<T, F>
where
    T: Materialize,
    F: FnMut(T) -> R + Send,
    R: Send,
{
    /// Runs the query, calling the per-item function once per document in driver order.
    ///
    /// Resolves after the last document with the per-item results. The connection is closed
    /// before this returns, including when the stream fails part way.
    pub async fn done(self) -> QueryResult<Vec<R>> {
        let StreamQuery { builder, mut each } = self;
        builder.check()?;

        trace_read(&builder.spec);

        let connection = builder.db.open(Operation::Stream, &builder.spec.collection).await?;
        let results = async {
            let mut documents = connection.find(&builder.spec).await?;
            let mut results = Vec::new();

            while let Some(document) = documents.try_next().await? {
                results.push(each(T::materialize(document, &builder.db)?));
            }

            Ok::<_, QueryError>(results)
        }
        .await;

        release(connection, results).await
    }
}

impl<T, F> fmt::Debug for StreamQuery<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamQuery")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}
