//! Active-record style access to a collection.
//!
//! A type implementing [`Model`] names a collection and, optionally, the schema that gates its
//! writes. The trait's associated functions start query chains or run whole-collection
//! operations; a [`Record`] wraps one document and knows how to save, update and delete itself.
//!
//! # Example
//!
//! ```ignore
//! use docquery::prelude::*;
//!
//! struct User;
//!
//! impl Model for User {
//!     fn schema() -> Option<SchemaNode> {
//!         Some(SchemaNode::from_example(&bson::bson!({ "name": "", "age": 0 })))
//!     }
//! }
//!
//! let mut user = User::new(&db, doc! { "name": "Ada", "age": 36 });
//! user.save().await?;
//!
//! let adults = User::query(&db).filter("age", 36).get().await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{any::type_name, fmt, marker::PhantomData};

use crate::{
    builder::{IntoDocuments, Materialize, QueryBuilder},
    database::Database,
    driver::{DeleteOutcome, UpdateOutcome},
    error::{QueryError, QueryResult},
    query::{canonical_field, SortDirection, ID_FIELD},
    schema::SchemaNode,
};

/// Derives a collection name from a type name: the last path segment with its first letter
/// lowercased and an `s` appended (`app::models::User` becomes `users`).
pub fn default_collection_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    let name = base.rsplit("::").next().unwrap_or(base);
    let mut chars = name.chars();

    let mut collection = match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    collection.push('s');

    collection
}

/// A collection-backed model.
///
/// Only the type matters; implementors are usually unit structs.
#[async_trait]
pub trait Model: Sized + Send + Sync + 'static {
    /// The collection this model reads and writes.
    fn collection() -> String {
        default_collection_name(type_name::<Self>())
    }

    /// The schema writes are validated against. `None` accepts anything.
    fn schema() -> Option<SchemaNode> {
        None
    }

    /// Starts a query chain over this model's collection.
    fn query(db: &Database) -> QueryBuilder<Record<Self>> {
        db.collection(Self::collection())
            .schema(Self::schema())
            .model::<Self>()
    }

    /// Wraps `data` in an unsaved record.
    fn new(db: &Database, data: Document) -> Record<Self> {
        Record::new(db, data)
    }

    fn filter(db: &Database, field: impl AsRef<str>, value: impl Into<Bson>) -> QueryBuilder<Record<Self>> {
        Self::query(db).filter(field, value)
    }

    fn filter_by(db: &Database, document: Document) -> QueryBuilder<Record<Self>> {
        Self::query(db).filter_by(document)
    }

    fn sort(db: &Database, field: impl Into<String>, order: impl Into<SortDirection>) -> QueryBuilder<Record<Self>> {
        Self::query(db).sort(field, order)
    }

    fn skip(db: &Database, skip: u64) -> QueryBuilder<Record<Self>> {
        Self::query(db).skip(skip)
    }

    fn limit(db: &Database, limit: u64) -> QueryBuilder<Record<Self>> {
        Self::query(db).limit(limit)
    }

    /// Looks up a record by primary key.
    async fn find<I>(db: &Database, id: I) -> QueryResult<Option<Record<Self>>>
    where
        I: Into<Bson> + Send,
    {
        Self::query(db).filter(ID_FIELD, id).first().await
    }

    /// Like [`find`](Model::find), but a missing record is a
    /// [`QueryError::DocumentNotFound`].
    async fn find_or_fail<I>(db: &Database, id: I) -> QueryResult<Record<Self>>
    where
        I: Into<Bson> + Send,
    {
        let id = id.into();
        let label = id.to_string();

        Self::find(db, id)
            .await?
            .ok_or_else(|| QueryError::DocumentNotFound(label, Self::collection()))
    }

    /// Returns every record in the collection.
    async fn all(db: &Database) -> QueryResult<Vec<Record<Self>>> {
        Self::query(db).get().await
    }

    /// Same as [`all`](Model::all).
    async fn get(db: &Database) -> QueryResult<Vec<Record<Self>>> {
        Self::all(db).await
    }

    async fn insert<D>(db: &Database, items: D) -> QueryResult<Vec<Record<Self>>>
    where
        D: IntoDocuments + Send,
    {
        Self::query(db).insert(items).await
    }

    /// Sets `fields` on every record in the collection.
    async fn update(db: &Database, fields: Document) -> QueryResult<UpdateOutcome> {
        Self::query(db).update(fields).await
    }

    /// Deletes every record in the collection.
    async fn remove(db: &Database) -> QueryResult<DeleteOutcome> {
        Self::query(db).remove().await
    }
}

/// One document of a [`Model`]'s collection.
///
/// A record without an `_id` has never been saved. [`save`](Record::save) inserts it and picks
/// up the generated key; once it has a key, saving updates the stored document instead.
pub struct Record<M> {
    db: Database,
    data: Document,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Record<M> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            data: self.data.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("collection", &M::collection())
            .field("data", &self.data)
            .finish()
    }
}

impl<M: Model> Record<M> {
    pub fn new(db: &Database, data: Document) -> Self {
        Self {
            db: db.clone(),
            data,
            _model: PhantomData,
        }
    }

    /// The primary key, once the record has been saved (or was loaded from the store).
    pub fn id(&self) -> Option<&Bson> {
        self.data.get(ID_FIELD)
    }

    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    pub fn data(&self) -> &Document {
        &self.data
    }

    pub fn into_data(self) -> Document {
        self.data
    }

    /// Reads a field. `id` is accepted for `_id`.
    pub fn get(&self, key: &str) -> Option<&Bson> {
        self.data.get(canonical_field(key))
    }

    pub fn set(&mut self, key: impl AsRef<str>, value: impl Into<Bson>) -> &mut Self {
        self.data.insert(canonical_field(key.as_ref()), value.into());
        self
    }

    /// Replaces every field. The current primary key, if any, is kept.
    pub fn replace(&mut self, mut data: Document) -> &mut Self {
        if let Some(id) = self.id().cloned() {
            data.insert(ID_FIELD, id);
        }

        self.data = data;
        self
    }

    /// Inserts a new record, or updates the stored one.
    pub async fn save(&mut self) -> QueryResult<()> {
        if !self.is_new() {
            self.update().await?;
            return Ok(());
        }

        let inserted = self.documents().insert(self.data.clone()).await?;

        match inserted.into_iter().next() {
            Some(stored) => {
                self.data = stored;
                Ok(())
            }
            None => Err(QueryError::Backend(format!(
                "insert into {} returned no document",
                M::collection()
            ))),
        }
    }

    /// Writes every field except the primary key to the stored document.
    pub async fn update(&self) -> QueryResult<UpdateOutcome> {
        let Some(id) = self.id().cloned() else {
            return Err(QueryError::Usage(format!(
                "{}: id needs to be specified before update",
                M::collection()
            )));
        };

        let mut fields = self.data.clone();
        fields.remove(ID_FIELD);

        self.documents()
            .filter(ID_FIELD, id)
            .update(fields)
            .await
    }

    /// Deletes the stored document. The record keeps its data.
    pub async fn delete(&self) -> QueryResult<DeleteOutcome> {
        let Some(id) = self.id().cloned() else {
            return Err(QueryError::Usage(format!(
                "{}: id needs to be specified before delete",
                M::collection()
            )));
        };

        self.documents()
            .filter(ID_FIELD, id)
            .remove()
            .await
    }

    fn documents(&self) -> QueryBuilder<Document> {
        self.db
            .collection(M::collection())
            .schema(M::schema())
    }
}

impl<M: Model> Materialize for Record<M> {
    fn materialize(document: Document, db: &Database) -> QueryResult<Self> {
        Ok(Record::new(db, document))
    }
}
