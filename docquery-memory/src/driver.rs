//! In-process driver for the query builder.
//!
//! Collections are ordered vectors of BSON documents behind an async-aware read-write lock.
//! Every connection handed out by [`InMemoryDriver::connect`] shares the same storage, and the
//! driver counts open connections so tests can check that every terminal call released its
//! connection.

use async_trait::async_trait;
use bson::{spec::BinarySubtype, Binary, Bson, Document};
use futures::StreamExt;
use mea::rwlock::RwLock;
use std::{
    any::Any,
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use docquery_core::{
    driver::{Connection, DeleteOutcome, DocumentStream, Driver, DriverBuilder, InsertOutcome, UpdateOutcome},
    error::{QueryError, QueryResult},
    query::{Filter, QuerySpec, ID_FIELD},
};

use crate::evaluator::{assign, differs, sort_documents, DocumentEvaluator};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document store and driver.
///
/// Cloning the driver shares the underlying data and connection counter.
///
/// # Example
///
/// ```ignore
/// use docquery::{Database, memory::InMemoryDriver};
/// use bson::doc;
///
/// let driver = InMemoryDriver::new();
/// let db = Database::new(driver.clone());
///
/// db.collection("users").insert(doc! { "name": "Alice" }).await?;
/// assert_eq!(driver.open_connections(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryDriver {
    database: String,
    store: Arc<RwLock<StoreMap>>,
    open: Arc<AtomicUsize>,
}

impl InMemoryDriver {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryDriverBuilder {
        InMemoryDriverBuilder::default()
    }

    /// The database name this store stands in for.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Number of connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Names of the collections that have received at least one document.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        names
    }
}

#[async_trait]
impl Driver for InMemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&self) -> QueryResult<Box<dyn Connection>> {
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        log::trace!("memory store {:?}: {open} open connection(s)", self.database);

        Ok(Box::new(InMemoryConnection {
            store: self.store.clone(),
            open: self.open.clone(),
        }))
    }

    fn generate_id(&self) -> Bson {
        Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: uuid::Uuid::new_v4().as_bytes().to_vec(),
        })
    }

    /// Accepts UUID binaries as they are and parses UUID strings.
    fn to_native_id(&self, value: &Bson) -> QueryResult<Bson> {
        match value {
            Bson::Binary(binary) if binary.subtype == BinarySubtype::Uuid && binary.bytes.len() == 16 => {
                Ok(value.clone())
            }
            Bson::String(id) => uuid::Uuid::parse_str(id)
                .map(|uuid| {
                    Bson::Binary(Binary {
                        subtype: BinarySubtype::Uuid,
                        bytes: uuid.as_bytes().to_vec(),
                    })
                })
                .map_err(|_| QueryError::InvalidId(id.clone())),
            other => Err(QueryError::InvalidId(other.to_string())),
        }
    }
}

/// One open connection to an [`InMemoryDriver`].
#[derive(Debug)]
pub struct InMemoryConnection {
    store: Arc<RwLock<StoreMap>>,
    open: Arc<AtomicUsize>,
}

impl InMemoryConnection {
    /// Returns a snapshot of a collection, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.store
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Removes a collection and every document in it.
    pub async fn drop_collection(&self, collection: &str) -> bool {
        self.store
            .write()
            .await
            .remove(collection)
            .is_some()
    }

    async fn insert(&self, collection: &str, documents: Vec<Document>) -> QueryResult<InsertOutcome> {
        let mut store = self.store.write().await;
        let stored = store
            .entry(collection.to_string())
            .or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());

        for document in &documents {
            let id = document
                .get(ID_FIELD)
                .cloned()
                .ok_or_else(|| QueryError::Backend(format!("document without {ID_FIELD} in {collection}")))?;

            let taken = stored.iter().any(|existing| existing.get(ID_FIELD) == Some(&id))
                || inserted_ids.contains(&id);

            if taken {
                return Err(QueryError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
            }

            inserted_ids.push(id);
        }

        stored.extend(documents);

        Ok(InsertOutcome { inserted_ids })
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn find(&self, spec: &QuerySpec) -> QueryResult<DocumentStream> {
        let store = self.store.read().await;

        let mut documents = match store.get(&spec.collection) {
            Some(stored) => DocumentEvaluator::filter_documents(stored, &spec.filter),
            None => vec![],
        };
        drop(store);

        sort_documents(&mut documents, &spec.sort);

        let limit = match spec.limit {
            0 => usize::MAX,
            limit => usize::try_from(limit).unwrap_or(usize::MAX),
        };
        let skip = usize::try_from(spec.skip).unwrap_or(usize::MAX);

        let documents = documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(Ok)
            .collect::<Vec<_>>();

        Ok(futures::stream::iter(documents).boxed())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> QueryResult<InsertOutcome> {
        self.insert(collection, vec![document]).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> QueryResult<InsertOutcome> {
        self.insert(collection, documents).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> QueryResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let mut outcome = UpdateOutcome::default();

        let Some(stored) = store.get_mut(collection) else {
            return Ok(outcome);
        };

        let mut updated = Vec::new();

        for (index, document) in stored.iter().enumerate() {
            if !DocumentEvaluator::new(document).matches(filter) {
                continue;
            }

            outcome.matched_count += 1;

            let changed = fields
                .iter()
                .any(|(key, value)| differs(document, key, value));

            if changed {
                let mut document = document.clone();

                for (key, value) in &fields {
                    assign(&mut document, key, value.clone())?;
                }

                updated.push((index, document));
            }
        }

        outcome.modified_count = updated.len() as u64;

        for (index, document) in updated {
            stored[index] = document;
        }

        Ok(outcome)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> QueryResult<DeleteOutcome> {
        let mut store = self.store.write().await;

        let Some(stored) = store.get_mut(collection) else {
            return Ok(DeleteOutcome::default());
        };

        let before = stored.len();
        stored.retain(|document| !DocumentEvaluator::new(document).matches(filter));

        Ok(DeleteOutcome { deleted_count: (before - stored.len()) as u64 })
    }

    async fn close(self: Box<Self>) -> QueryResult<()> {
        self.open.fetch_sub(1, Ordering::SeqCst);

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Builder for constructing [`InMemoryDriver`] instances.
///
/// # Example
///
/// ```ignore
/// use docquery_memory::InMemoryDriver;
/// use docquery::driver::DriverBuilder;
///
/// let driver = InMemoryDriver::builder().database("scratch").build().await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDriverBuilder {
    database: Option<String>,
}

impl InMemoryDriverBuilder {
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }
}

#[async_trait]
impl DriverBuilder for InMemoryDriverBuilder {
    type Driver = InMemoryDriver;

    /// Always succeeds with a fresh, empty store.
    async fn build(self) -> QueryResult<Self::Driver> {
        Ok(InMemoryDriver {
            database: self.database.unwrap_or_default(),
            ..InMemoryDriver::default()
        })
    }
}
