//! The root handle every query chain starts from.
//!
//! A [`Database`] owns a shared reference to one [`Driver`] and nothing else. Cloning it is
//! cheap; every clone talks to the same storage endpoint. Builders and model records carry a
//! clone of the handle they were created from, so there is no process-wide binding.

use bson::Document;
use std::sync::Arc;

use crate::{
    builder::QueryBuilder,
    driver::{Connection, Driver},
    error::QueryResult,
    query::Operation,
};

/// Shared handle to a storage endpoint.
///
/// # Example
///
/// ```ignore
/// use docquery::{prelude::*, memory::InMemoryDriver};
///
/// let db = Database::new(InMemoryDriver::new());
/// let items = db.collection("items").filter("name", "item-1").get().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    driver: Arc<dyn Driver>,
}

impl Database {
    /// Creates a handle that owns `driver`.
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self { driver: Arc::new(driver) }
    }

    /// Creates a handle from an already shared driver.
    pub fn from_shared(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Returns the driver behind this handle.
    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// Starts a new query chain against the named collection.
    ///
    /// Every call yields an independent builder; chains never share filter or sort state.
    pub fn collection(&self, name: impl Into<String>) -> QueryBuilder<Document> {
        QueryBuilder::new(self.clone(), name.into())
    }

    /// Opens a connection and hands it to the caller, bypassing the builder entirely.
    ///
    /// The caller must call [`RawConnection::close`] when done.
    pub async fn raw(&self) -> QueryResult<RawConnection> {
        let connection = self.open(Operation::Raw, "*").await?;

        Ok(RawConnection {
            connection: Some(connection),
            driver: self.driver.name(),
        })
    }

    pub(crate) async fn open(&self, operation: Operation, collection: &str) -> QueryResult<Box<dyn Connection>> {
        log::debug!(
            "opening {} connection for {operation} on {collection}",
            self.driver.name(),
        );

        self.driver.connect().await
    }
}

/// Closes `connection` and passes the operation's result through.
///
/// A failure to close is logged and never replaces the operation's own outcome.
pub(crate) async fn release<R>(connection: Box<dyn Connection>, result: QueryResult<R>) -> QueryResult<R> {
    if let Err(err) = connection.close().await {
        log::warn!("failed to close connection: {err}");
    } else {
        log::debug!("connection closed");
    }

    result
}

/// A live connection handed out by [`Database::raw`].
///
/// Downcast it to the driver's connection type to reach the native handle. Dropping it without
/// calling [`close`](RawConnection::close) leaks the connection until the driver reclaims it.
pub struct RawConnection {
    connection: Option<Box<dyn Connection>>,
    driver: &'static str,
}

impl RawConnection {
    /// The open connection, through the driver-independent interface.
    pub fn connection(&self) -> Option<&dyn Connection> {
        self.connection.as_deref()
    }

    /// Attempts to downcast the connection to a concrete driver type.
    ///
    /// ```ignore
    /// let raw = db.raw().await?;
    /// if let Some(mongo) = raw.downcast_ref::<MongoConnection>() {
    ///     let names = mongo.database().list_collection_names().await?;
    /// }
    /// raw.close().await?;
    /// ```
    pub fn downcast_ref<C: Connection + 'static>(&self) -> Option<&C> {
        self.connection
            .as_deref()?
            .as_any()
            .downcast_ref::<C>()
    }

    /// Releases the connection.
    pub async fn close(mut self) -> QueryResult<()> {
        match self.connection.take() {
            Some(connection) => {
                log::debug!("closing raw {} connection", self.driver);
                connection.close().await
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawConnection")
            .field("driver", &self.driver)
            .field("open", &self.connection.is_some())
            .finish()
    }
}

impl Drop for RawConnection {
    fn drop(&mut self) {
        if self.connection.is_some() {
            log::warn!("raw {} connection dropped without close()", self.driver);
        }
    }
}
