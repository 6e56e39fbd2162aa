//! Main docquery crate: a fluent query builder and an active-record layer over document stores.
//!
//! This crate is the primary entry point. It re-exports the core types from the sub-crates,
//! bundles the in-memory driver, and resolves connection configurations into a [`Database`].
//!
//! # Features
//!
//! - **Deferred queries** - Chain `filter`, `sort`, `skip` and `limit`; nothing runs until a
//!   terminal call (`get`, `insert`, `update`, `remove`, `stream`)
//! - **Schema-gated writes** - Inserts and updates are validated before any connection opens
//! - **Models** - Collection-backed types whose records save, update and delete themselves
//! - **Multiple drivers** - In-memory for development and tests, MongoDB behind a feature
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> QueryResult<()> {
//!     let config = DatabaseConfig::new().with_driver("memory").with_database("shop");
//!     let db = docquery::connect(&config).await?;
//!
//!     db.collection("items")
//!         .insert(vec![
//!             doc! { "name": "item-1", "index": 1 },
//!             doc! { "name": "item-2", "index": 2 },
//!         ])
//!         .await?;
//!
//!     let newest = db
//!         .collection("items")
//!         .sort("index", "desc")
//!         .limit(1)
//!         .get()
//!         .await?;
//!
//!     println!("newest item: {newest:?}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Models
//!
//! ```ignore
//! use docquery::prelude::*;
//!
//! struct Item;
//!
//! impl Model for Item {
//!     fn schema() -> Option<SchemaNode> {
//!         Some(SchemaNode::from_example(&bson::bson!({ "name": "", "index": 0 })))
//!     }
//! }
//!
//! let mut item = Item::new(&db, doc! { "name": "item-3", "index": 3 });
//! item.save().await?;
//!
//! item.set("index", 4);
//! item.save().await?;
//!
//! let found = Item::find_or_fail(&db, item.id().cloned().unwrap()).await?;
//! found.delete().await?;
//! ```
//!
//! # Drivers
//!
//! - [`memory`] - In-process storage for development and testing
//! - [`mongodb`] - MongoDB driver (requires the `mongodb` feature)

pub mod prelude;

pub use docquery_core::{builder, config, database, driver, error, model, query, schema, validator};
pub use docquery_core::{
    builder::QueryBuilder,
    config::{DatabaseConfig, DatabaseConfigs},
    database::Database,
    error::{QueryError, QueryResult},
};

// Re-export BSON types for convenience
pub use bson;

use docquery_core::{
    config::{Endpoint, ResolvedConfig},
    driver::DriverBuilder,
};

/// In-memory driver implementations.
pub mod memory {
    pub use docquery_memory::{InMemoryConnection, InMemoryDriver, InMemoryDriverBuilder};
}

/// MongoDB driver implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docquery_mongodb::{MongoConnection, MongoDriver, MongoDriverBuilder};
}

/// Validates `config`, builds the driver it selects and returns a handle to it.
///
/// Configuration problems (missing host, port or database, unknown driver) are reported as
/// [`QueryError::Configuration`] before anything else happens. No connection is opened here;
/// every terminal query call opens its own.
pub async fn connect(config: &DatabaseConfig) -> QueryResult<Database> {
    let resolved = config.validate()?;

    log::debug!(
        "configuring {} database {:?}",
        resolved.kind(),
        resolved.database(),
    );

    match resolved {
        ResolvedConfig::Memory { database } => Ok(Database::new(
            memory::InMemoryDriver::builder()
                .database(database)
                .build()
                .await?,
        )),
        ResolvedConfig::MongoDb(endpoint) => connect_mongodb(&endpoint).await,
    }
}

/// Looks up the configuration called `name` and [`connect`]s with it.
pub async fn connect_named(configs: &DatabaseConfigs, name: &str) -> QueryResult<Database> {
    connect(configs.get(name)?).await
}

#[cfg(feature = "mongodb")]
async fn connect_mongodb(endpoint: &Endpoint) -> QueryResult<Database> {
    Ok(Database::new(
        mongodb::MongoDriverBuilder::from_endpoint(endpoint)
            .build()
            .await?,
    ))
}

#[cfg(not(feature = "mongodb"))]
async fn connect_mongodb(_endpoint: &Endpoint) -> QueryResult<Database> {
    Err(QueryError::Configuration(
        "the mongodb driver requires the `mongodb` feature".into(),
    ))
}
