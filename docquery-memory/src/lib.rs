//! In-memory driver for docquery.
//!
//! This crate provides a thread-safe, in-process implementation of the `Driver` and
//! `Connection` traits. Collections keep documents in insertion order behind an async-aware
//! read-write lock. It is meant for development and tests: no server is needed, and the driver
//! reports how many connections are still open.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an async-aware RwLock
//! - **Document-store semantics** - Equality and any-of filters, multi-key sort, skip and limit
//! - **UUID primary keys** - Generated ids are UUID v4 binaries
//! - **Connection accounting** - [`InMemoryDriver::open_connections`]
//!
//! # Quick Start
//!
//! ```ignore
//! use docquery::{Database, memory::InMemoryDriver};
//! use bson::doc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(InMemoryDriver::new());
//!
//!     db.collection("items").insert(doc! { "name": "item-1", "index": 1 }).await?;
//!     let items = db.collection("items").filter("name", "item-1").get().await?;
//!     assert_eq!(items.len(), 1);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_memory;

pub mod driver;
mod evaluator;

pub use driver::{InMemoryConnection, InMemoryDriver, InMemoryDriverBuilder};
