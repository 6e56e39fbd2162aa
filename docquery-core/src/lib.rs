//! Core of the docquery project: a fluent, deferred query builder and an active-record layer
//! over document stores.
//!
//! This crate provides:
//!
//! - **Database handle** ([`database`]) - The root every query chain starts from
//! - **Query builder** ([`builder`]) - Chainable filter/sort/skip/limit with async terminal calls
//! - **Models** ([`model`]) - Collection-backed types and self-saving records
//! - **Schemas and validation** ([`schema`], [`validator`]) - Write gating against a schema tree
//! - **Query specification** ([`query`]) - The state a builder hands to a driver
//! - **Driver abstraction** ([`driver`]) - Traits every storage engine implements
//! - **Configuration** ([`config`]) - Connection settings and driver selection
//! - **Error handling** ([`error`]) - The shared error and result types
//!
//! # Example
//!
//! ```ignore
//! use docquery_core::{database::Database, schema::SchemaNode};
//! use bson::doc;
//!
//! let items = db
//!     .collection("items")
//!     .schema(SchemaNode::from_example(&bson::bson!({ "name": "", "index": 0 })))
//!     .insert(doc! { "name": "item-1", "index": 1 })
//!     .await?;
//!
//! let found = db.collection("items").filter("name", "item-1").get().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_core;

pub mod builder;
pub mod config;
pub mod database;
pub mod driver;
pub mod error;
pub mod model;
pub mod query;
pub mod schema;
pub mod validator;
