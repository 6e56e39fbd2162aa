//! MongoDB driver for docquery.
//!
//! This crate implements the `Driver` and `Connection` traits on top of the official `mongodb`
//! crate. Filters are translated into MongoDB query documents, cursors are exposed as document
//! streams, and primary keys are `ObjectId`s.
//!
//! To use this driver, enable the `mongodb` feature of the facade crate:
//!
//! ```toml
//! [dependencies]
//! docquery = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Every terminal query call opens a fresh client, checks it with a `ping`, runs one operation
//! and shuts the client down. The driver is built either from a connection string or from a
//! validated configuration endpoint.
//!
//! # Example
//!
//! ```ignore
//! use docquery::{Database, driver::DriverBuilder, mongodb::MongoDriver};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let driver = MongoDriver::builder("mongodb://localhost:27017", "shop")
//!         .build()
//!         .await?;
//!     let db = Database::new(driver);
//!
//!     let users = db.collection("users").filter("active", true).get().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docquery_mongodb;

pub mod driver;
mod query;

pub use driver::{MongoConnection, MongoDriver, MongoDriverBuilder};
