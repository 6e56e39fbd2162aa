//! MongoDB driver for the query builder.
//!
//! Each connection is a fresh client checked with a `ping`, scoped to one database and shut
//! down again when the terminal call closes it.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    options::{ClientOptions, Credential, FindOptions, ServerAddress},
    Client, Collection as MongoCollection, Database as MongoDatabase,
};
use std::any::Any;

use docquery_core::{
    config::Endpoint,
    driver::{Connection, DeleteOutcome, DocumentStream, Driver, DriverBuilder, InsertOutcome, UpdateOutcome},
    error::{QueryError, QueryResult},
    query::{Filter, FilterVisitor, QuerySpec},
};

use crate::query::{sort_document, MongoFilterTranslator};

fn backend(err: mongodb::error::Error) -> QueryError {
    QueryError::Backend(err.to_string())
}

/// MongoDB driver. Every [`connect`](Driver::connect) creates a client from the stored options
/// and checks it with a `ping`.
#[derive(Debug, Clone)]
pub struct MongoDriver {
    options: ClientOptions,
    database: String,
}

impl MongoDriver {
    pub fn new(options: ClientOptions, database: impl Into<String>) -> Self {
        Self { options, database: database.into() }
    }

    /// Starts a builder from a connection string such as `mongodb://localhost:27017`.
    pub fn builder(dsn: &str, database: &str) -> MongoDriverBuilder {
        MongoDriverBuilder::new(dsn, database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

#[async_trait]
impl Driver for MongoDriver {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn connect(&self) -> QueryResult<Box<dyn Connection>> {
        let client = Client::with_options(self.options.clone())
            .map_err(|e| QueryError::Connection(e.to_string()))?;
        let database = client.database(&self.database);

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| QueryError::Connection(e.to_string()))?;

        Ok(Box::new(MongoConnection { client, database }))
    }

    fn generate_id(&self) -> Bson {
        Bson::ObjectId(ObjectId::new())
    }

    /// Accepts ObjectIds as they are and parses 24-character hex strings.
    fn to_native_id(&self, value: &Bson) -> QueryResult<Bson> {
        match value {
            Bson::ObjectId(_) => Ok(value.clone()),
            Bson::String(id) => ObjectId::parse_str(id)
                .map(Bson::ObjectId)
                .map_err(|_| QueryError::InvalidId(id.clone())),
            other => Err(QueryError::InvalidId(other.to_string())),
        }
    }
}

/// One open MongoDB client, scoped to the configured database.
///
/// Reach it through [`RawConnection::downcast_ref`](docquery_core::database::RawConnection::downcast_ref)
/// to run operations the builder does not model.
#[derive(Debug)]
pub struct MongoConnection {
    client: Client,
    database: MongoDatabase,
}

impl MongoConnection {
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn database(&self) -> &MongoDatabase {
        &self.database
    }

    fn collection(&self, name: &str) -> MongoCollection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl Connection for MongoConnection {
    async fn find(&self, spec: &QuerySpec) -> QueryResult<DocumentStream> {
        let cursor = self
            .collection(&spec.collection)
            .find(MongoFilterTranslator.visit_filter(&spec.filter)?)
            .with_options(find_options(spec))
            .await
            .map_err(backend)?;

        Ok(cursor.map_err(backend).boxed())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> QueryResult<InsertOutcome> {
        let result = self
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(backend)?;

        Ok(InsertOutcome { inserted_ids: vec![result.inserted_id] })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> QueryResult<InsertOutcome> {
        let result = self
            .collection(collection)
            .insert_many(documents)
            .await
            .map_err(backend)?;

        let mut inserted = result.inserted_ids.into_iter().collect::<Vec<_>>();
        inserted.sort_by_key(|(index, _)| *index);

        Ok(InsertOutcome {
            inserted_ids: inserted.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> QueryResult<UpdateOutcome> {
        let result = self
            .collection(collection)
            .update_many(
                MongoFilterTranslator.visit_filter(filter)?,
                doc! { "$set": fields },
            )
            .await
            .map_err(backend)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
        })
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> QueryResult<DeleteOutcome> {
        let result = self
            .collection(collection)
            .delete_many(MongoFilterTranslator.visit_filter(filter)?)
            .await
            .map_err(backend)?;

        Ok(DeleteOutcome { deleted_count: result.deleted_count })
    }

    async fn close(self: Box<Self>) -> QueryResult<()> {
        self.client.shutdown().await;

        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Skip, limit and sort for a read. A zero limit or skip is left unset.
fn find_options(spec: &QuerySpec) -> FindOptions {
    let mut options = FindOptions::default();

    if spec.limit > 0 {
        options.limit = Some(i64::try_from(spec.limit).unwrap_or(i64::MAX));
    }
    if spec.skip > 0 {
        options.skip = Some(spec.skip);
    }
    options.sort = sort_document(&spec.sort);

    options
}

enum Source {
    Dsn(String),
    Endpoint(Endpoint),
}

/// Builder for [`MongoDriver`], from a connection string or a validated [`Endpoint`].
pub struct MongoDriverBuilder {
    source: Source,
    database: String,
}

impl MongoDriverBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            source: Source::Dsn(dsn.to_string()),
            database: database.to_string(),
        }
    }

    pub fn from_endpoint(endpoint: &Endpoint) -> Self {
        Self {
            source: Source::Endpoint(endpoint.clone()),
            database: endpoint.database.clone(),
        }
    }
}

fn endpoint_options(endpoint: &Endpoint) -> QueryResult<ClientOptions> {
    let address = ServerAddress::parse(format!("{}:{}", endpoint.host, endpoint.port))
        .map_err(|e| QueryError::Configuration(e.to_string()))?;

    let mut options = ClientOptions::default();
    options.hosts = vec![address];

    if let Some(credentials) = &endpoint.credentials {
        let mut credential = Credential::default();
        credential.username = Some(credentials.username.clone());
        credential.password = Some(credentials.password.clone());
        credential.source = Some(credentials.auth_source.clone());

        options.credential = Some(credential);
    }

    Ok(options)
}

#[async_trait]
impl DriverBuilder for MongoDriverBuilder {
    type Driver = MongoDriver;

    async fn build(self) -> QueryResult<Self::Driver> {
        let options = match &self.source {
            Source::Dsn(dsn) => ClientOptions::parse(dsn)
                .await
                .map_err(|e| QueryError::Configuration(e.to_string()))?,
            Source::Endpoint(endpoint) => {
                log::debug!("configuring mongodb driver for {}", endpoint.redacted_uri());
                endpoint_options(endpoint)?
            }
        };

        Ok(MongoDriver::new(options, self.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docquery_core::config::Credentials;
    use pretty_assertions::assert_eq;

    fn endpoint(credentials: Option<Credentials>) -> Endpoint {
        Endpoint {
            host: "db.internal".into(),
            port: 27018,
            database: "shop".into(),
            credentials,
        }
    }

    #[test]
    fn endpoint_without_credentials_sets_only_the_host() {
        let options = endpoint_options(&endpoint(None)).unwrap();

        assert_eq!(options.hosts, vec![ServerAddress::parse("db.internal:27018").unwrap()]);
        assert!(options.credential.is_none());
    }

    #[test]
    fn credentials_carry_the_auth_source() {
        let options = endpoint_options(&endpoint(Some(Credentials {
            username: "app".into(),
            password: "secret".into(),
            auth_source: "admin".into(),
        })))
        .unwrap();

        let credential = options.credential.unwrap();
        assert_eq!(credential.username.as_deref(), Some("app"));
        assert_eq!(credential.source.as_deref(), Some("admin"));
    }

    #[test]
    fn ids_convert_from_hex_strings() {
        let driver = MongoDriver::new(ClientOptions::default(), "shop");
        let id = ObjectId::new();

        assert_eq!(driver.to_native_id(&Bson::String(id.to_hex())).unwrap(), Bson::ObjectId(id));
        assert_eq!(driver.to_native_id(&Bson::ObjectId(id)).unwrap(), Bson::ObjectId(id));
        assert!(matches!(
            driver.to_native_id(&Bson::String("nope".into())),
            Err(QueryError::InvalidId(_))
        ));
    }

    #[test]
    fn oversized_limits_stay_positive() {
        let mut spec = QuerySpec::new("items");
        assert_eq!(find_options(&spec).limit, None);

        spec.limit = u64::MAX;
        spec.skip = 3;
        let options = find_options(&spec);

        assert_eq!(options.limit, Some(i64::MAX));
        assert_eq!(options.skip, Some(3));
    }

    #[test]
    fn generated_ids_are_object_ids() {
        let driver = MongoDriver::new(ClientOptions::default(), "shop");

        assert!(matches!(driver.generate_id(), Bson::ObjectId(_)));
    }
}
