//! Connection configuration.
//!
//! A [`DatabaseConfig`] is what callers hand over (usually deserialized from a settings file);
//! [`DatabaseConfig::validate`] turns it into a [`ResolvedConfig`] that names exactly one
//! driver and carries everything that driver needs.

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::error::{QueryError, QueryResult};

/// The authentication database used when none is configured.
pub const DEFAULT_AUTH_SOURCE: &str = "admin";

/// Connection settings as supplied by the caller.
///
/// ```ignore
/// let config = DatabaseConfig::from_json(r#"{
///     "host": "localhost",
///     "port": 27017,
///     "database": "shop",
///     "username": "app",
///     "password": "secret",
///     "authSource": "admin"
/// }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(alias = "auth_source")]
    pub auth_source: Option<String>,
    /// Which driver to use. Defaults to MongoDB.
    pub driver: Option<String>,
}

impl DatabaseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(|err| QueryError::Configuration(err.to_string()))
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_auth_source(mut self, auth_source: impl Into<String>) -> Self {
        self.auth_source = Some(auth_source.into());
        self
    }

    pub fn with_driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    /// Checks that the selected driver has everything it needs.
    pub fn validate(&self) -> QueryResult<ResolvedConfig> {
        let kind = match self.driver.as_deref() {
            Some(name) => name.parse()?,
            None => DriverKind::MongoDb,
        };

        let database = required(&self.database, "database")?;

        match kind {
            DriverKind::Memory => Ok(ResolvedConfig::Memory { database }),
            DriverKind::MongoDb => {
                let host = required(&self.host, "host")?;
                let port = self
                    .port
                    .ok_or_else(|| QueryError::Configuration("missing port".into()))?;

                let credentials = self.username.as_ref().map(|username| Credentials {
                    username: username.clone(),
                    password: self.password.clone().unwrap_or_default(),
                    auth_source: self
                        .auth_source
                        .clone()
                        .unwrap_or_else(|| DEFAULT_AUTH_SOURCE.to_string()),
                });

                Ok(ResolvedConfig::MongoDb(Endpoint { host, port, database, credentials }))
            }
        }
    }
}

fn required(value: &Option<String>, name: &str) -> QueryResult<String> {
    match value.as_deref() {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(QueryError::Configuration(format!("missing {name}"))),
    }
}

/// The drivers a configuration can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    MongoDb,
    Memory,
}

impl FromStr for DriverKind {
    type Err = QueryError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "mongo" | "mongodb" => Ok(DriverKind::MongoDb),
            "memory" => Ok(DriverKind::Memory),
            other => Err(QueryError::Configuration(format!("unknown driver {other}"))),
        }
    }
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DriverKind::MongoDb => "mongodb",
            DriverKind::Memory => "memory",
        })
    }
}

/// Login details for a server endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub auth_source: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

/// A server address plus the database to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    /// A connection URI with the password masked, for log output.
    pub fn redacted_uri(&self) -> String {
        match &self.credentials {
            Some(credentials) => format!(
                "mongodb://{}:***@{}:{}/{}?authSource={}",
                credentials.username, self.host, self.port, self.database, credentials.auth_source
            ),
            None => format!("mongodb://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// A validated configuration for exactly one driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedConfig {
    MongoDb(Endpoint),
    Memory { database: String },
}

impl ResolvedConfig {
    pub fn kind(&self) -> DriverKind {
        match self {
            ResolvedConfig::MongoDb(_) => DriverKind::MongoDb,
            ResolvedConfig::Memory { .. } => DriverKind::Memory,
        }
    }

    pub fn database(&self) -> &str {
        match self {
            ResolvedConfig::MongoDb(endpoint) => &endpoint.database,
            ResolvedConfig::Memory { database } => database,
        }
    }
}

/// Named configurations, e.g. one per environment.
///
/// ```ignore
/// let configs = DatabaseConfigs::from_json(r#"{
///     "local": { "driver": "memory", "database": "dev" },
///     "ci": { "host": "mongo", "port": 27017, "database": "ci" }
/// }"#)?;
/// let db = docquery::connect_named(&configs, "local").await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseConfigs {
    connections: BTreeMap<String, DatabaseConfig>,
}

impl DatabaseConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> QueryResult<Self> {
        serde_json::from_str(json).map_err(|err| QueryError::Configuration(err.to_string()))
    }

    pub fn insert(&mut self, name: impl Into<String>, config: DatabaseConfig) -> &mut Self {
        self.connections.insert(name.into(), config);
        self
    }

    /// Looks up a configuration by name.
    pub fn get(&self, name: &str) -> QueryResult<&DatabaseConfig> {
        self.connections
            .get(name)
            .ok_or_else(|| QueryError::Configuration(format!("no connection named {name}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn assert_config_error(result: QueryResult<ResolvedConfig>, expected: &str) {
        match result {
            Err(QueryError::Configuration(message)) => assert_eq!(message, expected),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn mongo_is_the_default_driver() {
        let resolved = DatabaseConfig::new()
            .with_host("localhost")
            .with_port(27017)
            .with_database("shop")
            .validate()
            .unwrap();

        assert_eq!(
            resolved,
            ResolvedConfig::MongoDb(Endpoint {
                host: "localhost".into(),
                port: 27017,
                database: "shop".into(),
                credentials: None,
            })
        );
    }

    #[test]
    fn missing_endpoint_parts_are_configuration_errors() {
        let base = DatabaseConfig::new().with_host("localhost").with_port(27017);

        assert_config_error(base.clone().validate(), "missing database");
        assert_config_error(
            DatabaseConfig::new().with_port(1).with_database("d").validate(),
            "missing host"
        );
        assert_config_error(
            DatabaseConfig::new().with_host("h").with_database("d").validate(),
            "missing port"
        );
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let config = DatabaseConfig::new().with_driver("couch").with_database("d");

        assert_config_error(config.validate(), "unknown driver couch");
    }

    #[test]
    fn memory_driver_needs_only_a_database() {
        let resolved = DatabaseConfig::new()
            .with_driver("memory")
            .with_database("scratch")
            .validate()
            .unwrap();

        assert_eq!(resolved.kind(), DriverKind::Memory);
        assert_eq!(resolved.database(), "scratch");
    }

    #[test]
    fn credentials_default_to_the_admin_auth_source() {
        let config = DatabaseConfig::from_json(
            r#"{ "host": "db", "port": 27017, "database": "shop", "username": "app", "password": "pw" }"#,
        )
        .unwrap();

        let ResolvedConfig::MongoDb(endpoint) = config.validate().unwrap() else {
            panic!("expected a mongodb endpoint");
        };

        assert_eq!(endpoint.credentials.as_ref().map(|c| c.auth_source.as_str()), Some("admin"));
        assert_eq!(endpoint.redacted_uri(), "mongodb://app:***@db:27017/shop?authSource=admin");
    }

    #[test]
    fn auth_source_is_read_in_camel_case() {
        let config = DatabaseConfig::from_json(
            r#"{ "host": "db", "port": 1, "database": "d", "username": "u", "authSource": "users" }"#,
        )
        .unwrap();

        assert_eq!(config.auth_source.as_deref(), Some("users"));
    }

    #[test]
    fn named_configurations_are_selected_by_name() {
        let configs = DatabaseConfigs::from_json(
            r#"{ "local": { "driver": "memory", "database": "dev" }, "ci": { "host": "mongo", "port": 27017, "database": "ci" } }"#,
        )
        .unwrap();

        assert_eq!(configs.names().collect::<Vec<_>>(), vec!["ci", "local"]);
        assert_eq!(configs.get("local").unwrap().driver.as_deref(), Some("memory"));
        assert!(matches!(configs.get("prod"), Err(QueryError::Configuration(_))));
    }
}
