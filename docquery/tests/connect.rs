use docquery::prelude::*;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn memory_configuration_yields_a_working_database() {
    let config = DatabaseConfig::from_json(r#"{ "driver": "memory", "database": "scratch" }"#).unwrap();
    let db = docquery::connect(&config).await.unwrap();

    assert_eq!(db.driver().name(), "memory");

    db.collection("items").insert(doc! { "n": 1 }).await.unwrap();
    assert_eq!(db.collection("items").get().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_configurations_fail_before_connecting() {
    let missing_host = DatabaseConfig::new().with_port(27017).with_database("shop");
    let unknown = DatabaseConfig::new().with_driver("couchdb").with_database("shop");

    assert!(matches!(docquery::connect(&missing_host).await, Err(QueryError::Configuration(_))));
    assert!(matches!(docquery::connect(&unknown).await, Err(QueryError::Configuration(_))));
}

#[tokio::test]
async fn named_configurations_are_resolved_by_name() {
    let configs = DatabaseConfigs::from_json(
        r#"{ "local": { "driver": "memory", "database": "dev" } }"#,
    )
    .unwrap();

    assert!(docquery::connect_named(&configs, "local").await.is_ok());
    assert!(matches!(
        docquery::connect_named(&configs, "staging").await,
        Err(QueryError::Configuration(_))
    ));
}

#[cfg(not(feature = "mongodb"))]
#[tokio::test]
async fn mongodb_needs_its_feature() {
    let config = DatabaseConfig::new()
        .with_host("localhost")
        .with_port(27017)
        .with_database("shop");

    assert!(matches!(docquery::connect(&config).await, Err(QueryError::Configuration(_))));
}
