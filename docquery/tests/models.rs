use docquery::{memory::InMemoryDriver, prelude::*};
use pretty_assertions::assert_eq;

struct Item;

impl Model for Item {
    fn schema() -> Option<SchemaNode> {
        Some(SchemaNode::object([
            ("name", SchemaNode::string()),
            ("index", SchemaNode::number()),
        ]))
    }
}

struct Entry;

impl Model for Entry {
    fn collection() -> String {
        "journal".into()
    }
}

fn setup() -> (InMemoryDriver, Database) {
    let driver = InMemoryDriver::new();
    let db = Database::new(driver.clone());

    (driver, db)
}

#[tokio::test]
async fn save_inserts_new_records_and_sets_their_id() {
    let (driver, db) = setup();
    let mut item = Item::new(&db, doc! { "name": "item-1", "index": 1 });
    assert!(item.is_new());

    item.save().await.unwrap();

    assert!(!item.is_new());
    assert_eq!(driver.collection_names().await, vec!["items".to_string()]);
    assert_eq!(Item::all(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn save_updates_persisted_records_and_keeps_their_id() {
    let (_driver, db) = setup();
    let mut item = Item::new(&db, doc! { "name": "item-1", "index": 1 });
    item.save().await.unwrap();
    let id = item.id().cloned().unwrap();

    item.set("index", 2);
    item.save().await.unwrap();

    assert_eq!(item.id(), Some(&id));

    let stored = Item::find_or_fail(&db, id).await.unwrap();
    assert_eq!(stored.get("index"), Some(&Bson::Int32(2)));
    assert_eq!(Item::all(&db).await.unwrap().len(), 1);
}

#[tokio::test]
async fn record_update_never_sends_the_primary_key() {
    let (_driver, db) = setup();
    let mut item = Item::new(&db, doc! { "name": "item-1", "index": 1 });
    item.save().await.unwrap();

    item.replace(doc! { "name": "renamed", "index": 5 });
    let outcome = item.update().await.unwrap();

    assert_eq!(outcome.matched_count, 1);
    assert!(item.id().is_some());
    assert_eq!(Item::filter(&db, "name", "renamed").get().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_without_an_id_is_a_usage_error() {
    let (driver, db) = setup();
    let item = Item::new(&db, doc! { "name": "never-saved", "index": 0 });

    let result = item.delete().await;

    assert!(matches!(result, Err(QueryError::Usage(_))));
    assert_eq!(driver.open_connections(), 0);
    assert!(driver.collection_names().await.is_empty());
}

#[tokio::test]
async fn delete_removes_the_stored_document() {
    let (_driver, db) = setup();
    let mut item = Item::new(&db, doc! { "name": "item-1", "index": 1 });
    item.save().await.unwrap();

    let outcome = item.delete().await.unwrap();

    assert_eq!(outcome.deleted_count, 1);
    assert!(Item::find(&db, item.id().cloned().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn find_reports_missing_records() {
    let (_driver, db) = setup();
    let missing = InMemoryDriver::new().generate_id();

    assert!(Item::find(&db, missing.clone()).await.unwrap().is_none());
    assert!(matches!(
        Item::find_or_fail(&db, missing).await,
        Err(QueryError::DocumentNotFound(_, collection)) if collection == "items"
    ));
}

#[tokio::test]
async fn model_schema_gates_saves() {
    let (driver, db) = setup();
    let mut item = Item::new(&db, doc! { "name": "item-1", "index": "one" });

    let err = item.save().await.unwrap_err();

    assert!(err.is_validation());
    assert!(item.is_new());
    assert!(driver.collection_names().await.is_empty());
}

#[tokio::test]
async fn static_builders_materialize_records() {
    let (_driver, db) = setup();
    Item::insert(
        &db,
        vec![
            doc! { "name": "a", "index": 3 },
            doc! { "name": "b", "index": 1 },
            doc! { "name": "c", "index": 2 },
        ],
    )
    .await
    .unwrap();

    let names = Item::sort(&db, "index", "asc")
        .skip(1)
        .get()
        .await
        .unwrap()
        .iter()
        .map(|record| record.get("name").and_then(Bson::as_str).unwrap().to_string())
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["c", "a"]);
    assert_eq!(Item::update(&db, doc! { "index": 0 }).await.unwrap().matched_count, 3);
    assert_eq!(Item::remove(&db).await.unwrap().deleted_count, 3);
    assert!(Item::get(&db).await.unwrap().is_empty());
}

#[tokio::test]
async fn collection_override_is_used() {
    let (driver, db) = setup();
    let mut entry = Entry::new(&db, doc! { "anything": [1, 2, 3] });
    entry.save().await.unwrap();

    assert_eq!(driver.collection_names().await, vec!["journal".to_string()]);
}

#[tokio::test]
async fn builders_can_switch_to_a_model_output() {
    let (_driver, db) = setup();
    Item::insert(&db, doc! { "name": "a", "index": 1 }).await.unwrap();

    let records = db.collection("items").model::<Item>().get().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].get("name"), Some(&Bson::String("a".into())));
}
