//! Integration tests for the SQLite history store.

use pawline_config::DatabaseConfig;
use pawline_history::{
    prepare_database, run_migrations, HistoryStore, SqliteHistoryStore, StoredMessage,
};
use tempfile::TempDir;

struct TestStore {
    store: SqliteHistoryStore,
    _db_dir: TempDir,
}

async fn open_store() -> TestStore {
    let db_dir = TempDir::new().expect("create temp dir");
    let db_path = db_dir.path().join("history-test.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 2,
    };

    let pool = prepare_database(&config).await.expect("prepare database");
    run_migrations(&pool).await.expect("run migrations");

    TestStore {
        store: SqliteHistoryStore::new(pool),
        _db_dir: db_dir,
    }
}

#[tokio::test]
async fn append_then_recent_round_trips_all_fields() {
    let test = open_store().await;

    let message = StoredMessage::assign("global", "Alice", Some("Bob".to_string()), "hi");
    test.store.append(&message).await.unwrap();

    let replayed = test.store.recent("global", 10).await.unwrap();
    assert_eq!(replayed, vec![message]);
}

#[tokio::test]
async fn recent_is_scoped_to_the_requested_room() {
    let test = open_store().await;

    test.store
        .append(&StoredMessage::assign("park", "Alice", None, "fetch?"))
        .await
        .unwrap();
    test.store
        .append(&StoredMessage::assign("vet", "Bob", None, "shots today"))
        .await
        .unwrap();

    let park = test.store.recent("park", 10).await.unwrap();
    assert_eq!(park.len(), 1);
    assert_eq!(park[0].content, "fetch?");
}

#[tokio::test]
async fn recent_keeps_newest_messages_in_ascending_order() {
    let test = open_store().await;

    for i in 0..6 {
        test.store
            .append(&StoredMessage::assign("global", "Alice", None, format!("m{i}")))
            .await
            .unwrap();
    }

    let recent = test.store.recent("global", 4).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["m2", "m3", "m4", "m5"]);
}

#[tokio::test]
async fn identical_timestamps_preserve_insertion_order() {
    let test = open_store().await;

    let ts = "2026-08-30T12:00:00+00:00";
    for i in 0..3 {
        let mut message = StoredMessage::assign("global", "Alice", None, format!("tie{i}"));
        message.created_at = ts.to_string();
        test.store.append(&message).await.unwrap();
    }

    let recent = test.store.recent("global", 10).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["tie0", "tie1", "tie2"]);
}

#[tokio::test]
async fn between_returns_both_directions_and_excludes_third_parties() {
    let test = open_store().await;

    test.store
        .append(&StoredMessage::assign("global", "Alice", Some("Bob".to_string()), "hi bob"))
        .await
        .unwrap();
    test.store
        .append(&StoredMessage::assign("global", "Bob", Some("Alice".to_string()), "hi alice"))
        .await
        .unwrap();
    test.store
        .append(&StoredMessage::assign("global", "Carol", Some("Alice".to_string()), "hi from carol"))
        .await
        .unwrap();
    test.store
        .append(&StoredMessage::assign("global", "Alice", None, "hello everyone"))
        .await
        .unwrap();

    let pair = test.store.between("Alice", "Bob").await.unwrap();
    let contents: Vec<&str> = pair.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi bob", "hi alice"]);
}

#[tokio::test]
async fn broadcast_recipient_is_stored_as_empty_and_read_back_as_none() {
    let test = open_store().await;

    let message = StoredMessage::assign("global", "Alice", None, "to everyone");
    test.store.append(&message).await.unwrap();

    let replayed = test.store.recent("global", 1).await.unwrap();
    assert!(replayed[0].recipient.is_none());
}
