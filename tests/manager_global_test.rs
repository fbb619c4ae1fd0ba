//! Connection manager and global facade tests.

use polystore::db::{get_database, get_database_async, init_database, set_config_loader};
use polystore::{BackendType, ConnectionConfig, ConnectionManager, StoreError};
use std::sync::Arc;

fn memory_config() -> ConnectionConfig {
    ConnectionConfig::from_url("sqlite::memory:").unwrap()
}

#[tokio::test]
async fn registry_lifecycle() {
    let manager = ConnectionManager::new();
    assert!(!manager.has_connection(Some("primary")));

    manager.connect(Some("primary"), memory_config()).await.unwrap();
    manager.connect(Some("replica"), memory_config()).await.unwrap();

    let mut names = manager.connection_names();
    names.sort();
    assert_eq!(names, vec!["primary".to_string(), "replica".to_string()]);

    let primary = manager.get_connection(Some("primary")).unwrap();
    assert_eq!(primary.backend_type(), BackendType::SQLite);
    assert!(primary.health_check().await.healthy);

    // Closing removes the entry and closes the adapter.
    manager.close("primary").await;
    assert!(!manager.has_connection(Some("primary")));
    assert!(primary.is_closed());
    assert!(!primary.health_check().await.healthy);

    // Closing again, or a name that never existed, is a no-op.
    manager.close("primary").await;
    manager.close("never-existed").await;

    manager.close_all().await;
    assert_eq!(manager.connection_count(), 0);
}

#[tokio::test]
async fn missing_connection_error_names_the_connection() {
    let manager = ConnectionManager::new();
    match manager.get_connection(Some("analytics")) {
        Err(StoreError::ConnectionNotFound { name, .. }) => assert_eq!(name, "analytics"),
        other => panic!("expected ConnectionNotFound, got {:?}", other.map(|_| ())),
    }
}

// The facade is one process-lifetime singleton, so every facade assertion
// lives in a single sequential test.
#[tokio::test]
async fn global_facade_flow() {
    // Uninitialized sync accessor: error guides toward the async variant.
    match get_database(Some("main")) {
        Err(StoreError::ConnectionNotFound { suggestion, .. }) => {
            assert!(suggestion.contains("get_database_async"));
        }
        other => panic!("expected ConnectionNotFound, got {:?}", other.map(|_| ())),
    }

    // Uninitialized async accessor without a loader.
    match get_database_async(Some("main")).await {
        Err(StoreError::ConfigLoaderNotSet) => {}
        other => panic!("expected ConfigLoaderNotSet, got {:?}", other.map(|_| ())),
    }

    // Explicit init makes both accessors work.
    init_database(memory_config(), Some("main")).await.unwrap();
    let adapter = get_database(Some("main")).unwrap();
    assert!(adapter.health_check().await.healthy);
    let same = get_database_async(Some("main")).await.unwrap();
    assert!(Arc::ptr_eq(&adapter, &same));

    // A registered loader lazily initializes unseen names.
    set_config_loader(Arc::new(|_name| {
        Box::pin(async move { Ok(ConnectionConfig::from_url("sqlite::memory:").unwrap()) })
    }));
    let lazy = get_database_async(Some("reports")).await.unwrap();
    assert_eq!(lazy.backend_type(), BackendType::SQLite);
    // And the lazily created connection is now visible synchronously.
    assert!(get_database(Some("reports")).is_ok());
}
