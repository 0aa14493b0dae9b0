//! Load and snapshot-validation tests for LayoutStore.

use serde_json::json;

use super::{make_instance, setup, setup_loaded};
use crate::config::EngineConfig;
use crate::store::LayoutStore;
use crate::{ConfigMap, LayoutError, SyncState};

fn config_of(value: serde_json::Value) -> ConfigMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[tokio::test]
async fn test_load_empty_layout() {
    let (store, _gateway) = setup();
    store.load("owner-1").await.expect("empty layout loads");

    assert!(store.instances().await.is_empty());
    assert_eq!(store.owner_id().await.as_deref(), Some("owner-1"));
    assert_eq!(store.sync_state().await, SyncState::Idle);
}

#[tokio::test]
async fn test_load_sorts_by_position() {
    let (store, gateway) = setup();
    gateway.insert_raw(make_instance(
        "w-b",
        "owner-1",
        "chart",
        2,
        config_of(json!({ "title": "B", "chartType": "pie" })),
    ));
    gateway.insert_raw(make_instance(
        "w-a",
        "owner-1",
        "stats",
        0,
        config_of(json!({ "title": "A", "value": "1" })),
    ));
    gateway.insert_raw(make_instance(
        "w-m",
        "owner-1",
        "quick-actions",
        1,
        config_of(json!({ "title": "M" })),
    ));

    store.load("owner-1").await.expect("load");

    let ids = store.instance_ids().await;
    assert_eq!(ids, vec!["w-a", "w-m", "w-b"]);
}

#[tokio::test]
async fn test_load_failure_leaves_store_empty() {
    let (store, gateway) = setup_loaded("owner-1", &["stats"]).await;
    assert_eq!(store.instances().await.len(), 1);

    gateway.set_unavailable(true);
    let err = store.load("owner-1").await.unwrap_err();
    assert!(matches!(err, LayoutError::LoadError(_)));

    assert!(store.instances().await.is_empty());
    assert!(matches!(store.sync_state().await, SyncState::Error(_)));
}

#[tokio::test]
async fn test_load_retried_after_failure() {
    let (store, gateway) = setup();
    gateway.set_unavailable(true);
    assert!(store.load("owner-1").await.is_err());

    // Failures are not retried internally; the caller re-invokes.
    gateway.set_unavailable(false);
    store.load("owner-1").await.expect("retry succeeds");
    assert_eq!(store.sync_state().await, SyncState::Idle);
}

#[tokio::test]
async fn test_load_normalizes_valid_configs() {
    let (store, gateway) = setup();
    // Valid config missing optional fields; load back-fills defaults.
    gateway.insert_raw(make_instance(
        "w-1",
        "owner-1",
        "stats",
        0,
        config_of(json!({ "title": "Users", "value": "42" })),
    ));

    store.load("owner-1").await.expect("load");

    let instances = store.instances().await;
    assert_eq!(instances[0].config["icon"], json!("activity"));
    assert_eq!(instances[0].config["color"], json!("blue"));
    assert!(store.pending_repairs().await.is_empty());
}

#[tokio::test]
async fn test_load_repairs_invalid_config_and_flags_it() {
    let (store, gateway) = setup();
    // "limit" must be an integer; a stored garbage value is repaired.
    gateway.insert_raw(make_instance(
        "w-bad",
        "owner-1",
        "recent-posts",
        0,
        config_of(json!({ "title": "Latest", "limit": "many" })),
    ));

    store.load("owner-1").await.expect("load");

    let instances = store.instances().await;
    assert_eq!(instances.len(), 1, "repaired instance stays visible");
    assert_eq!(instances[0].config["title"], json!("Recent Posts"));
    assert_eq!(instances[0].config["limit"], json!(5));
    assert_eq!(store.pending_repairs().await, vec!["w-bad".to_string()]);
}

#[tokio::test]
async fn test_load_drops_invalid_config_when_auto_repair_off() {
    let gateway = std::sync::Arc::new(crate::gateway::memory::MemoryGateway::new());
    let mut config = EngineConfig::default();
    config.store.auto_repair = false;
    let store = LayoutStore::with_config(gateway.clone(), &config);

    gateway.insert_raw(make_instance(
        "w-bad",
        "owner-1",
        "recent-posts",
        0,
        config_of(json!({ "title": "Latest", "limit": "many" })),
    ));
    gateway.insert_raw(make_instance(
        "w-ok",
        "owner-1",
        "quick-actions",
        1,
        config_of(json!({ "title": "Shortcuts" })),
    ));

    store.load("owner-1").await.expect("load");

    let ids = store.instance_ids().await;
    assert_eq!(ids, vec!["w-ok"], "invalid instance rejected at boundary");
    assert!(store.pending_repairs().await.is_empty());
}

#[tokio::test]
async fn test_load_drops_unregistered_widget_type() {
    let (store, gateway) = setup();
    gateway.insert_raw(make_instance(
        "w-alien",
        "owner-1",
        "crystal-ball",
        0,
        config_of(json!({ "title": "???" })),
    ));
    gateway.insert_raw(make_instance(
        "w-ok",
        "owner-1",
        "stats",
        1,
        config_of(json!({ "title": "Users", "value": "1" })),
    ));

    store.load("owner-1").await.expect("load");

    assert_eq!(store.instance_ids().await, vec!["w-ok"]);
}

#[tokio::test]
async fn test_load_switches_owner() {
    let (store, gateway) = setup_loaded("owner-1", &["stats", "chart"]).await;
    gateway.insert_raw(make_instance(
        "w-2",
        "owner-2",
        "quick-actions",
        0,
        config_of(json!({ "title": "Shortcuts" })),
    ));

    store.load("owner-2").await.expect("load second owner");

    assert_eq!(store.owner_id().await.as_deref(), Some("owner-2"));
    assert_eq!(store.instance_ids().await, vec!["w-2"]);
}
