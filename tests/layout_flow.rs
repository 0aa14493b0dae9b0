//! End-to-end layout editing flow over the in-process gateway.
//!
//! Exercises the public surface the way an embedding UI would: load a
//! layout from TOML-derived configuration, build it up with optimistic
//! mutations, rearrange it through the drag controller, and let a second
//! session converge through the push-update channel.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use dashboard_layout::config::{ConfigLoader, EngineConfig};
use dashboard_layout::drag::DragController;
use dashboard_layout::gateway::memory::MemoryGateway;
use dashboard_layout::store::LayoutStore;
use dashboard_layout::{ConfigMap, SyncState};

fn config_of(value: serde_json::Value) -> ConfigMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

async fn wait_idle(store: &LayoutStore) {
    // Idle must hold across several polls so a reload that is about to
    // start does not count as settled.
    let mut stable = 0;
    for _ in 0..200 {
        if store.sync_state().await == SyncState::Idle {
            stable += 1;
            if stable >= 4 {
                return;
            }
        } else {
            stable = 0;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store did not settle: {:?}", store.sync_state().await);
}

async fn wait_for_len(store: &LayoutStore, len: usize) {
    for _ in 0..200 {
        if store.instances().await.len() == len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "store never reached {len} instances: {:?}",
        store.instance_ids().await
    );
}

#[tokio::test]
async fn full_editing_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[store]\nchannel_capacity = 64\nauto_repair = true\n\n[log]\nfilter = \"debug\"\n",
    )
    .expect("write config");
    let engine_config = ConfigLoader::load_from_path(&path).expect("parse config");

    let gateway = Arc::new(MemoryGateway::new());
    let store = LayoutStore::with_config(gateway.clone(), &engine_config);
    let mut updates = store.subscribe();

    store.load("owner-1").await.expect("load empty layout");
    assert!(store.instances().await.is_empty());

    // Build the dashboard up.
    store.add_widget("stats").await.expect("add stats");
    store.add_widget("chart").await.expect("add chart");
    store.add_widget("activity-log").await.expect("add log");
    wait_idle(&store).await;

    let instances = store.instances().await;
    assert_eq!(instances.len(), 3);
    for (index, instance) in instances.iter().enumerate() {
        assert_eq!(instance.position, index as u32);
    }
    // Defaults came from the catalog.
    assert_eq!(instances[0].config["title"], json!("Statistics"));

    // Drag the chart to the front.
    let controller = DragController::new(store.clone());
    controller.on_drag_end(1, Some(0)).await.expect("drag");
    wait_idle(&store).await;

    let order: Vec<String> = store
        .instances()
        .await
        .iter()
        .map(|w| w.widget_type.clone())
        .collect();
    assert_eq!(order, vec!["chart", "stats", "activity-log"]);

    // Edit the chart, then drop the stats widget.
    let chart_id = store.instance_ids().await[0].clone();
    store
        .update_widget(
            &chart_id,
            &config_of(json!({ "title": "Traffic", "chartType": "line" })),
        )
        .await
        .expect("update chart");
    let stats_id = store.instance_ids().await[1].clone();
    store.remove_widget(&stats_id).await.expect("remove stats");
    wait_idle(&store).await;

    let instances = store.instances().await;
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].config["title"], json!("Traffic"));
    assert_eq!(instances[0].position, 0);
    assert_eq!(instances[1].widget_type, "activity-log");
    assert_eq!(instances[1].position, 1);

    // The session produced a stream of repaint notifications.
    assert!(updates.try_recv().is_ok());

    // Local state matches the durable copy exactly.
    assert_eq!(store.instances().await, gateway.rows_for("owner-1"));
}

#[tokio::test]
async fn two_sessions_converge_through_signals() {
    let gateway = Arc::new(MemoryGateway::new());
    let session_a = LayoutStore::new(gateway.clone());
    let session_b = LayoutStore::new(gateway.clone());

    session_a.load("owner-1").await.expect("load a");
    session_b.load("owner-1").await.expect("load b");

    // Session A edits; session B observes via the push channel.
    session_a.add_widget("stats").await.expect("add");
    wait_for_len(&session_b, 1).await;

    session_a.add_widget("quick-actions").await.expect("add");
    wait_for_len(&session_b, 2).await;

    let id = session_a.instance_ids().await[0].clone();
    session_a.remove_widget(&id).await.expect("remove");
    wait_for_len(&session_b, 1).await;

    wait_idle(&session_a).await;
    wait_idle(&session_b).await;
    assert_eq!(
        session_a.instances().await,
        session_b.instances().await,
        "both sessions converge to the durable state"
    );
}

#[tokio::test]
async fn default_engine_config_loads_when_file_is_missing() {
    let config = EngineConfig::default();
    assert_eq!(config.store.channel_capacity, 256);
    assert!(config.store.auto_repair);

    let gateway = Arc::new(MemoryGateway::new());
    let store = LayoutStore::with_config(gateway, &config);
    store.load("owner-1").await.expect("load");
    assert_eq!(store.sync_state().await, SyncState::Idle);
}
