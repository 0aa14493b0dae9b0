//! Tests for the LayoutStore.
//!
//! Tests are organized into categories:
//! - `load`: initial fetch, config validation/repair, failure handling
//! - `add`: optimistic append and rollback
//! - `update`: config replacement, benign races, rollback
//! - `remove`: removal, repacking, idempotence
//! - `reorder`: permutation checking and transactional position batches
//! - `subscriber`: UI notification channel
//! - `remote`: push-channel reconciliation and load supersession

mod load;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::LayoutStore;
use crate::catalog::WidgetCatalog;
use crate::gateway::memory::MemoryGateway;
use crate::{ConfigMap, SyncState, WidgetInstance};

/// Store over a fresh in-memory gateway. Nothing loaded yet.
pub(super) fn setup() -> (LayoutStore, Arc<MemoryGateway>) {
    let gateway = Arc::new(MemoryGateway::new());
    let store = LayoutStore::new(gateway.clone());
    (store, gateway)
}

/// Store loaded for `owner_id` with one pre-seeded instance per widget
/// type, each carrying its catalog default config. Seeding goes through
/// `insert_raw`, so no change signals are pending after load.
pub(super) async fn setup_loaded(
    owner_id: &str,
    widget_types: &[&str],
) -> (LayoutStore, Arc<MemoryGateway>) {
    let (store, gateway) = setup();
    let catalog = WidgetCatalog::new();
    for (position, widget_type) in widget_types.iter().enumerate() {
        let config = catalog
            .describe(widget_type)
            .expect("test widget type is registered")
            .default_config
            .clone();
        gateway.insert_raw(make_instance(
            &format!("w-seed-{position}"),
            owner_id,
            widget_type,
            position as u32,
            config,
        ));
    }
    store.load(owner_id).await.expect("seeded layout loads");
    (store, gateway)
}

/// Builds an instance row as the gateway would persist it.
pub(super) fn make_instance(
    id: &str,
    owner_id: &str,
    widget_type: &str,
    position: u32,
    config: ConfigMap,
) -> WidgetInstance {
    let now = Utc::now();
    WidgetInstance {
        id: id.to_string(),
        owner_id: owner_id.to_string(),
        widget_type: widget_type.to_string(),
        position,
        config,
        created_at: now,
        updated_at: now,
    }
}

/// Asserts the positions form the contiguous range `0..n-1` in order.
pub(super) fn assert_contiguous(instances: &[WidgetInstance]) {
    for (index, instance) in instances.iter().enumerate() {
        assert_eq!(
            instance.position, index as u32,
            "position gap or duplicate at index {index}: {instances:?}"
        );
    }
}

/// Polls until the store settles back to `Idle` (e.g. after the watcher
/// consumed pending change signals). `Idle` must hold across several
/// consecutive polls so a reload that is about to start does not count
/// as settled. Panics after one second.
pub(super) async fn wait_idle(store: &LayoutStore) {
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
    panic!("store did not settle to Idle: {:?}", store.sync_state().await);
}

/// Polls until the store holds exactly `len` instances. Panics after one
/// second.
pub(super) async fn wait_for_len(store: &LayoutStore, len: usize) {
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
