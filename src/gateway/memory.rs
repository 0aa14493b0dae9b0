//! In-process gateway backed by a mutex-guarded row set.
//!
//! Implements the full [`LayoutGateway`] contract with server-assigned ids
//! and timestamps, and fires a per-owner [`ChangeSignal`] on every
//! successful write, mirroring how a hosted backend notifies all open
//! sessions of one owner. Fault-injection switches (`set_unavailable`,
//! `set_latency`) let tests exercise rollback paths and in-flight races.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use super::{ChangeSignal, GatewayError, InstancePatch, LayoutGateway, PositionUpdate};
use crate::{ConfigMap, WidgetInstance};

/// Capacity of each per-owner change-signal channel.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

/// In-memory [`LayoutGateway`] implementation.
///
/// Cloning shares the underlying row set, so one instance can back the
/// store while a test mutates rows out-of-band to simulate a concurrent
/// session.
#[derive(Clone)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

struct Inner {
    rows: Mutex<Vec<WidgetInstance>>,
    channels: Mutex<HashMap<String, broadcast::Sender<ChangeSignal>>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(Vec::new()),
                channels: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                unavailable: AtomicBool::new(false),
                latency: Mutex::new(None),
            }),
        }
    }

    /// When set, every subsequent operation fails with
    /// [`GatewayError::Unavailable`] until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Adds an artificial delay before every operation, for exercising
    /// in-flight interleavings.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock().expect("latency lock") = latency;
    }

    /// Inserts a row verbatim, bypassing id assignment and validation.
    /// Used to seed pre-existing (possibly malformed) persisted state.
    pub fn insert_raw(&self, instance: WidgetInstance) {
        self.inner.rows.lock().expect("rows lock").push(instance);
    }

    /// Deletes a row verbatim without firing a change signal.
    /// Simulates a remote deletion whose notification has not yet been
    /// delivered.
    pub fn remove_raw(&self, id: &str) {
        self.inner
            .rows
            .lock()
            .expect("rows lock")
            .retain(|r| r.id != id);
    }

    /// Fires a change signal for an owner without modifying any row.
    /// Simulates a notification originating from another session.
    pub fn notify(&self, owner_id: &str) {
        let channels = self.inner.channels.lock().expect("channels lock");
        if let Some(tx) = channels.get(owner_id) {
            // No subscribers is fine; the signal is simply dropped.
            let _ = tx.send(ChangeSignal);
        }
    }

    /// Number of live push subscriptions for an owner.
    pub fn signal_subscriber_count(&self, owner_id: &str) -> usize {
        let channels = self.inner.channels.lock().expect("channels lock");
        channels.get(owner_id).map_or(0, |tx| tx.receiver_count())
    }

    /// Snapshot of all rows for an owner, sorted by position.
    /// Test helper for comparing store state against durable state.
    pub fn rows_for(&self, owner_id: &str) -> Vec<WidgetInstance> {
        let rows = self.inner.rows.lock().expect("rows lock");
        let mut owned: Vec<WidgetInstance> = rows
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by_key(|r| r.position);
        owned
    }

    async fn checkpoint(&self) -> Result<(), GatewayError> {
        let latency = *self.inner.latency.lock().expect("latency lock");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable(
                "gateway marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows = self.inner.rows.lock().expect("rows lock");
        f.debug_struct("MemoryGateway")
            .field("rows", &rows.len())
            .field("unavailable", &self.inner.unavailable.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl LayoutGateway for MemoryGateway {
    async fn list(&self, owner_id: &str) -> Result<Vec<WidgetInstance>, GatewayError> {
        self.checkpoint().await?;
        Ok(self.rows_for(owner_id))
    }

    async fn create(
        &self,
        owner_id: &str,
        widget_type: &str,
        position: u32,
        config: &ConfigMap,
    ) -> Result<WidgetInstance, GatewayError> {
        self.checkpoint().await?;
        let now = Utc::now();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let instance = WidgetInstance {
            id: format!("w-{id}"),
            owner_id: owner_id.to_string(),
            widget_type: widget_type.to_string(),
            position,
            config: config.clone(),
            created_at: now,
            updated_at: now,
        };
        self.inner
            .rows
            .lock()
            .expect("rows lock")
            .push(instance.clone());
        self.notify(owner_id);
        Ok(instance)
    }

    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        patch: InstancePatch,
    ) -> Result<(), GatewayError> {
        self.checkpoint().await?;
        {
            let mut rows = self.inner.rows.lock().expect("rows lock");
            let row = rows
                .iter_mut()
                .find(|r| r.id == id && r.owner_id == owner_id)
                .ok_or_else(|| GatewayError::NotFound {
                    id: id.to_string(),
                    owner_id: owner_id.to_string(),
                })?;
            if let Some(config) = patch.config {
                row.config = config;
            }
            if let Some(position) = patch.position {
                row.position = position;
            }
            row.updated_at = Utc::now();
        }
        self.notify(owner_id);
        Ok(())
    }

    async fn remove(&self, id: &str, owner_id: &str) -> Result<(), GatewayError> {
        self.checkpoint().await?;
        let removed = {
            let mut rows = self.inner.rows.lock().expect("rows lock");
            let before = rows.len();
            rows.retain(|r| !(r.id == id && r.owner_id == owner_id));
            rows.len() != before
        };
        // Idempotent: deleting an absent row is not an error and fires
        // no signal.
        if removed {
            self.notify(owner_id);
        }
        Ok(())
    }

    async fn batch_set_positions(
        &self,
        owner_id: &str,
        updates: &[PositionUpdate],
    ) -> Result<(), GatewayError> {
        self.checkpoint().await?;
        {
            let mut rows = self.inner.rows.lock().expect("rows lock");
            // All-or-nothing: verify every target exists before touching
            // any row.
            for update in updates {
                if !rows
                    .iter()
                    .any(|r| r.id == update.id && r.owner_id == owner_id)
                {
                    return Err(GatewayError::NotFound {
                        id: update.id.clone(),
                        owner_id: owner_id.to_string(),
                    });
                }
            }
            let now = Utc::now();
            for update in updates {
                if let Some(row) = rows
                    .iter_mut()
                    .find(|r| r.id == update.id && r.owner_id == owner_id)
                {
                    row.position = update.position;
                    row.updated_at = now;
                }
            }
        }
        if !updates.is_empty() {
            self.notify(owner_id);
        }
        Ok(())
    }

    fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<ChangeSignal> {
        let mut channels = self.inner.channels.lock().expect("channels lock");
        channels
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(SIGNAL_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(title: &str) -> ConfigMap {
        let mut map = ConfigMap::new();
        map.insert("title".to_string(), json!(title));
        map
    }

    #[tokio::test]
    async fn test_create_assigns_unique_ids() {
        let gw = MemoryGateway::new();
        let a = gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        let b = gw.create("o1", "stats", 1, &config("B")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.owner_id, "o1");
        assert_eq!(a.position, 0);
    }

    #[tokio::test]
    async fn test_list_scopes_by_owner_and_sorts() {
        let gw = MemoryGateway::new();
        gw.create("o1", "stats", 1, &config("B")).await.unwrap();
        gw.create("o1", "chart", 0, &config("A")).await.unwrap();
        gw.create("o2", "stats", 0, &config("X")).await.unwrap();

        let rows = gw.list("o1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 0);
        assert_eq!(rows[1].position, 1);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let gw = MemoryGateway::new();
        let err = gw
            .update("w-404", "o1", InstancePatch::position(0))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_is_owner_scoped() {
        let gw = MemoryGateway::new();
        let row = gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        let err = gw
            .update(&row.id, "o2", InstancePatch::position(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let gw = MemoryGateway::new();
        let row = gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        gw.remove(&row.id, "o1").await.unwrap();
        gw.remove(&row.id, "o1").await.unwrap();
        assert!(gw.list("o1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_set_positions_is_all_or_nothing() {
        let gw = MemoryGateway::new();
        let a = gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        let _b = gw.create("o1", "chart", 1, &config("B")).await.unwrap();

        let err = gw
            .batch_set_positions(
                "o1",
                &[
                    PositionUpdate {
                        id: a.id.clone(),
                        position: 9,
                    },
                    PositionUpdate {
                        id: "w-404".to_string(),
                        position: 0,
                    },
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotFound { .. }));

        // The valid entry must not have been applied.
        let rows = gw.rows_for("o1");
        assert_eq!(rows[0].id, a.id);
        assert_eq!(rows[0].position, 0);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_operation() {
        let gw = MemoryGateway::new();
        gw.set_unavailable(true);
        assert!(gw.list("o1").await.is_err());
        assert!(gw.create("o1", "stats", 0, &config("A")).await.is_err());
        gw.set_unavailable(false);
        assert!(gw.list("o1").await.is_ok());
    }

    #[tokio::test]
    async fn test_writes_fire_change_signal() {
        let gw = MemoryGateway::new();
        let mut rx = gw.subscribe("o1");
        gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ChangeSignal);
    }

    #[tokio::test]
    async fn test_signal_is_owner_scoped() {
        let gw = MemoryGateway::new();
        let mut rx_other = gw.subscribe("o2");
        gw.create("o1", "stats", 0, &config("A")).await.unwrap();
        assert!(
            rx_other.try_recv().is_err(),
            "o2 must not see o1's changes"
        );
    }
}
