//! Optimistic mutation operations for the [`LayoutStore`].
//!
//! Every operation follows the same shape: validate locally (rejecting
//! before any state change or network call), apply the change to local
//! state, persist through the gateway, and on failure restore the exact
//! pre-operation state and record `SyncState::Error`. Failures are not
//! retried internally; the caller may re-invoke the operation.

use tokio::sync::RwLockWriteGuard;

use super::{Inner, LayoutStore};
use crate::gateway::{GatewayError, InstancePatch, PositionUpdate};
use crate::{ConfigMap, LayoutError, SyncState, WidgetInstance};

impl LayoutStore {
    /// Adds a new widget of `widget_type` at the end of the layout.
    ///
    /// The instance is appended optimistically with the catalog's default
    /// config and `position` set to the current maximum plus one, then
    /// persisted. On success the optimistic entry receives the
    /// server-assigned id and timestamps; the created instance is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::UnknownWidgetType`] before any state change.
    /// - [`LayoutError::NotLoaded`] if no layout is loaded.
    /// - [`LayoutError::GatewayUnavailable`] if the create fails; the
    ///   optimistic entry is rolled back.
    pub async fn add_widget(&self, widget_type: &str) -> Result<WidgetInstance, LayoutError> {
        let _op = self.core.op_lock.lock().await;

        let default_config = self.core.catalog.describe(widget_type)?.default_config.clone();
        let pending_id = self.next_pending_id();

        let (owner_id, position) = {
            let mut inner = self.core.inner.write().await;
            let owner_id = inner.owner_id.clone().ok_or(LayoutError::NotLoaded)?;
            let position = inner
                .instances
                .iter()
                .map(|w| w.position)
                .max()
                .map_or(0, |max| max + 1);

            let now = chrono::Utc::now();
            inner.instances.push(WidgetInstance {
                id: pending_id.clone(),
                owner_id: owner_id.clone(),
                widget_type: widget_type.to_string(),
                position,
                config: default_config.clone(),
                created_at: now,
                updated_at: now,
            });
            inner.sync_state = SyncState::Syncing;
            (owner_id, position)
        };
        self.notify_ui();

        match self
            .core
            .gateway
            .create(&owner_id, widget_type, position, &default_config)
            .await
        {
            Ok(created) => {
                let mut inner = self.core.inner.write().await;
                if let Some(slot) = inner.instances.iter_mut().find(|w| w.id == pending_id) {
                    *slot = created.clone();
                }
                inner.sync_state = SyncState::Idle;
                drop(inner);
                self.notify_ui();
                Ok(created)
            }
            Err(err) => {
                let mut inner = self.core.inner.write().await;
                inner.instances.retain(|w| w.id != pending_id);
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(err.into())
            }
        }
    }

    /// Replaces the configuration of the instance `id`.
    ///
    /// The raw config is validated against the instance's widget type
    /// before any state change. Targeting an instance that no longer
    /// exists (locally, or remotely because another session deleted it)
    /// is a warn-level no-op, not an error: concurrent deletion is an
    /// expected race.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidConfig`] before any state change.
    /// - [`LayoutError::NotLoaded`] if no layout is loaded.
    /// - [`LayoutError::GatewayUnavailable`] if the update fails; the
    ///   previous config is restored.
    pub async fn update_widget(&self, id: &str, raw_config: &ConfigMap) -> Result<(), LayoutError> {
        let _op = self.core.op_lock.lock().await;

        let (owner_id, normalized, previous_config) = {
            let mut inner = self.core.inner.write().await;
            let owner_id = inner.owner_id.clone().ok_or(LayoutError::NotLoaded)?;
            let widget_type = match inner.instances.iter().find(|w| w.id == id) {
                Some(instance) => instance.widget_type.clone(),
                None => {
                    tracing::warn!(id, "update targets a missing instance; ignoring");
                    return Ok(());
                }
            };

            // Reject invalid configs before touching local state.
            let normalized = self.core.catalog.validate(&widget_type, raw_config)?;

            let previous = inner
                .instances
                .iter_mut()
                .find(|w| w.id == id)
                .map(|slot| std::mem::replace(&mut slot.config, normalized.clone()));
            let Some(previous) = previous else {
                return Ok(());
            };
            inner.repair_pending.remove(id);
            inner.sync_state = SyncState::Syncing;
            (owner_id, normalized, previous)
        };
        self.notify_ui();

        match self
            .core
            .gateway
            .update(id, &owner_id, InstancePatch::config(normalized))
            .await
        {
            Ok(()) => {
                let mut inner = self.core.inner.write().await;
                inner.sync_state = SyncState::Idle;
                drop(inner);
                self.notify_ui();
                Ok(())
            }
            Err(GatewayError::NotFound { .. }) => {
                // Another session deleted this instance; the deletion's
                // own change signal removes the stale entry on reload.
                tracing::warn!(id, "update raced a remote deletion; ignoring");
                let mut inner = self.core.inner.write().await;
                if let Some(slot) = inner.instances.iter_mut().find(|w| w.id == id) {
                    slot.config = previous_config;
                }
                inner.sync_state = SyncState::Idle;
                drop(inner);
                self.notify_ui();
                Ok(())
            }
            Err(err) => {
                let mut inner = self.core.inner.write().await;
                if let Some(slot) = inner.instances.iter_mut().find(|w| w.id == id) {
                    slot.config = previous_config;
                }
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(err.into())
            }
        }
    }

    /// Removes the instance `id` and repacks remaining positions to close
    /// the gap.
    ///
    /// Idempotent: removing an id that is already gone is a no-op. The
    /// delete and the follow-up batched position update are treated as
    /// one logical operation: any gateway failure restores the full
    /// pre-operation state (all-or-nothing), and if the delete had
    /// already landed remotely its change signal reconverges the store on
    /// the next round trip.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::NotLoaded`] if no layout is loaded.
    /// - [`LayoutError::GatewayUnavailable`] on gateway failure, after
    ///   rollback.
    pub async fn remove_widget(&self, id: &str) -> Result<(), LayoutError> {
        let _op = self.core.op_lock.lock().await;

        let (owner_id, snapshot, moved) = {
            let mut inner = self.core.inner.write().await;
            let owner_id = inner.owner_id.clone().ok_or(LayoutError::NotLoaded)?;
            if !inner.instances.iter().any(|w| w.id == id) {
                tracing::debug!(id, "remove targets a missing instance; ignoring");
                return Ok(());
            }

            let snapshot = inner.instances.clone();
            inner.instances.retain(|w| w.id != id);
            let moved = repack_positions(&mut inner);
            inner.sync_state = SyncState::Syncing;
            (owner_id, snapshot, moved)
        };
        self.notify_ui();

        let result = match self.core.gateway.remove(id, &owner_id).await {
            Ok(()) => {
                if moved.is_empty() {
                    Ok(())
                } else {
                    self.core.gateway.batch_set_positions(&owner_id, &moved).await
                }
            }
            Err(GatewayError::NotFound { .. }) => {
                // Already gone remotely; proceed with the repack.
                tracing::warn!(id, "remove raced a remote deletion");
                if moved.is_empty() {
                    Ok(())
                } else {
                    self.core.gateway.batch_set_positions(&owner_id, &moved).await
                }
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                let mut inner = self.core.inner.write().await;
                inner.repair_pending.remove(id);
                inner.sync_state = SyncState::Idle;
                drop(inner);
                self.notify_ui();
                Ok(())
            }
            Err(err) => {
                let mut inner = self.core.inner.write().await;
                inner.instances = snapshot;
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(err.into())
            }
        }
    }

    /// Rewrites the layout order to match `ordered_ids`.
    ///
    /// `ordered_ids` must be exactly a permutation of the current
    /// instance ids: same set, same cardinality. Anything else (missing
    /// id, foreign id, duplicate) is rejected with
    /// [`LayoutError::InvalidReorder`] before any state change, which
    /// keeps partial and cross-owner reorders out.
    ///
    /// On acceptance, positions are rewritten to the array index
    /// optimistically and persisted as one batched request. If the batch
    /// fails, every position reverts to its pre-reorder value.
    ///
    /// # Errors
    ///
    /// - [`LayoutError::InvalidReorder`] before any state change.
    /// - [`LayoutError::NotLoaded`] if no layout is loaded.
    /// - [`LayoutError::GatewayUnavailable`] on batch failure, after
    ///   rollback.
    pub async fn reorder(&self, ordered_ids: &[String]) -> Result<(), LayoutError> {
        let _op = self.core.op_lock.lock().await;

        let (owner_id, snapshot, updates) = {
            let mut inner = self.core.inner.write().await;
            let owner_id = inner.owner_id.clone().ok_or(LayoutError::NotLoaded)?;

            if !is_permutation_of(ordered_ids, &inner.instances) {
                return Err(LayoutError::InvalidReorder);
            }

            let snapshot = inner.instances.clone();
            let mut reordered = Vec::with_capacity(ordered_ids.len());
            for (index, id) in ordered_ids.iter().enumerate() {
                // Permutation check above guarantees a match.
                if let Some(instance) = snapshot.iter().find(|w| &w.id == id) {
                    let mut instance = instance.clone();
                    instance.position = index as u32;
                    reordered.push(instance);
                }
            }
            inner.instances = reordered;
            inner.sync_state = SyncState::Syncing;

            let updates: Vec<PositionUpdate> = ordered_ids
                .iter()
                .enumerate()
                .map(|(index, id)| PositionUpdate {
                    id: id.clone(),
                    position: index as u32,
                })
                .collect();
            (owner_id, snapshot, updates)
        };
        self.notify_ui();

        match self.core.gateway.batch_set_positions(&owner_id, &updates).await {
            Ok(()) => {
                let mut inner = self.core.inner.write().await;
                inner.sync_state = SyncState::Idle;
                drop(inner);
                self.notify_ui();
                Ok(())
            }
            Err(err) => {
                let mut inner = self.core.inner.write().await;
                inner.instances = snapshot;
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(err.into())
            }
        }
    }
}

/// Reassigns positions to the contiguous range `0..n` and returns the
/// updates for every instance whose position changed.
fn repack_positions(inner: &mut RwLockWriteGuard<'_, Inner>) -> Vec<PositionUpdate> {
    let mut moved = Vec::new();
    for (index, instance) in inner.instances.iter_mut().enumerate() {
        let position = index as u32;
        if instance.position != position {
            instance.position = position;
            moved.push(PositionUpdate {
                id: instance.id.clone(),
                position,
            });
        }
    }
    moved
}

/// True if `ordered_ids` contains exactly the ids of `instances`, each
/// once.
fn is_permutation_of(ordered_ids: &[String], instances: &[WidgetInstance]) -> bool {
    if ordered_ids.len() != instances.len() {
        return false;
    }
    let unique: std::collections::HashSet<&String> = ordered_ids.iter().collect();
    if unique.len() != ordered_ids.len() {
        return false;
    }
    instances.iter().all(|w| unique.contains(&w.id))
}
