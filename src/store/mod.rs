//! Layout store for the dashboard layout engine.
//!
//! The [`LayoutStore`] owns the authoritative in-memory ordered collection
//! of widget instances for one owner. It applies mutations optimistically,
//! persists them through the [`LayoutGateway`], and reconciles with the
//! durable copy by reloading the full instance set whenever the gateway's
//! push channel signals a change. The in-memory copy is advisory until
//! confirmed by the gateway or overwritten by a reload.
//!
//! Mutations are serialized through an internal operation lock: a
//! push-triggered reload waits for an in-flight mutation to settle, and
//! back-to-back mutations never interleave their optimistic states. While
//! a gateway request is in flight the store reports
//! [`SyncState::Syncing`], which the UI uses to disable further mutation
//! triggers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;

use crate::catalog::WidgetCatalog;
use crate::config::EngineConfig;
use crate::gateway::LayoutGateway;
use crate::{LayoutError, LayoutUpdate, SyncState, WidgetInstance};

mod mutate;

#[cfg(test)]
mod tests;

/// Default capacity for the UI notification channel.
/// Allows bursty reconciliation scenarios without dropping notifications.
const DEFAULT_UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Owner-scoped layout state behind the store's `RwLock`.
#[derive(Debug)]
struct Inner {
    /// Owner whose layout is loaded, if any.
    owner_id: Option<String>,
    /// Widget instances ordered by `position`.
    instances: Vec<WidgetInstance>,
    /// Synchronization state with the gateway.
    sync_state: SyncState,
    /// Ids whose stored config failed validation at load time and was
    /// reset to defaults; the repaired config is persisted on the next
    /// save of that instance.
    repair_pending: HashSet<String>,
}

/// Authoritative in-memory layout for the current owner.
///
/// Cloning is cheap and shares state; all clones observe the same layout
/// and the same push subscription. Dropping the last handle aborts the
/// push-subscription watcher, so an abandoned store does not keep running
/// in the background.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use dashboard_layout::gateway::memory::MemoryGateway;
/// use dashboard_layout::store::LayoutStore;
///
/// #[tokio::main]
/// async fn main() {
///     let gateway = Arc::new(MemoryGateway::new());
///     let store = LayoutStore::new(gateway);
///     store.load("owner-1").await.expect("empty layout loads");
///     let added = store.add_widget("stats").await.expect("create succeeds");
///     assert_eq!(added.position, 0);
/// }
/// ```
#[derive(Clone)]
pub struct LayoutStore {
    core: Arc<StoreCore>,
}

/// State shared by every clone of a [`LayoutStore`].
///
/// The watcher task holds only a `Weak` reference to this struct, so the
/// task cannot keep an abandoned store alive; when the last external
/// handle drops, `Drop` aborts the task and the gateway subscription is
/// released with it.
struct StoreCore {
    gateway: Arc<dyn LayoutGateway>,
    catalog: WidgetCatalog,
    inner: RwLock<Inner>,
    /// Serializes load/refresh/mutations; held across the gateway call so
    /// optimistic states never interleave.
    op_lock: AsyncMutex<()>,
    /// Bumped by every `load`; reloads carrying a stale generation are
    /// discarded instead of overwriting newer state.
    generation: AtomicU64,
    /// Monotonic counter for optimistic placeholder ids.
    pending_seq: AtomicU64,
    /// Push-subscription watcher task for the loaded owner.
    watcher: std::sync::Mutex<Option<JoinHandle<()>>>,
    /// Broadcast sender for UI re-render notifications.
    update_tx: broadcast::Sender<LayoutUpdate>,
    /// Whether invalid stored configs are repaired to defaults (true) or
    /// dropped at the boundary (false).
    auto_repair: bool,
}

impl Drop for StoreCore {
    fn drop(&mut self) {
        if let Ok(mut watcher) = self.watcher.lock() {
            if let Some(handle) = watcher.take() {
                handle.abort();
            }
        }
    }
}

impl std::fmt::Debug for LayoutStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutStore")
            .field("inner", &self.core.inner)
            .field("subscriber_count", &self.core.update_tx.receiver_count())
            .field("auto_repair", &self.core.auto_repair)
            .finish()
    }
}

impl LayoutStore {
    /// Creates a store over the given gateway with the built-in widget
    /// catalog and default settings.
    pub fn new(gateway: Arc<dyn LayoutGateway>) -> Self {
        Self::construct(
            gateway,
            WidgetCatalog::new(),
            DEFAULT_UPDATE_CHANNEL_CAPACITY,
            true,
        )
    }

    /// Creates a store tuned by an [`EngineConfig`].
    pub fn with_config(gateway: Arc<dyn LayoutGateway>, config: &EngineConfig) -> Self {
        Self::construct(
            gateway,
            WidgetCatalog::new(),
            config.store.channel_capacity,
            config.store.auto_repair,
        )
    }

    fn construct(
        gateway: Arc<dyn LayoutGateway>,
        catalog: WidgetCatalog,
        channel_capacity: usize,
        auto_repair: bool,
    ) -> Self {
        // `broadcast::channel` panics on zero capacity, which a host
        // config file may still specify.
        let (update_tx, _rx) = broadcast::channel(channel_capacity.max(1));
        Self {
            core: Arc::new(StoreCore {
                gateway,
                catalog,
                inner: RwLock::new(Inner {
                    owner_id: None,
                    instances: Vec::new(),
                    sync_state: SyncState::Idle,
                    repair_pending: HashSet::new(),
                }),
                op_lock: AsyncMutex::new(()),
                generation: AtomicU64::new(0),
                pending_seq: AtomicU64::new(0),
                watcher: std::sync::Mutex::new(None),
                update_tx,
                auto_repair,
            }),
        }
    }

    /// The widget catalog this store validates against.
    pub fn catalog(&self) -> &WidgetCatalog {
        &self.core.catalog
    }

    /// Subscribes to re-render notifications.
    ///
    /// A [`LayoutUpdate`] is sent after every applied local state change:
    /// load, optimistic apply, rollback, and push-triggered
    /// reconciliation. Subscribers re-read [`instances`](Self::instances).
    pub fn subscribe(&self) -> broadcast::Receiver<LayoutUpdate> {
        self.core.update_tx.subscribe()
    }

    /// Number of active re-render subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.core.update_tx.receiver_count()
    }

    /// Snapshot of the current instances, ordered by position.
    pub async fn instances(&self) -> Vec<WidgetInstance> {
        self.core.inner.read().await.instances.clone()
    }

    /// Ids of the current instances, in position order.
    pub async fn instance_ids(&self) -> Vec<String> {
        let inner = self.core.inner.read().await;
        inner.instances.iter().map(|w| w.id.clone()).collect()
    }

    /// Current synchronization state.
    pub async fn sync_state(&self) -> SyncState {
        self.core.inner.read().await.sync_state.clone()
    }

    /// Owner whose layout is loaded, if any.
    pub async fn owner_id(&self) -> Option<String> {
        self.core.inner.read().await.owner_id.clone()
    }

    /// Ids flagged for config repair on their next save.
    pub async fn pending_repairs(&self) -> Vec<String> {
        let inner = self.core.inner.read().await;
        let mut ids: Vec<String> = inner.repair_pending.iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Fetches the full instance set for `owner_id`, validates configs,
    /// and opens a push subscription scoped to that owner.
    ///
    /// A later `load` supersedes any earlier one: reloads triggered by the
    /// superseded subscription are discarded by generation check.
    ///
    /// # Errors
    ///
    /// [`LayoutError::LoadError`] on gateway failure; the store is left
    /// empty with `sync_state = Error`. The caller may retry explicitly.
    pub async fn load(&self, owner_id: &str) -> Result<(), LayoutError> {
        let _op = self.core.op_lock.lock().await;
        let generation = self.core.generation.fetch_add(1, Ordering::SeqCst) + 1;

        {
            let mut inner = self.core.inner.write().await;
            inner.owner_id = Some(owner_id.to_string());
            inner.sync_state = SyncState::Syncing;
        }
        self.notify_ui();

        match self.core.gateway.list(owner_id).await {
            Ok(rows) => {
                self.apply_snapshot(rows).await;
                self.notify_ui();
                self.start_watcher(owner_id.to_string(), generation);
                Ok(())
            }
            Err(err) => {
                let mut inner = self.core.inner.write().await;
                inner.instances.clear();
                inner.repair_pending.clear();
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(LayoutError::LoadError(err.to_string()))
            }
        }
    }

    /// Re-fetches the instance set for the loaded owner.
    ///
    /// The same authoritative path the push-subscription watcher takes;
    /// exposed so callers can resynchronize explicitly (e.g. after a
    /// `LoadError`).
    pub async fn refresh(&self) -> Result<(), LayoutError> {
        let generation = self.core.generation.load(Ordering::SeqCst);
        self.reload_if_current(generation).await
    }

    /// Reloads from the gateway unless `generation` has been superseded
    /// by a newer `load`.
    async fn reload_if_current(&self, generation: u64) -> Result<(), LayoutError> {
        let _op = self.core.op_lock.lock().await;
        // Generation only changes inside `load`, which holds the op lock,
        // so one check here covers the whole critical section.
        if self.core.generation.load(Ordering::SeqCst) != generation {
            tracing::trace!(generation, "discarding reload for superseded load");
            return Ok(());
        }

        let owner_id = {
            let inner = self.core.inner.read().await;
            inner.owner_id.clone()
        }
        .ok_or(LayoutError::NotLoaded)?;

        {
            let mut inner = self.core.inner.write().await;
            inner.sync_state = SyncState::Syncing;
        }
        self.notify_ui();

        match self.core.gateway.list(&owner_id).await {
            Ok(rows) => {
                self.apply_snapshot(rows).await;
                self.notify_ui();
                Ok(())
            }
            Err(err) => {
                // Unlike a failed `load`, a failed re-fetch keeps the last
                // known state: the instances on screen were confirmed once
                // and the next signal or explicit refresh retries.
                let mut inner = self.core.inner.write().await;
                inner.sync_state = SyncState::Error(err.to_string());
                drop(inner);
                self.notify_ui();
                Err(LayoutError::LoadError(err.to_string()))
            }
        }
    }

    /// Replaces local state with a freshly fetched snapshot.
    ///
    /// Rows are sorted by position and each config validated against the
    /// catalog. Invalid configs are repaired to defaults and flagged for
    /// repair-on-next-save, or dropped when `auto_repair` is off. Rows
    /// with an unregistered widget type are always dropped: no schema
    /// exists to repair against, and the renderer must never see them.
    async fn apply_snapshot(&self, mut rows: Vec<WidgetInstance>) {
        rows.sort_by_key(|w| w.position);

        let mut instances = Vec::with_capacity(rows.len());
        let mut repair_pending = HashSet::new();

        for mut row in rows {
            let descriptor = match self.core.catalog.describe(&row.widget_type) {
                Ok(descriptor) => descriptor,
                Err(_) => {
                    tracing::warn!(
                        id = %row.id,
                        widget_type = %row.widget_type,
                        "dropping instance with unregistered widget type"
                    );
                    continue;
                }
            };
            match self.core.catalog.validate(&row.widget_type, &row.config) {
                Ok(normalized) => {
                    row.config = normalized;
                }
                Err(err) => {
                    if self.core.auto_repair {
                        tracing::warn!(
                            id = %row.id,
                            widget_type = %row.widget_type,
                            %err,
                            "stored config invalid; repaired to defaults"
                        );
                        row.config = descriptor.default_config.clone();
                        repair_pending.insert(row.id.clone());
                    } else {
                        tracing::warn!(
                            id = %row.id,
                            widget_type = %row.widget_type,
                            %err,
                            "stored config invalid; dropping instance"
                        );
                        continue;
                    }
                }
            }
            instances.push(row);
        }

        let mut inner = self.core.inner.write().await;
        inner.instances = instances;
        inner.repair_pending = repair_pending;
        inner.sync_state = SyncState::Idle;
    }

    /// Spawns the watcher task that reloads on every change signal.
    ///
    /// Replaces (and aborts) the watcher of any previously loaded owner.
    /// The task upgrades a weak reference per signal and exits when the
    /// store is gone, so it never extends the store's lifetime.
    fn start_watcher(&self, owner_id: String, generation: u64) {
        let mut rx = self.core.gateway.subscribe(&owner_id);
        let weak = Arc::downgrade(&self.core);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Missed signals collapse into one reload; the
                        // reload-on-any-signal policy tolerates this.
                        tracing::trace!(skipped, "change signals lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
                let Some(core) = weak.upgrade() else { break };
                let store = LayoutStore { core };
                if let Err(err) = store.reload_if_current(generation).await {
                    tracing::warn!(%err, "push-triggered reload failed");
                }
                if store.core.generation.load(Ordering::SeqCst) != generation {
                    break;
                }
            }
        });

        let mut watcher = self.core.watcher.lock().expect("watcher lock");
        if let Some(old) = watcher.replace(handle) {
            old.abort();
        }
    }

    /// Assigns a unique placeholder id for an optimistic entry awaiting
    /// its server-assigned id.
    pub(crate) fn next_pending_id(&self) -> String {
        let seq = self.core.pending_seq.fetch_add(1, Ordering::SeqCst);
        format!("pending-{seq}")
    }

    /// Notifies UI subscribers that local state changed.
    pub(crate) fn notify_ui(&self) {
        match self.core.update_tx.send(LayoutUpdate) {
            Ok(count) => tracing::trace!("layout update sent to {} subscribers", count),
            Err(_) => tracing::trace!("no subscribers for layout update"),
        }
    }
}
