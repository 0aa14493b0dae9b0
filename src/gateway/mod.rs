//! Remote layout gateway contract.
//!
//! The gateway is the external collaborator owning the durable copy of the
//! widget instance table: a CRUD + subscribe interface consumed, not
//! implemented, by the [`crate::store::LayoutStore`]. Any backend (hosted
//! relational service, long-poll bridge, streaming socket) satisfies the
//! contract as long as its push channel delivers at least one notification
//! per actual change; duplicates and extra signals are tolerated because
//! the store's policy is "reload on any signal".
//!
//! [`memory::MemoryGateway`] provides an in-process implementation used by
//! the test suite and for offline operation.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{ConfigMap, LayoutError, WidgetInstance};

/// Payload-free signal that something changed in an owner's instance set.
///
/// Deliberately carries no detail: the store re-fetches the full set on
/// any signal, so the channel never needs to describe the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSignal;

/// Partial update to a single widget instance.
///
/// Both fields optional; `update` applies only what is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePatch {
    /// Replacement configuration, if the config changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigMap>,
    /// New position, if the position changed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl InstancePatch {
    /// A patch replacing only the configuration.
    pub fn config(config: ConfigMap) -> Self {
        Self {
            config: Some(config),
            position: None,
        }
    }

    /// A patch replacing only the position.
    pub fn position(position: u32) -> Self {
        Self {
            config: None,
            position: Some(position),
        }
    }
}

/// One entry of a batched position rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    /// Instance to move.
    pub id: String,
    /// Its new position.
    pub position: u32,
}

/// Errors returned by gateway operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// No row matches `(id, owner_id)`.
    #[error("no widget instance matches id '{id}' for owner '{owner_id}'")]
    NotFound {
        /// Instance id that was targeted.
        id: String,
        /// Owner scope of the request.
        owner_id: String,
    },

    /// The backing service could not be reached or rejected the request.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<GatewayError> for LayoutError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound { id, .. } => LayoutError::NotFound(id),
            GatewayError::Unavailable(reason) => LayoutError::GatewayUnavailable(reason),
        }
    }
}

/// CRUD + subscribe interface over the persisted widget instance table.
///
/// All mutating operations are scoped to an owner; cross-owner access is a
/// contract violation the backend enforces with [`GatewayError::NotFound`].
#[async_trait]
pub trait LayoutGateway: Send + Sync {
    /// Fetches all instances for an owner, in no guaranteed order.
    async fn list(&self, owner_id: &str) -> Result<Vec<WidgetInstance>, GatewayError>;

    /// Creates an instance. The backend assigns `id`, `created_at` and
    /// `updated_at`; the returned instance carries them.
    async fn create(
        &self,
        owner_id: &str,
        widget_type: &str,
        position: u32,
        config: &ConfigMap,
    ) -> Result<WidgetInstance, GatewayError>;

    /// Applies a partial update to the instance matching `(id, owner_id)`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotFound`] if no such row exists.
    async fn update(
        &self,
        id: &str,
        owner_id: &str,
        patch: InstancePatch,
    ) -> Result<(), GatewayError>;

    /// Deletes the instance matching `(id, owner_id)`. Idempotent: no
    /// error if the row is already gone.
    async fn remove(&self, id: &str, owner_id: &str) -> Result<(), GatewayError>;

    /// Rewrites positions for a set of instances in one request.
    /// All-or-nothing: on any error, the caller must assume none of the
    /// updates landed (and reconcile via the push channel if they did).
    async fn batch_set_positions(
        &self,
        owner_id: &str,
        updates: &[PositionUpdate],
    ) -> Result<(), GatewayError>;

    /// Opens a push subscription for all changes to the owner's rows.
    /// Dropping the receiver unsubscribes.
    fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<ChangeSignal>;
}
