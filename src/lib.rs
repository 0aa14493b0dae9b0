//! Dashboard layout engine library
//!
//! This crate provides the core state machinery for a user-customizable
//! dashboard: an ordered collection of widget instances per owner, edited
//! through optimistic local mutations and kept convergent with a remote
//! persistence layer via a payload-free push-update channel.
//!
//! # Architecture
//!
//! - [`catalog`]: static registry of widget types, their configuration
//!   schemas and defaults, plus the configuration validator.
//! - [`gateway`]: the [`gateway::LayoutGateway`] trait consumed (not
//!   implemented) by the store, and an in-process reference implementation.
//! - [`store`]: the [`store::LayoutStore`], the authoritative in-memory
//!   layout for one owner, with optimistic add/update/remove/reorder and
//!   reload-on-signal reconciliation.
//! - [`drag`]: translation of drag gestures into reorder intents.
//!
//! The store never merges concurrent edits: the remote copy is
//! last-writer-wins, and any change signal triggers a full reload, so local
//! state diverges from durable state for at most one round trip.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Widget catalog and configuration validation.
pub mod catalog;

/// Engine configuration loaded from TOML.
pub mod config;

/// Drag gesture translation into reorder intents.
pub mod drag;

/// Remote layout gateway contract and in-process implementation.
pub mod gateway;

/// Logging initialization helpers.
pub mod logging;

/// The layout store: optimistic mutations and remote reconciliation.
pub mod store;

/// A widget-type-specific configuration object.
///
/// Stored as a JSON object; its keys and value types are dictated by the
/// [`catalog::ConfigSchema`] of the instance's widget type.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

/// One configured placement of a widget type on an owner's dashboard.
///
/// `id`, `owner_id` and `widget_type` are immutable after creation;
/// `position` defines the total order among instances sharing `owner_id`
/// and is unique per owner. After any successful mutation settles, the
/// positions for an owner form the contiguous range `0..n-1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetInstance {
    /// Opaque unique identifier, assigned by the gateway at creation.
    pub id: String,
    /// Identifier of the owning user.
    pub owner_id: String,
    /// Tag into the widget catalog.
    pub widget_type: String,
    /// Zero-based position within the owner's layout.
    pub position: u32,
    /// Widget-type-specific configuration, valid against the catalog schema.
    pub config: ConfigMap,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Server-assigned last-update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Synchronization state of the layout store with the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    /// No gateway request in flight; local state matches the last
    /// confirmed remote state (modulo unobserved remote changes).
    Idle,
    /// A gateway request is in flight. The UI should disable mutation
    /// triggers while in this state.
    Syncing,
    /// The last gateway request failed; the optimistic change was rolled
    /// back. Cleared by the next successful operation.
    Error(String),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Syncing => write!(f, "syncing"),
            SyncState::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// Notification sent to UI subscribers whenever the store's local state
/// changes (load, optimistic apply, rollback, or reconciliation).
///
/// Carries no payload; subscribers re-read
/// [`store::LayoutStore::instances`] and re-render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutUpdate;

/// A single field-level validation violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// JSON key of the offending field.
    pub field: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl FieldError {
    pub(crate) fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors surfaced by the layout engine.
///
/// Local validation errors (`UnknownWidgetType`, `InvalidConfig`,
/// `InvalidReorder`, `NotLoaded`) are rejected before any optimistic
/// mutation or network call. Remote failures (`NotFound`,
/// `GatewayUnavailable`, `LoadError`) roll back the optimistic change and
/// are not retried internally.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The widget type tag is not registered in the catalog.
    #[error("unknown widget type: {0}")]
    UnknownWidgetType(String),

    /// The raw configuration violates the widget type's schema.
    /// Every violating field is enumerated.
    #[error("invalid config for widget type '{widget_type}': {}", format_field_errors(field_errors))]
    InvalidConfig {
        /// Widget type the configuration was validated against.
        widget_type: String,
        /// All violations found in one pass.
        field_errors: Vec<FieldError>,
    },

    /// The reorder id list is not a permutation of the owner's current
    /// instance ids (missing, foreign, or duplicate id).
    #[error("reorder list is not a permutation of the current widget ids")]
    InvalidReorder,

    /// No instance with this id exists for the loaded owner.
    #[error("widget instance not found: {0}")]
    NotFound(String),

    /// The remote gateway could not be reached or rejected the request.
    #[error("gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Fetching the full instance set failed; the store remains empty.
    #[error("failed to load layout: {0}")]
    LoadError(String),

    /// A mutation was invoked before a successful `load`.
    #[error("no layout loaded")]
    NotLoaded,
}

fn format_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(FieldError::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
