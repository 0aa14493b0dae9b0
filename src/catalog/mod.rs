//! Widget catalog for the dashboard layout engine.
//!
//! The catalog is a static registry mapping a widget type tag to its
//! configuration schema, default configuration, and display metadata. It
//! holds no mutable state and is safe for concurrent lookups.
//!
//! # Example
//!
//! ```
//! use dashboard_layout::catalog::WidgetCatalog;
//!
//! let catalog = WidgetCatalog::new();
//! let descriptor = catalog.describe("stats").expect("stats is built in");
//! assert_eq!(descriptor.display_name, "Statistics Card");
//!
//! // Every default config validates against its own schema.
//! let normalized = catalog
//!     .validate("stats", &descriptor.default_config)
//!     .expect("defaults are valid");
//! assert_eq!(normalized["title"], serde_json::json!("Statistics"));
//! ```

pub mod schema;
pub mod validate;

pub use schema::{ConfigSchema, FieldKind, FieldSpec};

use std::collections::HashMap;

use serde_json::json;

use crate::{ConfigMap, LayoutError};

/// Static description of one widget type.
#[derive(Debug, Clone)]
pub struct WidgetDescriptor {
    /// Tag identifying this widget type.
    pub widget_type: &'static str,
    /// Human-readable name shown in the "add widget" menu.
    pub display_name: &'static str,
    /// Short description of what the widget shows.
    pub description: &'static str,
    /// Schema the widget's configuration must satisfy.
    pub schema: ConfigSchema,
    /// Configuration assigned to newly added instances; also the source
    /// for back-filling missing optional fields during validation.
    pub default_config: ConfigMap,
}

/// Registry mapping widget type tags to descriptors.
///
/// Pre-populated with the six built-in widget types. Lookups never
/// mutate; the catalog can be shared freely across tasks.
#[derive(Debug, Clone)]
pub struct WidgetCatalog {
    descriptors: HashMap<&'static str, WidgetDescriptor>,
}

impl WidgetCatalog {
    /// Creates a catalog with the built-in widget types:
    /// `stats`, `chart`, `recent-posts`, `recent-comments`,
    /// `quick-actions`, `activity-log`.
    pub fn new() -> Self {
        let mut descriptors = HashMap::new();
        for descriptor in builtin_descriptors() {
            descriptors.insert(descriptor.widget_type, descriptor);
        }
        Self { descriptors }
    }

    /// Looks up the descriptor for a widget type.
    ///
    /// # Errors
    ///
    /// Returns [`LayoutError::UnknownWidgetType`] if the tag is not
    /// registered.
    pub fn describe(&self, widget_type: &str) -> Result<&WidgetDescriptor, LayoutError> {
        self.descriptors
            .get(widget_type)
            .ok_or_else(|| LayoutError::UnknownWidgetType(widget_type.to_string()))
    }

    /// Validates and normalizes a raw configuration for a widget type.
    ///
    /// Convenience wrapper around [`validate::validate`] that resolves the
    /// descriptor and wraps field errors into
    /// [`LayoutError::InvalidConfig`].
    pub fn validate(&self, widget_type: &str, raw: &ConfigMap) -> Result<ConfigMap, LayoutError> {
        let descriptor = self.describe(widget_type)?;
        validate::validate(descriptor, raw).map_err(|field_errors| LayoutError::InvalidConfig {
            widget_type: widget_type.to_string(),
            field_errors,
        })
    }

    /// All registered widget type tags. The order is not guaranteed.
    pub fn types(&self) -> Vec<&'static str> {
        self.descriptors.keys().copied().collect()
    }
}

impl Default for WidgetCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn config_map(value: serde_json::Value) -> ConfigMap {
    match value {
        serde_json::Value::Object(map) => map,
        other => unreachable!("built-in default config must be an object, got {other}"),
    }
}

fn builtin_descriptors() -> Vec<WidgetDescriptor> {
    vec![
        WidgetDescriptor {
            widget_type: "stats",
            display_name: "Statistics Card",
            description: "Single key metric with an icon and accent color.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::text("value").required(),
                FieldSpec::text("icon"),
                FieldSpec::choice("color", &["blue", "green", "red", "yellow", "purple"]),
            ]),
            default_config: config_map(json!({
                "title": "Statistics",
                "value": "0",
                "icon": "activity",
                "color": "blue",
            })),
        },
        WidgetDescriptor {
            widget_type: "chart",
            display_name: "Chart",
            description: "Bar, line, or pie chart over a data source.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::choice("chartType", &["bar", "line", "pie"]).required(),
                FieldSpec::text("dataSource"),
            ]),
            default_config: config_map(json!({
                "title": "Chart",
                "chartType": "bar",
                "dataSource": "",
            })),
        },
        WidgetDescriptor {
            widget_type: "recent-posts",
            display_name: "Recent Posts",
            description: "Most recently published posts.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::integer("limit", 1, 100),
                FieldSpec::boolean("showExcerpt"),
            ]),
            default_config: config_map(json!({
                "title": "Recent Posts",
                "limit": 5,
                "showExcerpt": false,
            })),
        },
        WidgetDescriptor {
            widget_type: "recent-comments",
            display_name: "Recent Comments",
            description: "Latest comments across all posts.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::integer("limit", 1, 100),
            ]),
            default_config: config_map(json!({
                "title": "Recent Comments",
                "limit": 5,
            })),
        },
        WidgetDescriptor {
            widget_type: "quick-actions",
            display_name: "Quick Actions",
            description: "Shortcut buttons for common tasks.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::text("actions"),
            ]),
            default_config: config_map(json!({
                "title": "Quick Actions",
                "actions": "New Post, New Page",
            })),
        },
        WidgetDescriptor {
            widget_type: "activity-log",
            display_name: "Activity Log",
            description: "Chronological feed of recent account activity.",
            schema: ConfigSchema::new(vec![
                FieldSpec::text("title").required(),
                FieldSpec::integer("limit", 1, 100),
            ]),
            default_config: config_map(json!({
                "title": "Activity Log",
                "limit": 10,
            })),
        },
    ]
}
