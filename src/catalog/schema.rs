//! Configuration schema types for widget settings.
//!
//! Each widget type declares a flat list of [`FieldSpec`]s. The validator
//! walks this list to normalize raw configuration objects; fields not named
//! by any spec are dropped for forward compatibility.

/// Configuration schema for one widget type.
#[derive(Debug, Clone)]
pub struct ConfigSchema {
    /// Field specifications, in display order.
    pub fields: Vec<FieldSpec>,
}

impl ConfigSchema {
    /// Creates a schema from a list of field specs.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Looks up a field spec by its JSON key.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Specification of a single configuration field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// JSON key of the field (wire format, camelCase where the original
    /// product uses it, e.g. `chartType`).
    pub name: &'static str,
    /// Value type and constraints.
    pub kind: FieldKind,
    /// Required fields must be present and, for text, non-empty.
    /// Optional fields are back-filled from the widget's default config.
    pub required: bool,
}

impl FieldSpec {
    /// A free-text field.
    pub fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            required: false,
        }
    }

    /// An integer field with an inclusive range constraint.
    pub fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: FieldKind::Integer {
                min: Some(min),
                max: Some(max),
            },
            required: false,
        }
    }

    /// A boolean field.
    pub fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Boolean,
            required: false,
        }
    }

    /// A field restricted to a fixed set of string options.
    pub fn choice(name: &'static str, options: &'static [&'static str]) -> Self {
        Self {
            name,
            kind: FieldKind::Choice { options },
            required: false,
        }
    }

    /// Marks this field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Value type of a configuration field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A JSON string. Required text must be non-empty.
    Text,
    /// A JSON integer. Numeric strings are coerced; other types are
    /// hard failures.
    Integer {
        /// Inclusive lower bound, if any.
        min: Option<i64>,
        /// Inclusive upper bound, if any.
        max: Option<i64>,
    },
    /// A JSON boolean. No coercion.
    Boolean,
    /// A string drawn from a fixed option set.
    Choice {
        /// Allowed values.
        options: &'static [&'static str],
    },
}
