//! Widget configuration validation and normalization.
//!
//! Validation is a single pass over the widget type's schema that collects
//! every violation, so a form layer can display all field errors together
//! rather than one at a time.
//!
//! Normalization rules:
//! - Numeric strings are coerced to integers for fields declared
//!   [`FieldKind::Integer`]; all other type mismatches are hard failures.
//! - Fields not named by the schema are dropped silently (forward
//!   compatibility with configs written by newer clients).
//! - Missing optional fields are filled from the widget's default config.
//! - Missing required fields, and empty required text, are violations.

use serde_json::Value;

use crate::catalog::schema::FieldKind;
use crate::catalog::WidgetDescriptor;
use crate::{ConfigMap, FieldError};

/// Validates `raw` against `descriptor`'s schema and returns the
/// normalized configuration.
///
/// # Errors
///
/// Returns every field violation found, never just the first.
pub fn validate(descriptor: &WidgetDescriptor, raw: &ConfigMap) -> Result<ConfigMap, Vec<FieldError>> {
    let mut normalized = ConfigMap::new();
    let mut errors = Vec::new();

    for field in &descriptor.schema.fields {
        match raw.get(field.name) {
            None => {
                if field.required {
                    errors.push(FieldError::new(field.name, "is required"));
                } else if let Some(default) = descriptor.default_config.get(field.name) {
                    normalized.insert(field.name.to_string(), default.clone());
                }
            }
            Some(value) => match normalize_value(field.name, &field.kind, field.required, value) {
                Ok(value) => {
                    normalized.insert(field.name.to_string(), value);
                }
                Err(error) => errors.push(error),
            },
        }
    }

    if errors.is_empty() {
        Ok(normalized)
    } else {
        Err(errors)
    }
}

fn normalize_value(
    name: &str,
    kind: &FieldKind,
    required: bool,
    value: &Value,
) -> Result<Value, FieldError> {
    match kind {
        FieldKind::Text => match value {
            Value::String(s) => {
                if required && s.trim().is_empty() {
                    Err(FieldError::new(name, "must not be empty"))
                } else {
                    Ok(value.clone())
                }
            }
            _ => Err(FieldError::new(name, "expected text")),
        },
        FieldKind::Integer { min, max } => {
            let parsed = match value {
                Value::Number(n) => n.as_i64().ok_or(()),
                // Form layers submit numeric fields as strings.
                Value::String(s) => s.trim().parse::<i64>().map_err(|_| ()),
                _ => Err(()),
            };
            match parsed {
                Ok(n) => check_range(name, n, *min, *max),
                Err(()) => Err(FieldError::new(name, "expected an integer")),
            }
        }
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(FieldError::new(name, "expected true or false")),
        },
        FieldKind::Choice { options } => match value {
            Value::String(s) if options.contains(&s.as_str()) => Ok(value.clone()),
            _ => Err(FieldError::new(
                name,
                format!("must be one of: {}", options.join(", ")),
            )),
        },
    }
}

fn check_range(
    name: &str,
    value: i64,
    min: Option<i64>,
    max: Option<i64>,
) -> Result<Value, FieldError> {
    if let Some(min) = min {
        if value < min {
            return Err(FieldError::new(name, format!("must be at least {min}")));
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(FieldError::new(name, format!("must be at most {max}")));
        }
    }
    Ok(Value::from(value))
}
