//! Declarative JSON schemas for request and response validation.
//!
//! Validation is lenient about representation and strict about shape:
//! numeric and boolean strings are converted, unknown object keys are
//! stripped, every key is required unless marked optional, and all
//! violations are collected before failing.
//!
//! ```
//! use octavo::schema::{number, object, string};
//! use serde_json::json;
//!
//! let schema = object([("id", number()), ("title", string())]);
//! let value = schema.validate(&json!({"id": "10", "title": "Dune", "year": 1965})).unwrap();
//!
//! assert_eq!(value, json!({"id": 10, "title": "Dune"}));
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Constraint {
    Type,
    Required,
    Other,
}

/// One failed check.
#[derive(Debug, Clone, Serialize)]
pub struct SchemaViolation {
    /// Location inside the validated value, e.g. `.books[2].title`.
    pub path: String,
    /// The offending value, `null` when missing.
    pub value: Value,
    pub constraints: BTreeMap<Constraint, String>,
}

#[derive(Debug, Clone, Error)]
#[error("Validation error")]
pub struct SchemaValidationError {
    pub errors: Vec<SchemaViolation>,
}

#[derive(Debug, Clone)]
enum Kind {
    Object(Option<Vec<(String, Schema)>>),
    Array(Option<Vec<Schema>>),
    String,
    Number,
    Boolean,
    Slot,
}

#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    optional: bool,
    default: Option<Value>,
}

/// Object with the given keys; other keys are stripped.
pub fn object<'a>(keys: impl IntoIterator<Item = (&'a str, Schema)>) -> Schema {
    let keys = keys
        .into_iter()
        .map(|(key, schema)| (key.to_string(), schema))
        .collect();
    Schema::new(Kind::Object(Some(keys)))
}

/// Any object, kept as is.
pub fn any_object() -> Schema {
    Schema::new(Kind::Object(None))
}

/// Array whose items match one of `items`.
pub fn array(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::new(Kind::Array(Some(items.into_iter().collect())))
}

/// Any array, kept as is.
pub fn any_array() -> Schema {
    Schema::new(Kind::Array(None))
}

pub fn string() -> Schema {
    Schema::new(Kind::String)
}

pub fn number() -> Schema {
    Schema::new(Kind::Number)
}

pub fn boolean() -> Schema {
    Schema::new(Kind::Boolean)
}

/// Any value.
pub fn slot() -> Schema {
    Schema::new(Kind::Slot)
}

impl Schema {
    fn new(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Value used when the key is missing.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Validates `value`, returning the converted and stripped value.
    pub fn validate(&self, value: &Value) -> Result<Value, SchemaValidationError> {
        let mut errors = Vec::new();
        let validated = self.check(Some(value), "", &mut errors);

        if errors.is_empty() {
            Ok(validated.unwrap_or(Value::Null))
        } else {
            Err(SchemaValidationError { errors })
        }
    }

    fn check(&self, value: Option<&Value>, path: &str, errors: &mut Vec<SchemaViolation>) -> Option<Value> {
        let Some(value) = value else {
            if let Some(default) = &self.default {
                return Some(default.clone());
            }
            if !self.optional {
                errors.push(violation(path, Value::Null, Constraint::Required, "is required"));
            }
            return None;
        };

        match &self.kind {
            Kind::Object(keys) => {
                let Some(object) = value.as_object() else {
                    errors.push(violation(path, value.clone(), Constraint::Type, "must be an object"));
                    return None;
                };
                let Some(keys) = keys else {
                    return Some(value.clone());
                };

                let mut out = Map::new();
                for (key, schema) in keys {
                    let child = format!("{path}.{key}");
                    if let Some(checked) = schema.check(object.get(key), &child, errors) {
                        out.insert(key.clone(), checked);
                    }
                }
                Some(Value::Object(out))
            }
            Kind::Array(items) => {
                let Some(array) = value.as_array() else {
                    errors.push(violation(path, value.clone(), Constraint::Type, "must be an array"));
                    return None;
                };
                let Some(items) = items else {
                    return Some(value.clone());
                };

                let mut out = Vec::with_capacity(array.len());
                for (index, item) in array.iter().enumerate() {
                    let child = format!("{path}[{index}]");
                    if let Some(checked) = check_alternatives(items, item, &child, errors) {
                        out.push(checked);
                    }
                }
                Some(Value::Array(out))
            }
            Kind::String => match value {
                Value::String(text) if text.is_empty() => {
                    errors.push(violation(path, value.clone(), Constraint::Other, "is not allowed to be empty"));
                    None
                }
                Value::String(_) => Some(value.clone()),
                _ => {
                    errors.push(violation(path, value.clone(), Constraint::Type, "must be a string"));
                    None
                }
            },
            Kind::Number => match value {
                Value::Number(_) => Some(value.clone()),
                Value::String(text) => match parse_number(text) {
                    Some(number) => Some(number),
                    None => {
                        errors.push(violation(path, value.clone(), Constraint::Type, "must be a number"));
                        None
                    }
                },
                _ => {
                    errors.push(violation(path, value.clone(), Constraint::Type, "must be a number"));
                    None
                }
            },
            Kind::Boolean => match value {
                Value::Bool(_) => Some(value.clone()),
                Value::String(text) if text.eq_ignore_ascii_case("true") => Some(Value::Bool(true)),
                Value::String(text) if text.eq_ignore_ascii_case("false") => Some(Value::Bool(false)),
                _ => {
                    errors.push(violation(path, value.clone(), Constraint::Type, "must be a boolean"));
                    None
                }
            },
            Kind::Slot => Some(value.clone()),
        }
    }
}

fn check_alternatives(
    items: &[Schema],
    item: &Value,
    path: &str,
    errors: &mut Vec<SchemaViolation>,
) -> Option<Value> {
    if let [only] = items {
        return only.check(Some(item), path, errors);
    }

    for schema in items {
        let mut scratch = Vec::new();
        if let Some(checked) = schema.check(Some(item), path, &mut scratch) {
            if scratch.is_empty() {
                return Some(checked);
            }
        }
    }

    errors.push(violation(
        path,
        item.clone(),
        Constraint::Other,
        "does not match any of the allowed types",
    ));
    None
}

fn parse_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if let Ok(integer) = text.parse::<i64>() {
        return Some(Value::from(integer));
    }
    let float = text.parse::<f64>().ok()?;
    serde_json::Number::from_f64(float).map(Value::Number)
}

fn violation(path: &str, value: Value, constraint: Constraint, message: &str) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        value,
        constraints: BTreeMap::from([(constraint, message.to_string())]),
    }
}
