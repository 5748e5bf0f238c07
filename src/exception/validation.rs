use super::HttpError;
use crate::schema::{Constraint, SchemaValidationError, SchemaViolation};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Part of the request a violation was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValidationLocation {
    Body,
    Params,
    Headers,
    Query,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorItem {
    pub location: ValidationLocation,
    pub path: String,
    pub value: serde_json::Value,
    pub message: String,
    pub constraints: BTreeMap<Constraint, String>,
}

impl ValidationErrorItem {
    fn new(violation: SchemaViolation, location: ValidationLocation) -> Self {
        let message = format!(
            "\"{}\" {}",
            violation.path,
            violation
                .constraints
                .values()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        Self {
            location,
            path: violation.path,
            value: violation.value,
            message,
            constraints: violation.constraints,
        }
    }
}

/// Request input that failed its schema. Answered as
/// `400 Validation Error`; the items stay available to transformers through
/// [`HttpError::validation_errors`].
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    pub errors: Vec<ValidationErrorItem>,
}

impl ValidationError {
    /// Collects schema failures of every request part, in body, params,
    /// query, headers order.
    pub fn from_schema_errors(
        body: Option<SchemaValidationError>,
        params: Option<SchemaValidationError>,
        headers: Option<SchemaValidationError>,
        query: Option<SchemaValidationError>,
    ) -> Self {
        let errors = [
            (body, ValidationLocation::Body),
            (params, ValidationLocation::Params),
            (query, ValidationLocation::Query),
            (headers, ValidationLocation::Headers),
        ]
        .into_iter()
        .filter_map(|(err, location)| err.map(|err| (err, location)))
        .flat_map(|(err, location)| {
            err.errors
                .into_iter()
                .map(move |violation| ValidationErrorItem::new(violation, location))
        })
        .collect();

        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Validation Error")
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for HttpError {
    fn from(err: ValidationError) -> Self {
        HttpError::with_message(super::ErrorKind::BadRequest, "Validation Error")
            .named("ValidationError")
            .with_validation(err.errors)
    }
}
