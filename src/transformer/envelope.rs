use super::Transform;
use crate::di::{Annotate, Annotated};
use crate::exception::{HttpError, ValidationErrorItem};
use serde::Serialize;
use serde_json::Value;

/// Standard API envelope
///
/// Wraps successful payloads as `{"success": true, "data": ...}` and renders
/// errors as `{"success": false, "error": {"code": ..., "message": ...}}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiEnvelope;

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<EnvelopeError<'a>>,
}

#[derive(Debug, Serialize)]
pub struct EnvelopeError<'a> {
    /// Name of the error, e.g. `NotFound`.
    pub code: &'a str,
    pub message: &'a str,

    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub errors: &'a [ValidationErrorItem],
}

impl Transform for ApiEnvelope {
    fn success(&self, data: Value) -> Value {
        let envelope = Envelope {
            success: true,
            data: Some(data),
            error: None,
        };
        serde_json::to_value(envelope).unwrap_or(Value::Null)
    }

    fn error(&self, err: &HttpError) -> Option<Value> {
        let envelope = Envelope {
            success: false,
            data: None,
            error: Some(EnvelopeError {
                code: err.name(),
                message: err.message(),
                errors: err.validation_errors(),
            }),
        };
        serde_json::to_value(envelope).ok()
    }
}

impl Annotated for ApiEnvelope {
    fn annotate() -> crate::Result<()> {
        Annotate::<ApiEnvelope>::new().transformer(|_| Ok(ApiEnvelope))
    }
}
