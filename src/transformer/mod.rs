//! Response transformers: reshape successful payloads and render errors.

mod envelope;

pub use envelope::{ApiEnvelope, EnvelopeError};

use crate::di::{Annotate, Args};
use crate::exception::HttpError;
use serde_json::Value;
use std::sync::Arc;

/// The Transform trait
///
/// The transformer of the innermost matched scope sees every successful
/// payload and every error of the request. Returning `None` from
/// [`error`](Transform::error) leaves the error to the stages above.
pub trait Transform: Send + Sync + 'static {
    fn success(&self, data: Value) -> Value {
        data
    }

    fn error(&self, _err: &HttpError) -> Option<Value> {
        None
    }
}

impl<T: Transform> Annotate<T> {
    pub fn transformer<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn Transform, _>(|it| it as Arc<dyn Transform>)
            .service_named("Transformer", construct)
    }
}
