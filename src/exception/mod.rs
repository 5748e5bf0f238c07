//! HTTP errors raised while handling a request.

mod status;
mod validation;

pub use status::{ErrorKind, reason_phrase};
pub use validation::{ValidationError, ValidationErrorItem, ValidationLocation};

use axum::http::StatusCode;
use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

/// Range violations when building an [`HttpError`] from a raw status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    #[error("Status codes must be in range 1xx-5xx")]
    OutOfRange(u16),

    #[error("Status codes must be 4xx")]
    NotClientError(u16),

    #[error("Status codes must be 5xx")]
    NotServerError(u16),

    #[error("Unexpected status {0}")]
    Unexpected(u16),
}

/// An error that answers a request with its status.
///
/// The catch-all stage renders it as `text/plain` with the message as body;
/// transformers may render it differently.
///
/// # Example
/// ```
/// use octavo::exception::{ErrorKind, HttpError};
///
/// let err = HttpError::with_message(ErrorKind::NotFound, "Book is not found").named("BookIsNotFound");
/// assert_eq!(err.status(), 404);
/// assert_eq!(err.name(), "BookIsNotFound");
/// assert_eq!(err.to_string(), "Book is not found");
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    status: u16,
    kind: Option<ErrorKind>,
    name: Cow<'static, str>,
    message: Cow<'static, str>,
    validation: Arc<[ValidationErrorItem]>,
}

impl HttpError {
    /// Error of a named kind with its reason phrase as message.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            status: kind.status(),
            kind: Some(kind),
            name: Cow::Borrowed(kind.into()),
            message: Cow::Borrowed(kind.reason()),
            validation: Arc::from([]),
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(kind)
        }
    }

    /// Error of the named kind registered for `status`.
    pub fn from_status(status: u16) -> Result<Self, StatusError> {
        match ErrorKind::from_status(status) {
            Some(kind) => Ok(Self::new(kind)),
            None if (100..600).contains(&status) => Err(StatusError::Unexpected(status)),
            None => Err(StatusError::OutOfRange(status)),
        }
    }

    /// Error with an arbitrary 1xx-5xx status.
    pub fn custom(status: u16, message: impl Into<Cow<'static, str>>) -> Result<Self, StatusError> {
        if !(100..600).contains(&status) {
            return Err(StatusError::OutOfRange(status));
        }

        Ok(Self {
            status,
            kind: ErrorKind::from_status(status),
            name: Cow::Borrowed("HttpError"),
            message: message.into(),
            validation: Arc::from([]),
        })
    }

    /// 4xx error with a custom message.
    pub fn client(status: u16, message: impl Into<Cow<'static, str>>) -> Result<Self, StatusError> {
        if !(400..500).contains(&status) {
            return Err(StatusError::NotClientError(status));
        }
        Self::custom(status, message).map(|err| err.named("ClientError"))
    }

    /// 5xx error with a custom message.
    pub fn server(status: u16, message: impl Into<Cow<'static, str>>) -> Result<Self, StatusError> {
        if !(500..600).contains(&status) {
            return Err(StatusError::NotServerError(status));
        }
        Self::custom(status, message).map(|err| err.named("ServerError"))
    }

    /// Renames the error, the way a subclass of a named error would.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    pub(crate) fn with_validation(mut self, items: Vec<ValidationErrorItem>) -> Self {
        self.validation = Arc::from(items);
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Violations carried by a validation error, empty otherwise.
    pub fn validation_errors(&self) -> &[ValidationErrorItem] {
        &self.validation
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// The `HttpError` an arbitrary pipeline error is answered with:
/// the error itself when it is one, `500 Internal Server Error` otherwise.
pub fn to_http_error(err: &anyhow::Error) -> HttpError {
    err.downcast_ref::<HttpError>()
        .cloned()
        .unwrap_or_else(HttpError::internal_server_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_named_kinds_use_reason_phrase() {
        let err = HttpError::not_found();
        assert_eq!(err.status(), 404);
        assert_eq!(err.name(), "NotFound");
        assert_eq!(err.message(), "Not Found");

        let err = HttpError::http_version_not_supported();
        assert_eq!(err.name(), "HttpVersionNotSupported");
        assert_eq!(err.message(), "HTTP Version Not Supported");
    }

    #[test]
    fn test_every_kind_is_client_or_server_error() {
        for kind in ErrorKind::iter() {
            let err = HttpError::new(kind);
            assert!(err.is_client_error() ^ err.is_server_error(), "{kind}");
            assert_eq!(ErrorKind::from_status(kind.status()), Some(kind));
        }
    }

    #[test]
    fn test_status_ranges() {
        assert_eq!(
            HttpError::custom(600, "nope").unwrap_err().to_string(),
            "Status codes must be in range 1xx-5xx"
        );
        assert_eq!(
            HttpError::client(500, "nope").unwrap_err().to_string(),
            "Status codes must be 4xx"
        );
        assert_eq!(
            HttpError::server(404, "nope").unwrap_err().to_string(),
            "Status codes must be 5xx"
        );
        assert_eq!(HttpError::custom(302, "Moved").unwrap().status(), 302);
        assert_eq!(HttpError::from_status(418).unwrap_err(), StatusError::Unexpected(418));
    }

    #[test]
    fn test_non_http_errors_become_internal() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(to_http_error(&err).status(), 500);

        let err = anyhow::Error::from(HttpError::forbidden());
        assert_eq!(to_http_error(&err).name(), "Forbidden");
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(reason_phrase(201), Some("Created"));
        assert_eq!(reason_phrase(451), Some("Unavailable For Legal Reasons"));
        assert_eq!(reason_phrase(299), None);
    }
}
