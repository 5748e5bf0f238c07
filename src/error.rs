use crate::di::InjectionKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OctavoError>;

/// Errors raised while annotating types, loading providers, resolving
/// dependencies and bootstrapping the kernel.
///
/// Request-time failures are [`HttpError`](crate::exception::HttpError)s
/// instead; an `OctavoError` that escapes into a request is answered with
/// `500 Internal Server Error`.
#[derive(Debug, Clone, Error)]
pub enum OctavoError {
    #[error("No provider for {token}!")]
    NoProvider { token: String },

    #[error("Missed required annotation on {provider} provider")]
    MissingAnnotation { provider: String },

    #[error("Missed required annotation on overridden {token} provider")]
    MissingOverriddenAnnotation { token: String },

    #[error("Cannot override {token} provider, {provider_kind} and {token_kind} types are not compatible")]
    IncompatibleOverride {
        token: String,
        provider_kind: InjectionKind,
        token_kind: InjectionKind,
    },

    #[error("Cannot apply @{annotation}(), @{applied}() already applied")]
    AlreadyApplied { annotation: String, applied: String },

    #[error("Missed annotation for {index} param in {target} constructor")]
    MissedParamAnnotation { index: usize, target: String },

    #[error("Missing argument {index} for {target} constructor")]
    MissingArgument { index: usize, target: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("Controller {controller} has no action `{action}`")]
    MissingAction { controller: String, action: String },

    #[error("Configuration failed: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for OctavoError {
    fn from(err: std::io::Error) -> Self {
        OctavoError::Server(err.to_string())
    }
}
