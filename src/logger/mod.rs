//! Injectable logging on top of `tracing`.

use crate::di::{Annotate, Annotated};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Level {
    Fatal,
    Error,
    Warn,
    Info,
    Verbose,
    Debug,
    Trace,
}

/// Logging sink the framework reports through.
///
/// The kernel resolves it from the `Logger` token, so an application can
/// swap the implementation with `Provider::replace`.
pub trait Log: Send + Sync + 'static {
    fn log(&self, level: Level, message: &str);

    /// Logger whose records are tagged with `name`.
    fn scope(&self, name: &str) -> Arc<dyn Log>;

    /// Logger whose records carry `data`.
    fn context(&self, data: serde_json::Value) -> Arc<dyn Log>;
}

impl dyn Log {
    pub fn fatal(&self, message: impl AsRef<str>) {
        self.log(Level::Fatal, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message.as_ref());
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(Level::Verbose, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message.as_ref());
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(Level::Trace, message.as_ref());
    }
}

/// Default [`Log`] implementation emitting `tracing` events.
#[derive(Debug, Clone)]
pub struct Logger {
    scope: Arc<str>,
    context: Option<serde_json::Value>,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            scope: Arc::from("core"),
            context: None,
        }
    }
}

impl Logger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Log for Logger {
    fn log(&self, level: Level, message: &str) {
        let scope = &*self.scope;
        let context = self
            .context
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();

        match level {
            Level::Fatal => {
                tracing::error!(scope = %scope, context = %context, fatal = true, "{message}")
            }
            Level::Error => tracing::error!(scope = %scope, context = %context, "{message}"),
            Level::Warn => tracing::warn!(scope = %scope, context = %context, "{message}"),
            Level::Info => tracing::info!(scope = %scope, context = %context, "{message}"),
            Level::Verbose | Level::Debug => {
                tracing::debug!(scope = %scope, context = %context, level = %level, "{message}")
            }
            Level::Trace => tracing::trace!(scope = %scope, context = %context, "{message}"),
        }
    }

    fn scope(&self, name: &str) -> Arc<dyn Log> {
        Arc::new(Self {
            scope: Arc::from(name),
            context: self.context.clone(),
        })
    }

    fn context(&self, data: serde_json::Value) -> Arc<dyn Log> {
        Arc::new(Self {
            scope: Arc::clone(&self.scope),
            context: Some(data),
        })
    }
}

impl Annotated for Logger {
    fn annotate() -> crate::Result<()> {
        Annotate::<Logger>::new()
            .implements::<dyn Log, _>(|logger| logger as Arc<dyn Log>)
            .service(|_| Ok(Logger::new()))
    }
}

/// A [`Log`] that drops every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentLogger;

impl Log for SilentLogger {
    fn log(&self, _level: Level, _message: &str) {}

    fn scope(&self, _name: &str) -> Arc<dyn Log> {
        Arc::new(SilentLogger)
    }

    fn context(&self, _data: serde_json::Value) -> Arc<dyn Log> {
        Arc::new(SilentLogger)
    }
}

impl Annotated for SilentLogger {
    fn annotate() -> crate::Result<()> {
        Annotate::<SilentLogger>::new()
            .implements::<dyn Log, _>(|logger| logger as Arc<dyn Log>)
            .service(|_| Ok(SilentLogger))
    }
}
