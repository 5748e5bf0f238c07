//! # Octavo
//!
//! A web framework with annotation-driven dependency injection, a scoped
//! routing DSL and a layered request pipeline, running on axum.
//!
//! ## Features
//!
//! - **Dependency Injection**: lazily memoised services, factories and
//!   providers, overridable per application
//! - **Annotations**: builders writing into a process-wide metadata store
//!   that the injector and the router read
//! - **Scoped Routing**: nested scopes carrying middlewares, policies,
//!   formatters, transformers, error interceptors and state resolvers
//! - **Request Pipeline**: body parsing, sessions, content negotiation and
//!   error translation around the compiled routes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octavo::prelude::*;
//! use octavo::router::{get, scope};
//!
//! struct Ping;
//!
//! impl Annotated for Ping {
//!     fn annotate() -> octavo::Result<()> {
//!         Annotate::<Ping>::new()
//!             .action("ping", |_this, _ctx| async move { Ok("pong") })
//!             .controller(|_| Ok(Ping))
//!     }
//! }
//!
//! struct App;
//!
//! #[async_trait]
//! impl Application for App {
//!     async fn configure(&self, config: &mut ApplicationConfig) -> anyhow::Result<()> {
//!         config.routes(scope("/", || {
//!             get::<Ping>("/ping", "ping");
//!         }));
//!         Ok(())
//!     }
//! }
//!
//! impl Annotated for App {
//!     fn annotate() -> octavo::Result<()> {
//!         Annotate::<App>::new().application([], |_| Ok(App))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> octavo::Result<()> {
//!     bootstrap::<App>().await
//! }
//! ```

pub mod application;
pub mod config;
pub mod context;
pub mod controller;
pub mod di;
pub mod error;
pub mod error_interceptor;
pub mod exception;
pub mod formatter;
pub mod kernel;
pub mod logger;
pub mod middleware;
pub mod policy;
pub mod router;
pub mod schema;
pub mod state;
pub mod transformer;
pub mod view;

pub use error::{OctavoError, Result};
pub use kernel::{Kernel, bootstrap};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use axum;

/// Prelude module for convenient imports
///
/// ```
/// use octavo::prelude::*;
/// ```
pub mod prelude {
    pub use crate::application::{Application, ApplicationConfig};
    pub use crate::config::ConfigService;
    pub use crate::context::{
        ControllerContext, CookieOptions, MiddlewareContext, Payload, PolicyContext, SameSite,
        Session, StateContext,
    };
    pub use crate::controller::{RequestSchema, ResourceAction, ResponseSchema};
    pub use crate::di::{Annotate, Annotated, Args, Class, InjectionToken, Injector, Provider, Token};
    pub use crate::error::{OctavoError, Result};
    pub use crate::error_interceptor::{ErrorInterceptor, UnexpectedErrorInterceptor};
    pub use crate::exception::{ErrorKind, HttpError, ValidationError};
    pub use crate::formatter::{Formatter, FormatterOptions, JsonFormatter};
    pub use crate::kernel::{Kernel, bootstrap};
    pub use crate::logger::{Log, Logger, SilentLogger};
    pub use crate::middleware::{Middleware, Next, Outcome};
    pub use crate::policy::Policy;
    pub use crate::state::ResolveState;
    pub use crate::transformer::Transform;
    pub use crate::view::{HtmlViewEngine, ViewEngine};
    pub use async_trait::async_trait;
    pub use axum::http::StatusCode;
    pub use std::sync::Arc;
}
