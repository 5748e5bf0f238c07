//! The kernel: builds the injector, the route tree and the request pipeline
//! of an application, and serves it.

mod service;
mod shutdown;
mod stages;

pub use service::KernelService;
pub use shutdown::shutdown_signal;

use crate::application::{self, Application, ApplicationConfig};
use crate::config::ConfigService;
use crate::di::{Annotated, Class, Injector, Provider, Resolve, Token, annotate};
use crate::error::{OctavoError, Result};
use crate::error_interceptor::{ErrorInterceptor, UnexpectedErrorInterceptor};
use crate::formatter::JsonFormatter;
use crate::logger::{Log, Logger};
use crate::middleware::Stage;
use crate::router::RouteCompiler;
use crate::view::{HtmlViewEngine, ViewEngine, Views};
use service::Pipeline;
use stages::{
    Augment, BodyParser, CatchAll, Format, Intercept, PoweredBy, Routes, Session, StatusConvert,
    StatusFixup, Transform,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application kernel
///
/// # Example
/// ```no_run
/// use octavo::prelude::*;
///
/// struct App;
///
/// #[async_trait]
/// impl Application for App {}
///
/// impl Annotated for App {
///     fn annotate() -> octavo::Result<()> {
///         Annotate::<App>::new().application([], |_| Ok(App))
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> octavo::Result<()> {
///     let mut kernel = Kernel::new::<App>()?;
///     kernel.configure().await?.boot().await?;
///     kernel.start().await
/// }
/// ```
pub struct Kernel {
    injector: Arc<Injector>,
    logger: Arc<dyn Log>,
    application: Arc<dyn Application>,
    config: ApplicationConfig,
    pipeline: Option<Arc<Pipeline>>,
}

impl Kernel {
    /// Builds the application injector on top of a default one providing
    /// [`Logger`] and [`ConfigService`], and resolves the application.
    pub fn new<A: Application + Annotated>() -> Result<Self> {
        annotate::<A>()?;
        let token = Token::of::<A>();

        let defaults = Injector::new([
            Provider::annotated::<Logger>(),
            Provider::annotated::<ConfigService>(),
        ])?;
        let parent: Arc<dyn Resolve> = Arc::new(defaults);
        let injector = Injector::with_parent(application::providers(&token), parent)?;
        injector.load(Provider::annotated::<A>())?;

        let logger = injector
            .get_dyn::<dyn Log>(&Token::of::<Logger>())?
            .scope("Kernel");
        let application = injector.get_dyn::<dyn Application>(&token)?;
        let config = ApplicationConfig::from_config(&*injector.service::<ConfigService>()?);

        logger.debug(format!("Application {token} has been created"));
        Ok(Self {
            injector: Arc::new(injector),
            logger,
            application,
            config,
            pipeline: None,
        })
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }

    /// Runs [`Application::configure`] and compiles the routes and the
    /// request pipeline.
    pub async fn configure(&mut self) -> Result<&mut Self> {
        self.logger.debug("Application is configuring");
        self.application
            .configure(&mut self.config)
            .await
            .map_err(|err| OctavoError::Config(format!("{err:#}")))?;

        let builtins = RouteCompiler::new(&self.injector, Arc::default());
        let mut views = Views::new(self.config.view_roots().to_vec());
        views.register(builtins.resolve::<dyn ViewEngine>(&Class::annotated::<HtmlViewEngine>())?);
        for class in self.config.view_engines() {
            views.register(builtins.resolve::<dyn ViewEngine>(class)?);
        }

        let formatter = builtins.formatter(&Class::annotated::<JsonFormatter>())?;
        let unexpected = builtins
            .resolve::<dyn ErrorInterceptor>(&Class::annotated::<UnexpectedErrorInterceptor>())?;

        let root = self
            .config
            .routes_scope()
            .map(|routes| RouteCompiler::new(&self.injector, Arc::new(views)).compile(routes))
            .transpose()?;
        if root.is_none() {
            self.logger.warn("No routes configured, every request answers 404");
        }

        let mut stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(Augment {
                formatter,
                interceptors: vec![unexpected],
            }),
            Arc::new(CatchAll),
            Arc::new(BodyParser {
                limit: self.config.body_limit_bytes(),
            }),
            Arc::new(Session),
        ];
        if self.config.shows_powered_by() {
            stages.push(Arc::new(PoweredBy));
        }
        stages.push(Arc::new(Format));
        stages.push(Arc::new(Transform));
        stages.push(Arc::new(StatusFixup));
        stages.push(Arc::new(Intercept));
        stages.push(Arc::new(StatusConvert));
        stages.push(Arc::new(Routes { root }));

        self.pipeline = Some(Arc::new(Pipeline::new(stages)));
        self.logger.debug("Application has been configured");
        Ok(self)
    }

    pub async fn boot(&mut self) -> Result<&mut Self> {
        self.logger.debug("Application is booting");
        self.application
            .boot()
            .await
            .map_err(|err| OctavoError::Internal(format!("Application boot failed: {err:#}")))?;
        self.logger.debug("Application has been booted");
        Ok(self)
    }

    /// The pipeline as a tower service.
    pub fn service(&self) -> Result<KernelService> {
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| OctavoError::Internal("Kernel is not configured".to_string()))?;
        Ok(KernelService::new(Arc::clone(pipeline)))
    }

    /// An axum router answering every request through the pipeline.
    pub fn router(&self) -> Result<axum::Router> {
        Ok(axum::Router::new()
            .fallback_service(self.service()?)
            .layer(TraceLayer::new_for_http()))
    }

    /// Serves on `0.0.0.0:<port>` until Ctrl+C or SIGTERM.
    pub async fn start(&self) -> Result<()> {
        let router = self.router()?;
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port_number()));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        self.logger.info(format!("Application is listening on {addr}"));
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        self.logger.info("Application has been stopped");
        Ok(())
    }
}

/// Creates, configures, boots and serves the application `A`.
pub async fn bootstrap<A: Application + Annotated>() -> Result<()> {
    let mut kernel = Kernel::new::<A>()?;
    kernel.configure().await?.boot().await?;
    kernel.start().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::Annotate;
    use crate::router::{get, scope};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    struct Ping;

    impl Annotated for Ping {
        fn annotate() -> Result<()> {
            Annotate::<Ping>::new()
                .action("ping", |_this: Arc<Ping>, _ctx| async move { anyhow::Ok("pong") })
                .controller(|_| Ok(Ping))
        }
    }

    #[derive(Default)]
    struct App {
        booted: AtomicBool,
    }

    #[async_trait::async_trait]
    impl Application for App {
        async fn configure(&self, config: &mut ApplicationConfig) -> anyhow::Result<()> {
            config.routes(scope("/", || {
                get::<Ping>("/ping", "ping");
            }));
            config.powered_by(false);
            Ok(())
        }

        async fn boot(&self) -> anyhow::Result<()> {
            self.booted.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Annotated for App {
        fn annotate() -> Result<()> {
            Annotate::<App>::new().application([], |_| Ok(App::default()))
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl Application for Broken {
        async fn configure(&self, _config: &mut ApplicationConfig) -> anyhow::Result<()> {
            anyhow::bail!("missing database url")
        }
    }

    impl Annotated for Broken {
        fn annotate() -> Result<()> {
            Annotate::<Broken>::new().application([], |_| Ok(Broken))
        }
    }

    #[tokio::test]
    async fn test_router_requires_configure() {
        let kernel = Kernel::new::<App>().unwrap();
        assert!(kernel.router().is_err());
    }

    #[tokio::test]
    async fn test_configured_kernel_serves_routes() {
        let mut kernel = Kernel::new::<App>().unwrap();
        kernel.configure().await.unwrap().boot().await.unwrap();

        let app = kernel.injector().service::<App>().unwrap();
        assert!(app.booted.load(Ordering::SeqCst));

        let response = kernel
            .router()
            .unwrap()
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-powered-by").is_none());
    }

    #[tokio::test]
    async fn test_configure_errors_are_reported() {
        let mut kernel = Kernel::new::<Broken>().unwrap();
        let err = kernel.configure().await.err().unwrap();

        assert_eq!(err.to_string(), "Configuration failed: missing database url");
    }
}
