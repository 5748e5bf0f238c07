//! The application: its providers, its configuration hook and its boot hook.

use crate::config::{ConfigService, DEFAULT_PORT};
use crate::di::metadata::{Metadata, keys};
use crate::di::{Annotate, Annotated, Args, Class, Provider, Token};
use crate::router::Scope;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Default request body limit, 1 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The Application trait
///
/// # Example
/// ```
/// use octavo::prelude::*;
/// use octavo::router::scope;
///
/// struct App;
///
/// #[async_trait]
/// impl Application for App {
///     async fn configure(&self, config: &mut ApplicationConfig) -> anyhow::Result<()> {
///         config.routes(scope("/", || {}));
///         config.port(8080);
///         Ok(())
///     }
/// }
///
/// impl Annotated for App {
///     fn annotate() -> octavo::Result<()> {
///         Annotate::<App>::new().application([], |_| Ok(App))
///     }
/// }
/// ```
#[async_trait]
pub trait Application: Send + Sync + 'static {
    async fn configure(&self, _config: &mut ApplicationConfig) -> anyhow::Result<()> {
        Ok(())
    }

    async fn boot(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub(crate) static PROVIDERS: Metadata<Vec<Provider>> = Metadata::new(keys::PROVIDERS, Vec::new);

/// Providers an application was annotated with.
pub fn providers(application: &Token) -> Vec<Provider> {
    PROVIDERS.get(application)
}

impl<T: Application> Annotate<T> {
    pub fn application<F>(
        self,
        providers: impl IntoIterator<Item = Provider>,
        construct: F,
    ) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        let target = self.target().clone();
        self.implements::<dyn Application, _>(|it| it as Arc<dyn Application>)
            .service_named("Application", construct)?;
        PROVIDERS.update(&target, |list| list.extend(providers));
        Ok(())
    }
}

/// Settings an application chooses while configuring.
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    routes: Option<Scope>,
    port: u16,
    powered_by: bool,
    views: Vec<PathBuf>,
    view_engines: Vec<Class>,
    body_limit: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            routes: None,
            port: DEFAULT_PORT,
            powered_by: true,
            views: Vec::new(),
            view_engines: Vec::new(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl ApplicationConfig {
    /// Defaults overridden by the environment.
    pub fn from_config(config: &ConfigService) -> Self {
        Self {
            port: config.port(),
            powered_by: config.powered_by(),
            ..Self::default()
        }
    }

    pub fn routes(&mut self, routes: Scope) -> &mut Self {
        self.routes = Some(routes);
        self
    }

    pub fn port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    /// Whether responses carry `X-Powered-By: Octavo`.
    pub fn powered_by(&mut self, show: bool) -> &mut Self {
        self.powered_by = show;
        self
    }

    /// Directories views are looked up in, in order.
    pub fn views<P: Into<PathBuf>>(&mut self, roots: impl IntoIterator<Item = P>) -> &mut Self {
        self.views = roots.into_iter().map(Into::into).collect();
        self
    }

    /// Registers a view engine next to the built-in HTML one.
    pub fn view_engine<E: Annotated>(&mut self) -> &mut Self {
        self.view_engines.push(Class::annotated::<E>());
        self
    }

    pub fn body_limit(&mut self, bytes: usize) -> &mut Self {
        self.body_limit = bytes;
        self
    }

    pub fn routes_scope(&self) -> Option<&Scope> {
        self.routes.as_ref()
    }

    pub fn port_number(&self) -> u16 {
        self.port
    }

    pub fn shows_powered_by(&self) -> bool {
        self.powered_by
    }

    pub fn view_roots(&self) -> &[PathBuf] {
        &self.views
    }

    pub fn view_engines(&self) -> &[Class] {
        &self.view_engines
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_follow_environment() {
        let service = ConfigService::from_vars([
            ("OCTAVO_PORT".to_string(), "4000".to_string()),
            ("OCTAVO_POWERED_BY".to_string(), "false".to_string()),
        ]);
        let config = ApplicationConfig::from_config(&service);

        assert_eq!(config.port_number(), 4000);
        assert!(!config.shows_powered_by());
        assert_eq!(config.body_limit_bytes(), DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn test_setters_chain() {
        let mut config = ApplicationConfig::default();
        config.port(8080).powered_by(false).views(["views", "shared"]).body_limit(10);

        assert_eq!(config.port_number(), 8080);
        assert_eq!(config.view_roots(), &[PathBuf::from("views"), PathBuf::from("shared")]);
        assert_eq!(config.body_limit_bytes(), 10);
    }

    struct Shop;

    #[async_trait]
    impl Application for Shop {}

    struct Catalog;

    impl Annotated for Catalog {
        fn annotate() -> crate::Result<()> {
            Annotate::<Catalog>::new().service(|_| Ok(Catalog))
        }
    }

    #[test]
    fn test_rejected_annotation_keeps_providers() {
        Annotate::<Shop>::new()
            .application([Provider::annotated::<Catalog>()], |_| Ok(Shop))
            .unwrap();

        let err = Annotate::<Shop>::new()
            .application(
                [Provider::annotated::<Catalog>(), Provider::annotated::<Catalog>()],
                |_| Ok(Shop),
            )
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Cannot apply @Application(), @Application() already applied"
        );
        assert_eq!(providers(&Token::of::<Shop>()).len(), 1);
    }
}
