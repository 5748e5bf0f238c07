use super::dispatch::{CompiledHandler, CompiledScope};
use super::path::Pattern;
use super::scope::{Handler, Scope};
use crate::controller::{ACTIONS, REQUEST, RESPONSE};
use crate::di::{Class, Injector, Provider};
use crate::error::{OctavoError, Result};
use crate::error_interceptor::ErrorInterceptor;
use crate::formatter::{Formatter, FormatterEntry, formatter_options};
use crate::middleware::{Middleware, MiddlewareStage, Stage};
use crate::policy::{Policy, PolicyStage};
use crate::state::ResolveState;
use crate::transformer::Transform;
use crate::view::{VIEW, Views};
use std::sync::Arc;

/// Resolves every type a route tree references and builds its dispatcher.
pub(crate) struct RouteCompiler<'a> {
    injector: &'a Injector,
    views: Arc<Views>,
}

impl<'a> RouteCompiler<'a> {
    pub(crate) fn new(injector: &'a Injector, views: Arc<Views>) -> Self {
        Self { injector, views }
    }

    pub(crate) fn compile(&self, scope: &Scope) -> Result<Arc<CompiledScope>> {
        let mut stages: Vec<Arc<dyn Stage>> = Vec::new();
        for class in scope.middlewares() {
            let middleware = self.resolve::<dyn Middleware>(class)?;
            stages.push(Arc::new(MiddlewareStage(middleware)));
        }
        for class in scope.policies() {
            let policy = self.resolve::<dyn Policy>(class)?;
            stages.push(Arc::new(PolicyStage(policy)));
        }

        let formatters = scope
            .formatters()
            .iter()
            .map(|class| self.formatter(class))
            .collect::<Result<Vec<_>>>()?;
        let interceptors = scope
            .error_interceptors()
            .iter()
            .map(|class| self.resolve::<dyn ErrorInterceptor>(class))
            .collect::<Result<Vec<_>>>()?;
        let states = scope
            .states()
            .iter()
            .map(|(name, class)| Ok::<_, OctavoError>((name.clone(), self.resolve::<dyn ResolveState>(class)?)))
            .collect::<Result<Vec<_>>>()?;
        let transformer = scope
            .transformer_class()
            .map(|class| self.resolve::<dyn Transform>(class))
            .transpose()?;

        let handler = scope
            .handler()
            .map(|handler| self.handler(scope.path(), handler))
            .transpose()?;
        let children = scope
            .children()
            .iter()
            .map(|child| self.compile(child))
            .collect::<Result<Vec<_>>>()?;

        Ok(Arc::new(CompiledScope {
            pattern: Pattern::parse(scope.path()),
            handler,
            stages,
            formatters,
            interceptors,
            states,
            transformer,
            children,
        }))
    }

    /// Loads `class` unless the injector already provides it.
    fn ensure(&self, class: &Class) -> Result<()> {
        if !self.injector.contains(class.token()) {
            self.injector.load(Provider::from(class.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn resolve<D: ?Sized + 'static>(&self, class: &Class) -> Result<Arc<D>> {
        self.ensure(class)?;
        self.injector.get_dyn::<D>(class.token())
    }

    pub(crate) fn formatter(&self, class: &Class) -> Result<FormatterEntry> {
        let formatter = self.resolve::<dyn Formatter>(class)?;
        class.prepare()?;
        let options = formatter_options(class.token()).ok_or_else(|| OctavoError::MissingAnnotation {
            provider: class.token().to_string(),
        })?;
        Ok(FormatterEntry::new(options, formatter))
    }

    fn handler(&self, path: &str, handler: &Handler) -> Result<CompiledHandler> {
        let class = &handler.controller;
        self.ensure(class)?;

        let token = class.token();
        let action = ACTIONS.get_member(token, &handler.key).ok_or_else(|| OctavoError::MissingAction {
            controller: token.to_string(),
            action: handler.key.clone(),
        })?;

        tracing::trace!(controller = %token, action = %handler.key, path = %path, "compiling route");
        Ok(CompiledHandler {
            name: format!("{token}#{}", handler.key),
            verb: handler.verb.clone(),
            status: handler.status,
            controller: self.injector.get(token)?,
            action,
            request: REQUEST.get_member(token, &handler.key),
            response: RESPONSE.get_member(token, &handler.key),
            view: VIEW.get_member(token, &handler.key),
            views: Arc::clone(&self.views),
        })
    }
}
