use super::path::normalize_path;
use crate::di::Class;
use axum::http::{Method, StatusCode};

/// Methods a handler answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    All,
    Only(Method),
}

impl Verb {
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Verb::All => true,
            Verb::Only(expected) => expected == method,
        }
    }
}

/// Route endpoint: an action of a controller.
#[derive(Debug, Clone)]
pub struct Handler {
    pub verb: Verb,
    pub status: StatusCode,
    pub controller: Class,
    pub key: String,
}

/// Node of the route tree.
///
/// Everything attached to a scope applies to every route below its path.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    path: String,
    handler: Option<Handler>,
    middlewares: Vec<Class>,
    policies: Vec<Class>,
    formatters: Vec<Class>,
    interceptors: Vec<Class>,
    states: Vec<(String, Class)>,
    transformer: Option<Class>,
    children: Vec<Scope>,
}

impl Scope {
    pub fn new(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            ..Self::default()
        }
    }

    pub fn with_handler(mut self, handler: Handler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn middleware(mut self, class: Class) -> Self {
        self.middlewares.push(class);
        self
    }

    pub fn policy(mut self, class: Class) -> Self {
        self.policies.push(class);
        self
    }

    pub fn formatter(mut self, class: Class) -> Self {
        self.formatters.push(class);
        self
    }

    pub fn error_interceptor(mut self, class: Class) -> Self {
        self.interceptors.push(class);
        self
    }

    pub fn state(mut self, name: &str, class: Class) -> Self {
        self.states.push((name.to_string(), class));
        self
    }

    /// Sets the transformer; a later one replaces it.
    pub fn transformer(mut self, class: Class) -> Self {
        self.transformer = Some(class);
        self
    }

    pub fn child(mut self, scope: Scope) -> Self {
        self.children.push(scope);
        self
    }

    pub fn path(&self) -> &str {
        if self.path.is_empty() { "/" } else { &self.path }
    }

    pub fn handler(&self) -> Option<&Handler> {
        self.handler.as_ref()
    }

    pub fn middlewares(&self) -> &[Class] {
        &self.middlewares
    }

    pub fn policies(&self) -> &[Class] {
        &self.policies
    }

    pub fn formatters(&self) -> &[Class] {
        &self.formatters
    }

    pub fn error_interceptors(&self) -> &[Class] {
        &self.interceptors
    }

    pub fn states(&self) -> &[(String, Class)] {
        &self.states
    }

    pub fn transformer_class(&self) -> Option<&Class> {
        self.transformer.as_ref()
    }

    pub fn children(&self) -> &[Scope] {
        &self.children
    }

    pub(crate) fn add_child(&mut self, scope: Scope) {
        self.children.push(scope);
    }

    pub(crate) fn set_handler(&mut self, handler: Handler) {
        self.handler = Some(handler);
    }

    pub(crate) fn push_middleware(&mut self, class: Class) {
        self.middlewares.push(class);
    }

    pub(crate) fn push_policy(&mut self, class: Class) {
        self.policies.push(class);
    }

    pub(crate) fn push_formatter(&mut self, class: Class) {
        self.formatters.push(class);
    }

    pub(crate) fn push_error_interceptor(&mut self, class: Class) {
        self.interceptors.push(class);
    }

    pub(crate) fn push_state(&mut self, name: &str, class: Class) {
        self.states.push((name.to_string(), class));
    }

    pub(crate) fn set_transformer(&mut self, class: Class) {
        self.transformer = Some(class);
    }
}
