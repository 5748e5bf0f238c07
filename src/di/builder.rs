use super::annotate::Annotated;
use super::injector::{Injector, NullInjector, Resolve};
use super::provider::Provider;
use super::token::Token;
use crate::error::Result;
use std::sync::Arc;

/// Builder for an [`Injector`].
///
/// Collects providers and an optional parent before loading them in
/// registration order, so later providers win over earlier ones.
///
/// # Example
/// ```
/// use octavo::di::{Annotate, Annotated, InjectorBuilder};
///
/// struct Clock;
///
/// impl Annotated for Clock {
///     fn annotate() -> octavo::Result<()> {
///         Annotate::<Clock>::new().service(|_| Ok(Clock))
///     }
/// }
///
/// let injector = InjectorBuilder::new().provide::<Clock>().build().unwrap();
/// assert!(injector.service::<Clock>().is_ok());
/// ```
pub struct InjectorBuilder {
    providers: Vec<Provider>,
    parent: Arc<dyn Resolve>,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            parent: Arc::new(NullInjector),
        }
    }

    /// Register an annotated type under its own token
    pub fn provide<T: Annotated>(mut self) -> Self {
        self.providers.push(Provider::annotated::<T>());
        self
    }

    /// Provide `U` wherever `I` is requested
    pub fn replace<U: Annotated, I: Annotated>(mut self) -> Self {
        self.providers.push(Provider::replace::<U, I>());
        self
    }

    /// Bind a ready value to a token
    pub fn value<T: Send + Sync + 'static>(mut self, token: Token, value: T) -> Self {
        self.providers.push(Provider::value(token, value));
        self
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn providers(mut self, providers: impl IntoIterator<Item = Provider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Resolve unknown tokens through `parent`
    pub fn parent(mut self, parent: Arc<dyn Resolve>) -> Self {
        self.parent = parent;
        self
    }

    /// Build the injector
    ///
    /// # Errors
    /// Fails when a provider is not annotated or an override pairs
    /// incompatible injection kinds.
    pub fn build(self) -> Result<Injector> {
        Injector::with_parent(self.providers, self.parent)
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
