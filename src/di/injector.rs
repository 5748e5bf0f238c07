use super::annotate::{
    Args, BLUEPRINT, Blueprint, CONSTRUCTOR_INJECTIONS, INJECTION_KIND, PROPERTY_INJECTIONS,
    PropertyInjection, Provide,
};
use super::factory::{Factory, Statics};
use super::provider::{Class, Provider};
use super::token::{InjectionToken, Token};
use super::value::Value;
use crate::error::{OctavoError, Result};
use dashmap::DashMap;
use std::cell::RefCell;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Something tokens can be resolved against. Injectors chain to a parent
/// `Resolve` when they have no record for a token.
pub trait Resolve: Send + Sync {
    fn resolve(&self, token: &Token) -> Result<Value>;
}

/// End of every parent chain: knows no token.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInjector;

impl Resolve for NullInjector {
    fn resolve(&self, token: &Token) -> Result<Value> {
        Err(OctavoError::NoProvider {
            token: token.to_string(),
        })
    }
}

type Resolver = Arc<dyn Fn(&Injector) -> Result<Value> + Send + Sync>;

/// Lazily resolved, memoised registration of one token.
struct Record {
    resolver: Resolver,
    value: Mutex<Option<Value>>,
}

impl Record {
    fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            value: Mutex::new(None),
        }
    }

    fn resolved(value: Value) -> Self {
        Self {
            resolver: Arc::new(|_: &Injector| {
                Err(OctavoError::Internal("value record re-resolved".into()))
            }),
            value: Mutex::new(Some(value)),
        }
    }

    /// The lock is not held while dependencies resolve, so threads racing on
    /// a cycle each fail on their own stack. Racing first uses may both
    /// build; the first stored value is the one every caller gets.
    fn resolve(&self, injector: &Injector) -> Result<Value> {
        if let Some(value) = self.lock().as_ref() {
            return Ok(value.clone());
        }

        let value = (self.resolver)(injector)?;
        Ok(self.lock().get_or_insert(value).clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Value>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

thread_local! {
    static RESOLVING: RefCell<Vec<Token>> = const { RefCell::new(Vec::new()) };
}

/// Marks a token as being resolved on this thread for the guard's lifetime.
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(token: &Token) -> Result<Self> {
        RESOLVING.with_borrow_mut(|stack| {
            if let Some(start) = stack.iter().position(|entry| entry == token) {
                let cycle = stack[start..]
                    .iter()
                    .chain(std::iter::once(token))
                    .map(Token::to_string)
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(OctavoError::CircularDependency { cycle });
            }
            stack.push(token.clone());
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

/// Dependency injector.
///
/// Providers are registered up front or through [`load`](Self::load);
/// nothing is built until a token is requested. Each token resolves at most
/// once per injector, tokens this injector has no record for are delegated to
/// the parent.
pub struct Injector {
    records: DashMap<Token, Arc<Record>>,
    parent: Arc<dyn Resolve>,
}

impl Injector {
    pub fn new(providers: impl IntoIterator<Item = Provider>) -> Result<Self> {
        Self::with_parent(providers, Arc::new(NullInjector))
    }

    pub fn with_parent(
        providers: impl IntoIterator<Item = Provider>,
        parent: Arc<dyn Resolve>,
    ) -> Result<Self> {
        let injector = Self {
            records: DashMap::new(),
            parent,
        };
        for provider in providers {
            injector.load(provider)?;
        }
        Ok(injector)
    }

    /// Registers a provider. A later registration of the same token replaces
    /// the earlier one.
    pub fn load(&self, provider: Provider) -> Result<&Self> {
        match provider {
            Provider::Class(class) => self.load_type(&class, &class)?,
            Provider::Replace {
                use_class,
                instead_of,
            } => self.load_type(&use_class, &instead_of)?,
            Provider::Value { token, value } => {
                tracing::trace!(token = %token, "registering value provider");
                self.records.insert(token, Arc::new(Record::resolved(value)));
            }
        }
        Ok(self)
    }

    /// Resolves `token`, building it and its dependencies on first use.
    pub fn get(&self, token: &Token) -> Result<Value> {
        let record = self
            .records
            .get(token)
            .map(|entry| Arc::clone(entry.value()));

        match record {
            Some(record) => {
                let _guard = ResolutionGuard::enter(token)?;
                record.resolve(self)
            }
            None => self.parent.resolve(token),
        }
    }

    pub fn get_as<T: Send + Sync + 'static>(&self, token: &Token) -> Result<Arc<T>> {
        self.get(token)?.downcast_or_fail::<T>()
    }

    /// Resolves `token` as a trait object registered with
    /// [`Annotate::implements`](super::Annotate::implements).
    pub fn get_dyn<D: ?Sized + 'static>(&self, token: &Token) -> Result<Arc<D>> {
        self.get(token)?.cast_or_fail::<D>()
    }

    pub fn get_token<T: Send + Sync + 'static>(&self, token: &InjectionToken<T>) -> Result<Arc<T>> {
        self.get_as::<T>(&token.token())
    }

    /// Instance of a service registered under its own type.
    pub fn service<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.get_as::<T>(&Token::of::<T>())
    }

    /// Handle of a factory registered under its own type.
    pub fn factory<T: 'static>(&self) -> Result<Arc<Factory<T>>> {
        self.get_as::<Factory<T>>(&Token::of::<T>())
    }

    /// Value produced by the provider `P`.
    pub fn provided<P: Provide>(&self) -> Result<Arc<P::Output>> {
        self.get_as::<P::Output>(&Token::of::<P>())
    }

    /// Whether this injector (not its parents) has a record for `token`.
    pub fn contains(&self, token: &Token) -> bool {
        self.records.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn load_type(&self, provider: &Class, target: &Class) -> Result<()> {
        provider.prepare()?;
        if target.token() != provider.token() {
            target.prepare()?;
        }

        let provider_token = provider.token();
        let token = target.token();

        let provider_kind = INJECTION_KIND.get(provider_token).ok_or_else(|| {
            OctavoError::MissingAnnotation {
                provider: provider_token.to_string(),
            }
        })?;
        let token_kind =
            INJECTION_KIND
                .get(token)
                .ok_or_else(|| OctavoError::MissingOverriddenAnnotation {
                    token: token.to_string(),
                })?;

        if provider_kind != token_kind {
            return Err(OctavoError::IncompatibleOverride {
                token: token.to_string(),
                provider_kind,
                token_kind,
            });
        }

        let blueprint = BLUEPRINT.get(provider_token).ok_or_else(|| {
            OctavoError::MissingAnnotation {
                provider: provider_token.to_string(),
            }
        })?;
        let properties = PROPERTY_INJECTIONS.get(provider_token);

        let resolver: Resolver = match blueprint {
            Blueprint::Instance { construct, seal } => {
                let params = constructor_tokens(provider_token)?;
                let target = provider_token.clone();
                Arc::new(move |injector: &Injector| {
                    let args = params
                        .iter()
                        .map(|param| injector.get(param))
                        .collect::<Result<Vec<_>>>()?;
                    let mut instance = construct(&Args::new(args, target.clone()))?;
                    assign_properties(injector, instance.as_mut(), &properties)?;
                    seal(instance)
                })
            }
            Blueprint::Factory { make } => Arc::new(move |injector: &Injector| {
                let mut statics = Statics::default();
                for property in &properties {
                    statics.insert(property.name, injector.get(&property.token)?);
                }
                Ok(make(statics))
            }),
        };

        tracing::trace!(
            token = %token,
            provider = %provider_token,
            kind = %provider_kind,
            "registering provider"
        );
        self.records
            .insert(token.clone(), Arc::new(Record::new(resolver)));
        Ok(())
    }
}

impl Resolve for Injector {
    fn resolve(&self, token: &Token) -> Result<Value> {
        self.get(token)
    }
}

fn constructor_tokens(target: &Token) -> Result<Vec<Token>> {
    CONSTRUCTOR_INJECTIONS
        .get(target)
        .into_iter()
        .enumerate()
        .map(|(index, param)| {
            param.ok_or_else(|| OctavoError::MissedParamAnnotation {
                index,
                target: target.to_string(),
            })
        })
        .collect()
}

fn assign_properties(
    injector: &Injector,
    instance: &mut (dyn std::any::Any + Send + Sync),
    properties: &[PropertyInjection],
) -> Result<()> {
    for property in properties {
        if let Some(assign) = &property.assign {
            assign(instance, injector.get(&property.token)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Annotate, Annotated, Provide};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Engine;
    struct Wheels;
    struct Car {
        engine: Arc<Engine>,
        wheels: Option<Arc<Wheels>>,
    }

    impl Annotated for Engine {
        fn annotate() -> Result<()> {
            Annotate::<Engine>::new().service(|_| Ok(Engine))
        }
    }

    impl Annotated for Wheels {
        fn annotate() -> Result<()> {
            Annotate::<Wheels>::new().service(|_| Ok(Wheels))
        }
    }

    impl Annotated for Car {
        fn annotate() -> Result<()> {
            Annotate::<Car>::new()
                .inject_param(0, Token::of::<Engine>())
                .inject_property("wheels", Token::of::<Wheels>(), |car: &mut Car, wheels| {
                    car.wheels = Some(wheels)
                })
                .service(|args| {
                    Ok(Car {
                        engine: args.get(0)?,
                        wheels: None,
                    })
                })
        }
    }

    #[test]
    fn test_constructor_and_property_injection() {
        let injector = Injector::new(vec![
            Provider::annotated::<Car>(),
            Provider::annotated::<Wheels>(),
            Provider::annotated::<Engine>(),
        ])
        .unwrap();

        let car = injector.service::<Car>().unwrap();
        assert!(Arc::ptr_eq(&car.engine, &injector.service::<Engine>().unwrap()));
        assert!(car.wheels.is_some());
    }

    #[test]
    fn test_no_provider() {
        let injector = Injector::new(vec![Provider::annotated::<Car>()]).unwrap();

        let err = injector.get(&Token::of::<Car>()).unwrap_err();
        assert_eq!(err.to_string(), "No provider for Engine!");
    }

    #[test]
    fn test_constructed_once() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);
        struct Counter;
        Annotate::<Counter>::new()
            .service(|_| {
                BUILT.fetch_add(1, Ordering::SeqCst);
                Ok(Counter)
            })
            .unwrap();

        let injector = Injector::new(vec![Provider::class::<Counter>()]).unwrap();
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);

        let first = injector.service::<Counter>().unwrap();
        let second = injector.service::<Counter>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parent_fallback() {
        let parent = Arc::new(Injector::new(vec![Provider::annotated::<Engine>()]).unwrap());
        let child =
            Injector::with_parent(vec![Provider::annotated::<Car>()], parent.clone()).unwrap();

        assert!(!child.contains(&Token::of::<Engine>()));
        assert!(Arc::ptr_eq(
            &child.service::<Engine>().unwrap(),
            &parent.service::<Engine>().unwrap()
        ));
    }

    #[test]
    fn test_circular_dependency() {
        struct Chicken;
        struct Egg;
        Annotate::<Chicken>::new()
            .inject_param(0, Token::of::<Egg>())
            .service(|_| Ok(Chicken))
            .unwrap();
        Annotate::<Egg>::new()
            .inject_param(0, Token::of::<Chicken>())
            .service(|_| Ok(Egg))
            .unwrap();

        let injector =
            Injector::new(vec![Provider::class::<Chicken>(), Provider::class::<Egg>()]).unwrap();
        let err = injector.get(&Token::of::<Chicken>()).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Circular dependency detected: Chicken -> Egg -> Chicken"
        );
    }

    #[test]
    fn test_failed_resolution_can_be_retried() {
        let injector = Injector::new(vec![Provider::annotated::<Car>()]).unwrap();
        assert!(injector.get(&Token::of::<Car>()).is_err());

        injector.load(Provider::annotated::<Engine>()).unwrap();
        injector.load(Provider::annotated::<Wheels>()).unwrap();
        assert!(injector.service::<Car>().is_ok());
    }

    #[test]
    fn test_concurrent_cycle_fails_on_every_thread() {
        struct Hen;
        struct Nest;
        Annotate::<Hen>::new()
            .inject_param(0, Token::of::<Nest>())
            .service(|_| Ok(Hen))
            .unwrap();
        Annotate::<Nest>::new()
            .inject_param(0, Token::of::<Hen>())
            .service(|_| Ok(Nest))
            .unwrap();

        let injector =
            Injector::new(vec![Provider::class::<Hen>(), Provider::class::<Nest>()]).unwrap();
        let barrier = std::sync::Barrier::new(2);

        std::thread::scope(|s| {
            let hen = s.spawn(|| {
                barrier.wait();
                injector.get(&Token::of::<Hen>()).map(|_| ())
            });
            let nest = s.spawn(|| {
                barrier.wait();
                injector.get(&Token::of::<Nest>()).map(|_| ())
            });

            for outcome in [hen.join().unwrap(), nest.join().unwrap()] {
                assert!(matches!(
                    outcome,
                    Err(OctavoError::CircularDependency { .. })
                ));
            }
        });
    }

    #[test]
    fn test_factory_yields_handle() {
        struct Gearbox;
        Annotate::<Gearbox>::new()
            .inject_static("engine", Token::of::<Engine>())
            .factory()
            .unwrap();

        let injector = Injector::new(vec![
            Provider::class::<Gearbox>(),
            Provider::annotated::<Engine>(),
        ])
        .unwrap();

        let handle = injector.factory::<Gearbox>().unwrap();
        assert_eq!(handle.to_string(), "Factory<Gearbox>");
        assert!(Arc::ptr_eq(
            &handle.get::<Engine>("engine").unwrap(),
            &injector.service::<Engine>().unwrap()
        ));
        assert!(injector.service::<Gearbox>().is_err());
        assert!(Arc::ptr_eq(&handle, &injector.factory::<Gearbox>().unwrap()));
    }

    #[test]
    fn test_provider_yields_provided_value() {
        static PROVIDED: AtomicUsize = AtomicUsize::new(0);

        struct Url(String);
        struct UrlProvider;

        impl Provide for UrlProvider {
            type Output = Url;

            fn provide(&self) -> Url {
                PROVIDED.fetch_add(1, Ordering::SeqCst);
                Url("postgres://localhost".to_string())
            }
        }

        Annotate::<UrlProvider>::new()
            .provider(|_| Ok(UrlProvider))
            .unwrap();

        let injector = Injector::new(vec![Provider::class::<UrlProvider>()]).unwrap();
        let first = injector.provided::<UrlProvider>().unwrap();
        let second = injector.get_as::<Url>(&Token::of::<UrlProvider>()).unwrap();

        assert_eq!(first.0, "postgres://localhost");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(PROVIDED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_override_requires_same_kind() {
        struct Mailer;
        struct MailerFactory;
        Annotate::<Mailer>::new().service(|_| Ok(Mailer)).unwrap();
        Annotate::<MailerFactory>::new().factory().unwrap();

        let injector = Injector::new(Vec::<Provider>::new()).unwrap();
        let err = injector
            .load(Provider::replace_class(
                Class::of::<MailerFactory>(),
                Class::of::<Mailer>(),
            ))
            .err()
            .unwrap();

        assert_eq!(
            err.to_string(),
            "Cannot override Mailer provider, Factory and Service types are not compatible"
        );
        assert!(!injector.contains(&Token::of::<Mailer>()));
    }

    #[test]
    fn test_replace_and_last_registration_win() {
        struct Smtp;
        struct Sendmail;
        struct Outbox;
        Annotate::<Smtp>::new().service(|_| Ok(Smtp)).unwrap();
        Annotate::<Sendmail>::new().service(|_| Ok(Sendmail)).unwrap();
        Annotate::<Outbox>::new().service(|_| Ok(Outbox)).unwrap();

        let token = Token::of::<Smtp>();
        let injector = Injector::new(vec![
            Provider::class::<Smtp>(),
            Provider::replace_class(Class::of::<Sendmail>(), Class::of::<Smtp>()),
        ])
        .unwrap();
        assert!(injector.get_as::<Sendmail>(&token).is_ok());
        assert!(injector.get_as::<Smtp>(&token).is_err());

        let injector = Injector::new(vec![
            Provider::replace_class(Class::of::<Sendmail>(), Class::of::<Smtp>()),
            Provider::replace_class(Class::of::<Outbox>(), Class::of::<Smtp>()),
        ])
        .unwrap();
        assert_eq!(injector.len(), 1);
        assert!(injector.get_as::<Outbox>(&token).is_ok());
    }
}
