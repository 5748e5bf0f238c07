//! Class, parameter and property annotations.
//!
//! An [`Annotate`] builder writes into the global metadata store the way
//! decorators would: parameter and property injections first, then exactly
//! one class annotation (`service`, `factory`, `provider` or one of the role
//! annotations) that closes the builder and records how the injector builds
//! the type.

use super::factory::{Factory, Statics};
use super::metadata::{Metadata, keys};
use super::token::{Token, short_type_name};
use super::value::{Casts, Erased, Value};
use crate::error::{OctavoError, Result};
use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock, OnceLock};

/// How the injector turns an annotated type into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum InjectionKind {
    /// Constructed once, then shared.
    Service,
    /// The type itself is handed out as a [`Factory`] handle.
    Factory,
    /// Constructed once; the result of [`Provide::provide`] is shared.
    Provider,
}

/// A type whose instance produces the injected value.
pub trait Provide: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn provide(&self) -> Self::Output;
}

pub(crate) type ConstructFn =
    Arc<dyn Fn(&Args) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;
pub(crate) type SealFn = Arc<dyn Fn(Box<dyn Any + Send + Sync>) -> Result<Value> + Send + Sync>;
pub(crate) type MakeFactoryFn = Arc<dyn Fn(Statics) -> Value + Send + Sync>;
type AssignFn = Arc<dyn Fn(&mut (dyn Any + Send + Sync), Value) -> Result<()> + Send + Sync>;

/// Recorded construction recipe of an annotated type.
#[derive(Clone)]
pub(crate) enum Blueprint {
    Instance { construct: ConstructFn, seal: SealFn },
    Factory { make: MakeFactoryFn },
}

#[derive(Clone)]
pub(crate) struct PropertyInjection {
    pub(crate) name: &'static str,
    pub(crate) token: Token,
    pub(crate) assign: Option<AssignFn>,
}

pub(crate) static ANNOTATION_NAME: Metadata<Option<&'static str>> =
    Metadata::new(keys::ANNOTATION_NAME, Default::default);
pub(crate) static INJECTION_KIND: Metadata<Option<InjectionKind>> =
    Metadata::new(keys::INJECTION_KIND, Default::default);
pub(crate) static CONSTRUCTOR_INJECTIONS: Metadata<Vec<Option<Token>>> =
    Metadata::new(keys::CONSTRUCTOR_INJECTIONS, Vec::new);
pub(crate) static PROPERTY_INJECTIONS: Metadata<Vec<PropertyInjection>> =
    Metadata::new(keys::PROPERTY_INJECTIONS, Vec::new);
pub(crate) static CASTS: Metadata<Casts> = Metadata::new(keys::CASTS, Default::default);
pub(crate) static BLUEPRINT: Metadata<Option<Blueprint>> =
    Metadata::new(keys::BLUEPRINT, Default::default);

/// Name of the class annotation applied to `token`, if any.
pub fn annotation_name(token: &Token) -> Option<&'static str> {
    ANNOTATION_NAME.get(token)
}

/// Injection kind recorded for `token`, if any.
pub fn injection_kind(token: &Token) -> Option<InjectionKind> {
    INJECTION_KIND.get(token)
}

/// Resolved constructor arguments, in declaration order.
pub struct Args {
    values: Vec<Value>,
    target: Token,
}

impl Args {
    pub(crate) fn new(values: Vec<Value>, target: Token) -> Self {
        Self { values, target }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&Value> {
        self.values
            .get(index)
            .ok_or_else(|| OctavoError::MissingArgument {
                index,
                target: self.target.to_string(),
            })
    }

    pub fn get<T: Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.value(index)?.downcast_or_fail::<T>()
    }

    /// The argument viewed as a trait object; the provided implementation
    /// must have registered the view with [`Annotate::implements`].
    pub fn get_dyn<D: ?Sized + 'static>(&self, index: usize) -> Result<Arc<D>> {
        self.value(index)?.cast_or_fail::<D>()
    }

    pub fn factory<T: 'static>(&self, index: usize) -> Result<Arc<Factory<T>>> {
        self.get::<Factory<T>>(index)
    }
}

/// Annotation builder for the type `T`.
///
/// ```
/// use octavo::di::{Annotate, Injector, Provider, Token};
/// use std::sync::Arc;
///
/// struct Engine;
/// struct Car {
///     engine: Arc<Engine>,
/// }
///
/// Annotate::<Engine>::new().service(|_| Ok(Engine)).unwrap();
/// Annotate::<Car>::new()
///     .inject_param(0, Token::of::<Engine>())
///     .service(|args| Ok(Car { engine: args.get(0)? }))
///     .unwrap();
///
/// let injector = Injector::new(vec![Provider::class::<Engine>(), Provider::class::<Car>()]).unwrap();
/// let car = injector.service::<Car>().unwrap();
/// assert!(Arc::ptr_eq(&car.engine, &injector.service::<Engine>().unwrap()));
/// ```
pub struct Annotate<T> {
    target: Token,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Default for Annotate<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Annotate<T> {
    pub fn new() -> Self {
        Self {
            target: Token::of::<T>(),
            _marker: PhantomData,
        }
    }

    pub fn target(&self) -> &Token {
        &self.target
    }

    /// Declares the constructor arity; every parameter below it must be
    /// annotated with [`inject_param`](Self::inject_param).
    pub fn params(self, arity: usize) -> Self {
        CONSTRUCTOR_INJECTIONS.update(&self.target, |params| {
            if params.len() < arity {
                params.resize(arity, None);
            }
        });
        self
    }

    pub fn inject_param(self, index: usize, token: Token) -> Self {
        CONSTRUCTOR_INJECTIONS.update(&self.target, |params| {
            if params.len() <= index {
                params.resize(index + 1, None);
            }
            params[index] = Some(token);
        });
        self
    }

    /// Injects `token` into a property after construction.
    pub fn inject_property<V, F>(self, name: &'static str, token: Token, assign: F) -> Self
    where
        V: Send + Sync + 'static,
        F: Fn(&mut T, Arc<V>) + Send + Sync + 'static,
    {
        let assign: AssignFn = Arc::new(move |instance: &mut (dyn Any + Send + Sync), value: Value| {
            let target = downcast_instance::<T>(instance)?;
            assign(target, value.downcast_or_fail::<V>()?);
            Ok(())
        });
        self.push_property(name, token, Some(assign))
    }

    /// Like [`inject_property`](Self::inject_property) for a trait-object
    /// property.
    pub fn inject_property_dyn<D, F>(self, name: &'static str, token: Token, assign: F) -> Self
    where
        D: ?Sized + 'static,
        F: Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    {
        let assign: AssignFn = Arc::new(move |instance: &mut (dyn Any + Send + Sync), value: Value| {
            let target = downcast_instance::<T>(instance)?;
            assign(target, value.cast_or_fail::<D>()?);
            Ok(())
        });
        self.push_property(name, token, Some(assign))
    }

    /// Injects `token` into a static of a factory, readable through
    /// [`Factory::get`].
    pub fn inject_static(self, name: &'static str, token: Token) -> Self {
        self.push_property(name, token, None)
    }

    /// Registers the `dyn Trait` view of `T`.
    pub fn implements<D, F>(self, cast: F) -> Self
    where
        D: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<D> + Send + Sync + 'static,
    {
        CASTS.update(&self.target, |casts| casts.insert::<T, D, F>(cast));
        self
    }

    pub fn service<F>(self, construct: F) -> Result<()>
    where
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        self.service_named("Service", construct)
    }

    /// Marks `T` as a factory: injecting it yields `Factory<T>`.
    pub fn factory(self) -> Result<()> {
        self.apply("Factory", InjectionKind::Factory, false)?;

        let make: MakeFactoryFn = Arc::new(|statics: Statics| {
            let handle: Erased = Arc::new(Factory::<T>::new(statics));
            Value::with_casts(handle, Token::of::<T>(), Arc::default())
        });
        BLUEPRINT.set(Some(Blueprint::Factory { make }), &self.target);
        Ok(())
    }

    /// Service-kind class annotation under a role name (`Controller`,
    /// `Middleware`, ...).
    pub(crate) fn service_named<F>(self, annotation: &'static str, construct: F) -> Result<()>
    where
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        self.apply(annotation, InjectionKind::Service, true)?;

        let construct: ConstructFn = Arc::new(move |args: &Args| {
            Ok(Box::new(construct(args)?) as Box<dyn Any + Send + Sync>)
        });
        let seal: SealFn = Arc::new(|instance: Box<dyn Any + Send + Sync>| {
            let concrete = instance
                .downcast::<T>()
                .map_err(|_| OctavoError::DowncastFailed {
                    type_name: short_type_name(type_name::<T>()),
                })?;
            let token = Token::of::<T>();
            let casts = Arc::new(CASTS.get(&token));
            let erased: Erased = Arc::<T>::from(concrete);
            Ok(Value::with_casts(erased, token, casts))
        });
        BLUEPRINT.set(Some(Blueprint::Instance { construct, seal }), &self.target);
        Ok(())
    }

    fn push_property(self, name: &'static str, token: Token, assign: Option<AssignFn>) -> Self {
        PROPERTY_INJECTIONS.update(&self.target, |props| {
            props.retain(|prop| prop.name != name);
            props.push(PropertyInjection {
                name,
                token,
                assign,
            });
        });
        self
    }

    fn apply(&self, annotation: &'static str, kind: InjectionKind, check_params: bool) -> Result<()> {
        if let Some(applied) = ANNOTATION_NAME.get(&self.target) {
            return Err(OctavoError::AlreadyApplied {
                annotation: annotation.to_string(),
                applied: applied.to_string(),
            });
        }

        if check_params {
            let params = CONSTRUCTOR_INJECTIONS.get(&self.target);
            if let Some(index) = params.iter().position(Option::is_none) {
                return Err(OctavoError::MissedParamAnnotation {
                    index,
                    target: self.target.to_string(),
                });
            }
        }

        ANNOTATION_NAME.set(Some(annotation), &self.target);
        INJECTION_KIND.set(Some(kind), &self.target);
        Ok(())
    }
}

impl<T: Provide> Annotate<T> {
    /// Marks `T` as a provider: injecting it yields `T::provide()`.
    pub fn provider<F>(self, construct: F) -> Result<()>
    where
        F: Fn(&Args) -> Result<T> + Send + Sync + 'static,
    {
        self.apply("Provider", InjectionKind::Provider, true)?;

        let construct: ConstructFn = Arc::new(move |args: &Args| {
            Ok(Box::new(construct(args)?) as Box<dyn Any + Send + Sync>)
        });
        let seal: SealFn = Arc::new(|instance: Box<dyn Any + Send + Sync>| {
            let provider = instance
                .downcast::<T>()
                .map_err(|_| OctavoError::DowncastFailed {
                    type_name: short_type_name(type_name::<T>()),
                })?;
            let token = Token::of::<T::Output>();
            let casts = Arc::new(CASTS.get(&token));
            let provided: Erased = Arc::new(provider.provide());
            Ok(Value::with_casts(provided, token, casts))
        });
        BLUEPRINT.set(Some(Blueprint::Instance { construct, seal }), &self.target);
        Ok(())
    }
}

fn downcast_instance<T: 'static>(instance: &mut (dyn Any + Send + Sync)) -> Result<&mut T> {
    instance
        .downcast_mut::<T>()
        .ok_or_else(|| OctavoError::DowncastFailed {
            type_name: short_type_name(type_name::<T>()),
        })
}

/// Types that annotate themselves.
///
/// `annotate` runs once per process through [`annotate`](fn@annotate), the
/// way a module's decorators run once when it is first loaded.
pub trait Annotated: Send + Sync + Sized + 'static {
    fn annotate() -> Result<()>;
}

static ANNOTATED: LazyLock<DashMap<TypeId, Arc<OnceLock<Result<()>>>>> =
    LazyLock::new(DashMap::new);

/// Runs `T::annotate()` unless it already ran, returning its outcome.
pub fn annotate<T: Annotated>() -> Result<()> {
    let once = Arc::clone(&ANNOTATED.entry(TypeId::of::<T>()).or_default());
    once.get_or_init(T::annotate).clone()
}
