use super::token::{Token, short_type_name};
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

/// Turns an erased instance into a boxed `Arc<dyn Trait>`.
type CastFn = Arc<dyn Fn(&Erased) -> Option<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Trait-object views registered for a concrete type, keyed by the `TypeId`
/// of the `dyn Trait`.
#[derive(Clone, Default)]
pub struct Casts {
    casters: HashMap<TypeId, CastFn>,
}

impl Casts {
    pub(crate) fn insert<T, D, F>(&mut self, cast: F)
    where
        T: Send + Sync + 'static,
        D: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<D> + Send + Sync + 'static,
    {
        let caster: CastFn = Arc::new(move |erased: &Erased| {
            let concrete = Arc::clone(erased).downcast::<T>().ok()?;
            let view: Arc<D> = cast(concrete);
            Some(Box::new(view) as Box<dyn Any + Send + Sync>)
        });
        self.casters.insert(TypeId::of::<D>(), caster);
    }

    pub fn supports<D: ?Sized + 'static>(&self) -> bool {
        self.casters.contains_key(&TypeId::of::<D>())
    }

    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }
}

/// A resolved injectable.
///
/// Cloning is cheap; every clone points at the same instance. Besides the
/// instance itself a value knows the token of the type that produced it and
/// the trait-object views that type registered, so a consumer can ask for
/// `Arc<dyn Trait>` without knowing which implementation was provided.
#[derive(Clone)]
pub struct Value {
    inner: Erased,
    origin: Token,
    casts: Arc<Casts>,
}

impl Value {
    /// Wraps a plain value. No trait-object views are attached.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            origin: Token::of::<T>(),
            casts: Arc::default(),
        }
    }

    pub(crate) fn with_casts(inner: Erased, origin: Token, casts: Arc<Casts>) -> Self {
        Self {
            inner,
            origin,
            casts,
        }
    }

    /// Token of the type that produced this value.
    pub fn origin(&self) -> &Token {
        &self.origin
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Views the value as `Arc<dyn Trait>` through a registered cast.
    pub fn cast<D: ?Sized + 'static>(&self) -> Option<Arc<D>> {
        let caster = self.casts.casters.get(&TypeId::of::<D>())?;
        let boxed = caster(&self.inner)?;
        boxed.downcast::<Arc<D>>().ok().map(|view| *view)
    }

    pub(crate) fn downcast_or_fail<T: Send + Sync + 'static>(&self) -> crate::Result<Arc<T>> {
        self.downcast::<T>()
            .ok_or_else(|| crate::OctavoError::DowncastFailed {
                type_name: format!("{} is not {}", self.origin, short_type_name(type_name::<T>())),
            })
    }

    pub(crate) fn cast_or_fail<D: ?Sized + 'static>(&self) -> crate::Result<Arc<D>> {
        self.cast::<D>()
            .ok_or_else(|| crate::OctavoError::DowncastFailed {
                type_name: format!(
                    "{} does not implement {}",
                    self.origin,
                    short_type_name(type_name::<D>())
                ),
            })
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("origin", &self.origin).finish()
    }
}
