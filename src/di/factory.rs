use super::token::short_type_name;
use super::value::Value;
use crate::error::{OctavoError, Result};
use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Named values injected into a factory's static properties.
#[derive(Clone, Default)]
pub struct Statics {
    values: HashMap<&'static str, Value>,
}

impl Statics {
    pub(crate) fn insert(&mut self, name: &'static str, value: Value) {
        self.values.insert(name, value);
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// What the injector hands out for a `Factory`-kind type: a handle to the
/// type itself rather than an instance of it.
///
/// Consumers build their own instances, typically through an associated
/// function that takes the handle and reads the injected statics.
pub struct Factory<T> {
    statics: Statics,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Factory<T> {
    pub(crate) fn new(statics: Statics) -> Self {
        Self {
            statics,
            _marker: PhantomData,
        }
    }

    pub fn statics(&self) -> &Statics {
        &self.statics
    }

    /// A static property injected into the factory, as `Arc<V>`.
    pub fn get<V: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<V>> {
        let value = self
            .statics
            .value(name)
            .ok_or_else(|| OctavoError::Internal(format!("{} has no static `{name}`", self)))?;
        value.downcast_or_fail::<V>()
    }

    pub fn type_name(&self) -> String {
        short_type_name(type_name::<T>())
    }
}

impl<T: 'static> fmt::Display for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Factory<{}>", self.type_name())
    }
}

impl<T: 'static> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("type", &self.type_name())
            .field("statics", &self.statics.len())
            .finish()
    }
}
