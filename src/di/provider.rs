use super::annotate::{Annotated, annotate};
use super::token::Token;
use super::value::Value;
use crate::error::Result;
use std::fmt;

/// Reference to an annotated type.
///
/// A class built with [`Class::annotated`] runs the type's annotations
/// before its metadata is read; [`Class::of`] assumes they already ran.
#[derive(Clone)]
pub struct Class {
    token: Token,
    prepare: Option<fn() -> Result<()>>,
}

impl Class {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            token: Token::of::<T>(),
            prepare: None,
        }
    }

    pub fn annotated<T: Annotated>() -> Self {
        Self {
            token: Token::of::<T>(),
            prepare: Some(annotate::<T>),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub(crate) fn prepare(&self) -> Result<()> {
        match self.prepare {
            Some(prepare) => prepare(),
            None => Ok(()),
        }
    }
}

impl From<Token> for Class {
    fn from(token: Token) -> Self {
        Self {
            token,
            prepare: None,
        }
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.token)
    }
}

/// Declaration handed to an [`Injector`](super::Injector).
#[derive(Clone, Debug)]
pub enum Provider {
    /// An annotated type registered under its own token.
    Class(Class),
    /// `use_class` is built whenever `instead_of` is requested. Both must be
    /// annotated with the same injection kind.
    Replace { use_class: Class, instead_of: Class },
    /// A ready value bound to a token.
    Value { token: Token, value: Value },
}

impl Provider {
    pub fn class<T: ?Sized + 'static>() -> Self {
        Provider::Class(Class::of::<T>())
    }

    pub fn annotated<T: Annotated>() -> Self {
        Provider::Class(Class::annotated::<T>())
    }

    /// Provides `U` wherever `I` is injected.
    pub fn replace<U: Annotated, I: Annotated>() -> Self {
        Provider::Replace {
            use_class: Class::annotated::<U>(),
            instead_of: Class::annotated::<I>(),
        }
    }

    pub fn replace_class(use_class: impl Into<Class>, instead_of: impl Into<Class>) -> Self {
        Provider::Replace {
            use_class: use_class.into(),
            instead_of: instead_of.into(),
        }
    }

    pub fn value<T: Send + Sync + 'static>(token: Token, value: T) -> Self {
        Provider::Value {
            token,
            value: Value::new(value),
        }
    }

    /// Token this provider registers.
    pub fn token(&self) -> &Token {
        match self {
            Provider::Class(class) => class.token(),
            Provider::Replace { instead_of, .. } => instead_of.token(),
            Provider::Value { token, .. } => token,
        }
    }
}

impl From<Class> for Provider {
    fn from(class: Class) -> Self {
        Provider::Class(class)
    }
}
