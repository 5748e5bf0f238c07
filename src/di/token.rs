use std::any::{TypeId, type_name};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MARKER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Type(TypeId),
    Marker(u64),
}

/// Opaque identity of an injectable.
///
/// Tokens compare and hash by identity only: the `TypeId` of a type token or
/// the process-unique id of an [`InjectionToken`]. The name is only used for
/// messages.
#[derive(Clone)]
pub struct Token {
    identity: Identity,
    name: Cow<'static, str>,
}

impl Token {
    /// Token of the type `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            identity: Identity::Type(TypeId::of::<T>()),
            name: Cow::Borrowed(type_name::<T>()),
        }
    }

    /// Full name (module paths included for type tokens).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true when this token identifies the type `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.identity == Identity::Type(TypeId::of::<T>())
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identity {
            Identity::Type(_) => f.write_str(&short_type_name(&self.name)),
            Identity::Marker(_) => write!(f, "InjectionToken {}", self.name),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

/// Explicit token for values that are not identified by their type,
/// e.g. a connection string or one of several instances of the same type.
///
/// ```
/// use octavo::di::{InjectionToken, Injector, Provider};
///
/// let url = InjectionToken::<String>::new("db-url");
/// let injector = Injector::new(vec![
///     Provider::value(url.token(), "postgres://localhost".to_string()),
/// ]).unwrap();
///
/// assert_eq!(*injector.get_token(&url).unwrap(), "postgres://localhost");
/// ```
pub struct InjectionToken<T: ?Sized> {
    token: Token,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + 'static> InjectionToken<T> {
    pub fn new(desc: impl Into<String>) -> Self {
        Self {
            token: Token {
                identity: Identity::Marker(NEXT_MARKER.fetch_add(1, Ordering::Relaxed)),
                name: Cow::Owned(desc.into()),
            },
            _marker: PhantomData,
        }
    }

    pub fn token(&self) -> Token {
        self.token.clone()
    }
}

impl<T: ?Sized> Clone for InjectionToken<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for InjectionToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token)
    }
}

/// Strips module paths from a type name, keeping generics readable:
/// `alloc::sync::Arc<app::Engine>` becomes `Arc<Engine>`.
pub(crate) fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();

    for ch in full.chars() {
        match ch {
            ':' => segment.clear(),
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }

    out.push_str(&segment);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Engine;

    trait Wheel {}

    #[test]
    fn test_type_tokens_compare_by_type() {
        assert_eq!(Token::of::<Engine>(), Token::of::<Engine>());
        assert_ne!(Token::of::<Engine>(), Token::of::<String>());
        assert!(Token::of::<Engine>().is::<Engine>());
    }

    #[test]
    fn test_display_strips_module_paths() {
        assert_eq!(Token::of::<Engine>().to_string(), "Engine");
        assert_eq!(Token::of::<dyn Wheel>().to_string(), "dyn Wheel");
        assert_eq!(
            Token::of::<std::sync::Arc<Engine>>().to_string(),
            "Arc<Engine>"
        );
    }

    #[test]
    fn test_injection_tokens_are_unique() {
        let first = InjectionToken::<String>::new("db-url");
        let second = InjectionToken::<String>::new("db-url");

        assert_ne!(first.token(), second.token());
        assert_eq!(first.token(), first.clone().token());
        assert_eq!(first.token().to_string(), "InjectionToken db-url");
    }
}
