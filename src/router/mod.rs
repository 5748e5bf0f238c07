//! Route tree and the DSL that builds it.
//!
//! The DSL keeps the scopes being built on a thread-local stack: `scope`
//! opens a scope, runs its body and attaches it to the enclosing one; the
//! verb functions add a handler scope to the innermost open scope; the
//! `use_*` functions attach to it.
//!
//! ```
//! use octavo::prelude::*;
//! use octavo::router::{get, resource, scope, use_middleware};
//!
//! struct Ping;
//!
//! impl Annotated for Ping {
//!     fn annotate() -> octavo::Result<()> {
//!         Annotate::<Ping>::new()
//!             .action("index", |_this, _ctx| async { Ok("pong") })
//!             .controller(|_| Ok(Ping))
//!     }
//! }
//!
//! let routes = scope("/", || {
//!     scope("/api", || {
//!         get::<Ping>("/ping", "index");
//!         resource::<Ping>("/pings");
//!     });
//! });
//!
//! assert_eq!(routes.children()[0].path(), "/api");
//! assert_eq!(routes.children()[0].children().len(), 2);
//! ```

mod compile;
mod dispatch;
mod path;
mod scope;

pub(crate) use compile::RouteCompiler;
pub(crate) use dispatch::{CompiledScope, route as dispatch_routes};
pub use path::normalize_path;
pub use scope::{Handler, Scope, Verb};

use crate::controller::{ResourceAction, has_action};
use crate::di::{Annotated, Class};
use axum::http::{Method, StatusCode};
use std::cell::RefCell;
use strum::IntoEnumIterator;

thread_local! {
    static STACK: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

fn open(path: &str) {
    STACK.with(|stack| stack.borrow_mut().push(Scope::new(path)));
}

/// Pops the innermost scope and attaches a copy to its parent.
fn close() -> Scope {
    STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        let scope = stack.pop().unwrap_or_default();
        if let Some(parent) = stack.last_mut() {
            parent.add_child(scope.clone());
        }
        scope
    })
}

fn with_current(what: &str, f: impl FnOnce(&mut Scope)) {
    STACK.with(|stack| match stack.borrow_mut().last_mut() {
        Some(scope) => f(scope),
        None => tracing::warn!(what = %what, "ignored outside of a scope"),
    });
}

/// Opens a scope at `path`, runs `body` inside it and returns it.
pub fn scope(path: &str, body: impl FnOnce()) -> Scope {
    open(path);
    body();
    close()
}

/// Registers `controller`'s action `key` at `path` for `verb`.
pub fn route(verb: Verb, status: StatusCode, path: &str, controller: Class, key: &str) -> Scope {
    open(path);
    with_current("handler", |scope| {
        scope.set_handler(Handler {
            verb,
            status,
            controller,
            key: key.to_string(),
        })
    });
    close()
}

fn extension(name: &[u8]) -> Method {
    Method::from_bytes(name).unwrap_or_default()
}

macro_rules! verbs {
    ($($name:ident => $method:expr;)*) => {
        $(
            #[doc = concat!("Routes `", stringify!($name), "` requests at `path` to `C`'s action `key`.")]
            pub fn $name<C: Annotated>(path: &str, key: &str) -> Scope {
                route(Verb::Only($method), StatusCode::OK, path, Class::annotated::<C>(), key)
            }
        )*
    };
}

verbs! {
    acl => extension(b"ACL");
    bind => extension(b"BIND");
    checkout => extension(b"CHECKOUT");
    connect => Method::CONNECT;
    copy => extension(b"COPY");
    del => Method::DELETE;
    get => Method::GET;
    head => Method::HEAD;
    link => extension(b"LINK");
    lock => extension(b"LOCK");
    m_search => extension(b"M-SEARCH");
    merge => extension(b"MERGE");
    mkactivity => extension(b"MKACTIVITY");
    mkcalendar => extension(b"MKCALENDAR");
    mkcol => extension(b"MKCOL");
    r#move => extension(b"MOVE");
    notify => extension(b"NOTIFY");
    options => Method::OPTIONS;
    patch => Method::PATCH;
    post => Method::POST;
    propfind => extension(b"PROPFIND");
    proppatch => extension(b"PROPPATCH");
    purge => extension(b"PURGE");
    put => Method::PUT;
    rebind => extension(b"REBIND");
    report => extension(b"REPORT");
    search => extension(b"SEARCH");
    subscribe => extension(b"SUBSCRIBE");
    trace => Method::TRACE;
    unbind => extension(b"UNBIND");
    unlink => extension(b"UNLINK");
    unlock => extension(b"UNLOCK");
    unsubscribe => extension(b"UNSUBSCRIBE");
}

/// Routes requests of any method at `path` to `C`'s action `key`.
pub fn all<C: Annotated>(path: &str, key: &str) -> Scope {
    route(Verb::All, StatusCode::OK, path, Class::annotated::<C>(), key)
}

/// Conventional resource routes for every [`ResourceAction`] `C` defines.
pub fn resource<C: Annotated>(path: &str) -> Scope {
    resource_with::<C>(path, ResourceAction::iter().map(|action| (action, action.key())))
}

/// Resource routes for the given actions, each pointing at a custom key.
/// An action is routed only when the controller defines the conventional
/// action of the same name.
pub fn resource_with<'a, C: Annotated>(
    path: &str,
    actions: impl IntoIterator<Item = (ResourceAction, &'a str)>,
) -> Scope {
    let actions: Vec<_> = actions.into_iter().collect();
    let class = Class::annotated::<C>();
    // Unannotated controllers keep every route so compilation reports why.
    let known = class.prepare().is_ok();
    scope(path, || {
        for (action, key) in actions {
            if known && !has_action(class.token(), action.key()) {
                continue;
            }
            route(
                Verb::Only(action.method()),
                action.status(),
                action.path(),
                class.clone(),
                key,
            );
        }
    })
}

pub fn use_middleware<M: Annotated>() {
    with_current("middleware", |scope| scope.push_middleware(Class::annotated::<M>()));
}

pub fn use_policy<P: Annotated>() {
    with_current("policy", |scope| scope.push_policy(Class::annotated::<P>()));
}

pub fn use_formatter<F: Annotated>() {
    with_current("formatter", |scope| scope.push_formatter(Class::annotated::<F>()));
}

pub fn use_transformer<T: Annotated>() {
    with_current("transformer", |scope| scope.set_transformer(Class::annotated::<T>()));
}

pub fn use_error_interceptor<E: Annotated>() {
    with_current("error interceptor", |scope| {
        scope.push_error_interceptor(Class::annotated::<E>())
    });
}

/// Resolves state `name` with `S` for every route below the current scope.
pub fn use_state<S: Annotated>(name: &str) {
    with_current("state", |scope| scope.push_state(name, Class::annotated::<S>()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Annotate, Token};

    struct Books;

    impl Annotated for Books {
        fn annotate() -> crate::Result<()> {
            Annotate::<Books>::new()
                .action("index", |_this, _ctx| async { Ok("books") })
                .action("create", |_this, _ctx| async { Ok("created") })
                .action("find", |_this, _ctx| async { Ok("found") })
                .controller(|_| Ok(Books))
        }
    }

    struct Audit;

    impl Annotated for Audit {
        fn annotate() -> crate::Result<()> {
            Annotate::<Audit>::new().service(|_| Ok(Audit))
        }
    }

    #[test]
    fn test_dsl_builds_nested_tree() {
        let root = scope("/", || {
            use_middleware::<Audit>();
            scope("/a", || {
                scope("/b", || {
                    get::<Books>("/", "index");
                });
                post::<Books>("/c", "create");
            });
        });

        assert_eq!(root.path(), "/");
        assert_eq!(root.middlewares()[0].token(), &Token::of::<Audit>());

        let a = &root.children()[0];
        assert_eq!(a.path(), "/a");
        assert_eq!(a.children().len(), 2);

        let b_handler = a.children()[0].children()[0].handler().unwrap();
        assert_eq!(b_handler.verb, Verb::Only(Method::GET));
        assert_eq!(b_handler.key, "index");

        let c_handler = a.children()[1].handler().unwrap();
        assert_eq!(c_handler.verb, Verb::Only(Method::POST));
        assert_eq!(a.children()[1].path(), "/c");
    }

    #[test]
    fn test_stack_is_balanced() {
        scope("/x", || {
            get::<Books>("/y", "index");
        });

        STACK.with(|stack| assert!(stack.borrow().is_empty()));
    }

    #[test]
    fn test_resource_routes_follow_defined_actions() {
        let root = resource::<Books>("/books");

        assert_eq!(root.path(), "/books");
        let keys: Vec<_> = root
            .children()
            .iter()
            .map(|child| child.handler().unwrap().key.as_str())
            .collect();
        assert_eq!(keys, vec!["index", "create"]);

        let create = root.children()[1].handler().unwrap();
        assert_eq!(create.status, StatusCode::CREATED);
        assert_eq!(create.verb, Verb::Only(Method::POST));
    }

    #[test]
    fn test_resource_with_custom_keys() {
        let root = resource_with::<Books>(
            "/books",
            [(ResourceAction::Index, "find"), (ResourceAction::Show, "find")],
        );

        assert_eq!(root.children().len(), 1);
        let index = &root.children()[0];
        assert_eq!(index.path(), "/");
        assert_eq!(index.handler().unwrap().key, "find");
    }

    #[test]
    fn test_extension_verbs() {
        let root = scope("/", || {
            m_search::<Books>("/", "search");
            r#move::<Books>("/", "move");
            all::<Books>("/any", "any");
        });

        let verbs: Vec<_> = root
            .children()
            .iter()
            .map(|child| child.handler().unwrap().verb.clone())
            .collect();
        assert_eq!(verbs[0], Verb::Only(Method::from_bytes(b"M-SEARCH").unwrap()));
        assert_eq!(verbs[1], Verb::Only(Method::from_bytes(b"MOVE").unwrap()));
        assert_eq!(verbs[2], Verb::All);
    }
}
