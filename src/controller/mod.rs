//! Controllers and their actions.
//!
//! A controller is a service whose actions are registered by key with
//! [`Annotate::action`]. Routes point at a controller and an action key; the
//! per-action metadata (`request`, `response`, `view`, `describe`) is keyed
//! the same way.
//!
//! ```
//! use octavo::controller::RequestSchema;
//! use octavo::di::{Annotate, Annotated};
//! use octavo::schema::{number, object};
//! use serde_json::json;
//!
//! struct Books;
//!
//! impl Annotated for Books {
//!     fn annotate() -> octavo::Result<()> {
//!         Annotate::<Books>::new()
//!             .action("show", |_this, ctx| async move {
//!                 Ok(json!({ "id": ctx.param("id") }))
//!             })
//!             .request("show", RequestSchema::new().params(object([("id", number())])))
//!             .describe("show", "A single book")
//!             .controller(|_| Ok(Books))
//!     }
//! }
//! ```

mod resource;

pub use resource::ResourceAction;

use crate::context::{Context, ControllerContext};
use crate::di::metadata::{Metadata, keys};
use crate::di::{self, Annotate, Args, Token};
use crate::exception::{HttpError, ValidationError};
use crate::middleware::BoxFuture;
use crate::schema::{Schema, SchemaValidationError};
use crate::view::VIEW;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// An action with its controller erased.
pub(crate) type Action =
    Arc<dyn Fn(di::Value, ControllerContext) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

pub(crate) static ACTIONS: Metadata<Option<Action>> = Metadata::new(keys::ACTIONS, Default::default);
pub(crate) static REQUEST: Metadata<Option<RequestSchema>> =
    Metadata::new(keys::REQUEST, Default::default);
pub(crate) static RESPONSE: Metadata<Option<ResponseSchema>> =
    Metadata::new(keys::RESPONSE, Default::default);
pub(crate) static DESCRIPTION: Metadata<Option<String>> =
    Metadata::new(keys::DESCRIPTION, Default::default);

/// Keys of the actions registered on `controller`, sorted.
pub fn action_keys(controller: &Token) -> Vec<String> {
    ACTIONS.members(controller)
}

pub fn has_action(controller: &Token, key: &str) -> bool {
    ACTIONS.get_member(controller, key).is_some()
}

pub fn description(controller: &Token, key: &str) -> Option<String> {
    DESCRIPTION.get_member(controller, key)
}

pub fn view_name(controller: &Token, key: &str) -> Option<String> {
    VIEW.get_member(controller, key)
}

/// Schemas the incoming request of an action must satisfy. Validated parts
/// replace the raw ones, so actions see converted values.
#[derive(Debug, Clone, Default)]
pub struct RequestSchema {
    body: Option<Schema>,
    params: Option<Schema>,
    headers: Option<Schema>,
    query: Option<Schema>,
}

impl RequestSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, schema: Schema) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn params(mut self, schema: Schema) -> Self {
        self.params = Some(schema);
        self
    }

    pub fn headers(mut self, schema: Schema) -> Self {
        self.headers = Some(schema);
        self
    }

    pub fn query(mut self, schema: Schema) -> Self {
        self.query = Some(schema);
        self
    }

    /// Validates every part, failing with one `400 Validation Error` that
    /// lists all violations.
    pub(crate) fn apply(&self, ctx: &Context) -> Result<(), HttpError> {
        let body = check(&self.body, ctx.with(|state| state.body.clone()));
        let params = check(&self.params, Value::Object(ctx.params()));
        let headers = check(&self.headers, ctx.headers_value());
        let query = check(&self.query, ctx.with(|state| Value::Object(state.query.clone())));

        let err = ValidationError::from_schema_errors(
            body.as_ref().err().cloned(),
            params.as_ref().err().cloned(),
            headers.as_ref().err().cloned(),
            query.as_ref().err().cloned(),
        );
        if !err.is_empty() {
            return Err(err.into());
        }

        ctx.with(|state| {
            if let Ok(Some(body)) = body {
                state.body = body;
            }
            if let Ok(Some(Value::Object(params))) = params {
                state.params = params;
            }
            if let Ok(Some(headers)) = headers {
                state.headers = Some(headers);
            }
            if let Ok(Some(Value::Object(query))) = query {
                state.query = query;
            }
        });
        Ok(())
    }
}

/// Schemas an action's response must satisfy. The body is stripped down to
/// the declared keys.
#[derive(Debug, Clone, Default)]
pub struct ResponseSchema {
    body: Option<Schema>,
    headers: Option<Schema>,
}

impl ResponseSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(mut self, schema: Schema) -> Self {
        self.body = Some(schema);
        self
    }

    pub fn headers(mut self, schema: Schema) -> Self {
        self.headers = Some(schema);
        self
    }

    /// A response violating its schema is a server bug and fails the
    /// request with the schema error.
    pub(crate) fn apply(&self, ctx: &Context, data: Value) -> anyhow::Result<Value> {
        if let Some(schema) = &self.headers {
            let headers: serde_json::Map<String, Value> = ctx.with(|state| {
                state
                    .response_headers
                    .iter()
                    .filter_map(|(name, value)| {
                        let value = value.to_str().ok()?;
                        Some((name.as_str().to_string(), Value::String(value.to_string())))
                    })
                    .collect()
            });
            schema.validate(&Value::Object(headers))?;
        }

        match &self.body {
            Some(schema) => Ok(schema.validate(&data)?),
            None => Ok(data),
        }
    }
}

fn check(schema: &Option<Schema>, value: Value) -> Result<Option<Value>, SchemaValidationError> {
    match schema {
        Some(schema) => schema.validate(&value).map(Some),
        None => Ok(None),
    }
}

impl<T: Send + Sync + 'static> Annotate<T> {
    /// Registers the action `key`. Its result is serialized to JSON: a
    /// string answers as plain text, `()` or `None` with `204 No Content`.
    pub fn action<F, Fut, R>(self, key: &'static str, action: F) -> Self
    where
        F: Fn(Arc<T>, ControllerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize,
    {
        let erased: Action = Arc::new(
            move |instance: di::Value, ctx: ControllerContext| -> BoxFuture<'static, anyhow::Result<Value>> {
                let controller = match instance.downcast_or_fail::<T>() {
                    Ok(controller) => controller,
                    Err(err) => return Box::pin(async move { Err::<Value, _>(anyhow::Error::from(err)) }),
                };
                let pending = action(controller, ctx);
                Box::pin(async move {
                    let data = pending.await?;
                    Ok::<Value, anyhow::Error>(serde_json::to_value(data)?)
                })
            },
        );
        ACTIONS.set_member(Some(erased), self.target(), key);
        self
    }

    pub fn request(self, key: &'static str, schema: RequestSchema) -> Self {
        REQUEST.set_member(Some(schema), self.target(), key);
        self
    }

    pub fn response(self, key: &'static str, schema: ResponseSchema) -> Self {
        RESPONSE.set_member(Some(schema), self.target(), key);
        self
    }

    /// Renders the result of `key` with the view `name`.
    pub fn view(self, key: &'static str, name: &str) -> Self {
        VIEW.set_member(Some(name.to_string()), self.target(), key);
        self
    }

    pub fn describe(self, key: &'static str, text: &str) -> Self {
        DESCRIPTION.set_member(Some(text.to_string()), self.target(), key);
        self
    }

    pub fn controller<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.service_named("Controller", construct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Annotated, Injector, Provider};
    use crate::schema::{number, object, string};
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    struct Greeter {
        greeting: &'static str,
    }

    impl Annotated for Greeter {
        fn annotate() -> crate::Result<()> {
            Annotate::<Greeter>::new()
                .action("hello", |this: Arc<Greeter>, ctx: ControllerContext| async move {
                    let name = ctx.param("name").unwrap_or(Value::Null);
                    Ok(format!("{}, {}!", this.greeting, name.as_str().unwrap_or("stranger")))
                })
                .action("nothing", |_this: Arc<Greeter>, _ctx: ControllerContext| async move {
                    Ok(())
                })
                .describe("hello", "Greets by name")
                .controller(|_| Ok(Greeter { greeting: "Hello" }))
        }
    }

    fn context(uri: &str) -> Context {
        Context::from_request(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_actions_are_registered_by_key() {
        let injector = Injector::new(vec![Provider::annotated::<Greeter>()]).unwrap();
        let token = Token::of::<Greeter>();
        let instance = injector.get(&token).unwrap();

        assert_eq!(action_keys(&token), vec!["hello", "nothing"]);
        assert_eq!(description(&token, "hello").as_deref(), Some("Greets by name"));
        assert!(!has_action(&token, "missing"));

        let ctx = context("/");
        ctx.with(|state| {
            state.params.insert("name".to_string(), json!("Alice"));
        });
        let hello = ACTIONS.get_member(&token, "hello").unwrap();
        let out = hello(instance.clone(), ControllerContext::new(ctx.clone())).await.unwrap();
        assert_eq!(out, json!("Hello, Alice!"));

        let nothing = ACTIONS.get_member(&token, "nothing").unwrap();
        let out = nothing(instance, ControllerContext::new(ctx)).await.unwrap();
        assert_eq!(out, Value::Null);
    }

    #[test]
    fn test_request_schema_converts_parts() {
        let ctx = context("/books/10?page=2");
        ctx.with(|state| {
            state.params.insert("id".to_string(), json!("10"));
            state.body = json!({"name": "Dune", "year": "1965", "extra": true});
        });

        RequestSchema::new()
            .params(object([("id", number())]))
            .query(object([("page", number())]))
            .body(object([("name", string()), ("year", number())]))
            .apply(&ctx)
            .unwrap();

        let view = ControllerContext::new(ctx);
        assert_eq!(view.param("id"), Some(json!(10)));
        assert_eq!(view.query(), json!({"page": 2}));
        assert_eq!(view.body(), json!({"name": "Dune", "year": 1965}));
    }

    #[test]
    fn test_request_schema_aggregates_violations() {
        let ctx = context("/books/ten");
        ctx.with(|state| {
            state.params.insert("id".to_string(), json!("ten"));
            state.body = json!({});
        });

        let err = RequestSchema::new()
            .params(object([("id", number())]))
            .body(object([("name", string())]))
            .apply(&ctx)
            .unwrap_err();

        assert_eq!(err.status(), 400);
        assert_eq!(err.message(), "Validation Error");
        let paths: Vec<_> = err
            .validation_errors()
            .iter()
            .map(|item| item.path.as_str())
            .collect();
        assert_eq!(paths, vec![".name", ".id"]);
    }

    #[test]
    fn test_response_schema_strips_body() {
        let ctx = context("/");
        let schema = ResponseSchema::new().body(object([("id", number())]));

        let out = schema.apply(&ctx, json!({"id": 1, "secret": "x"})).unwrap();
        assert_eq!(out, json!({"id": 1}));
        assert!(schema.apply(&ctx, json!({"secret": "x"})).is_err());
    }
}
