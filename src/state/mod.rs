//! State resolvers: values computed per request before the action runs and
//! exposed to it by name.

use crate::context::{Context, StateContext};
use crate::di::{Annotate, Args};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// The ResolveState trait
///
/// # Example
/// ```
/// use octavo::prelude::*;
/// use octavo::state::ResolveState;
///
/// struct CurrentUser;
///
/// #[async_trait]
/// impl ResolveState for CurrentUser {
///     async fn resolve(&self, ctx: StateContext) -> anyhow::Result<serde_json::Value> {
///         let name = ctx.header("x-user").unwrap_or("guest");
///         Ok(serde_json::json!({ "name": name }))
///     }
/// }
/// ```
#[async_trait]
pub trait ResolveState: Send + Sync + 'static {
    async fn resolve(&self, ctx: StateContext) -> anyhow::Result<Value>;
}

impl<T: ResolveState> Annotate<T> {
    pub fn state<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn ResolveState, _>(|it| it as Arc<dyn ResolveState>)
            .service_named("State", construct)
    }
}

/// Runs the resolvers attached to the request in attachment order and
/// stores their values.
pub(crate) async fn resolve_states(ctx: &Context) -> anyhow::Result<()> {
    let resolvers = ctx.with(|state| state.resolvers.clone());

    for (name, resolver) in resolvers {
        let value = resolver.resolve(StateContext::new(ctx.clone())).await?;
        tracing::trace!(state = %name, "state resolved");
        ctx.with(|state| state.states.insert(name, value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;

    struct Page;

    #[async_trait]
    impl ResolveState for Page {
        async fn resolve(&self, ctx: StateContext) -> anyhow::Result<Value> {
            let page = ctx.query()["page"].as_str().unwrap_or("1").parse::<u64>()?;
            Ok(json!(page))
        }
    }

    fn context(uri: &str) -> Context {
        Context::from_request(Request::builder().uri(uri).body(Body::empty()).unwrap())
    }

    #[tokio::test]
    async fn test_states_are_stored_by_name() {
        let ctx = context("/books?page=3");
        ctx.with(|state| state.resolvers.push(("page".to_string(), Arc::new(Page))));

        resolve_states(&ctx).await.unwrap();
        assert_eq!(ctx.with(|state| state.states["page"].clone()), json!(3));
    }

    #[tokio::test]
    async fn test_resolver_errors_propagate() {
        let ctx = context("/books?page=abc");
        ctx.with(|state| state.resolvers.push(("page".to_string(), Arc::new(Page))));

        assert!(resolve_states(&ctx).await.is_err());
    }
}
