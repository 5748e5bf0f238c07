use crate::context::{Context, PolicyContext};
use crate::di::{Annotate, Args};
use crate::middleware::{Next, Outcome, Stage};
use async_trait::async_trait;
use std::sync::Arc;

/// The Policy trait
///
/// Policies decide whether a request may continue into the scope they are
/// attached to. They cannot wrap the rest of the chain: returning `Ok`
/// continues, any error rejects the request.
///
/// # Example
/// ```
/// use octavo::prelude::*;
///
/// struct RequireToken;
///
/// #[async_trait]
/// impl Policy for RequireToken {
///     async fn exec(&self, ctx: PolicyContext) -> Outcome {
///         match ctx.header("x-token") {
///             Some(_) => Ok(()),
///             None => Err(HttpError::unauthorized().into()),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait Policy: Send + Sync + 'static {
    async fn exec(&self, ctx: PolicyContext) -> Outcome;
}

impl<T: Policy> Annotate<T> {
    pub fn policy<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn Policy, _>(|it| it as Arc<dyn Policy>)
            .service_named("Policy", construct)
    }
}

/// Runs a policy as a pipeline stage.
pub(crate) struct PolicyStage(pub(crate) Arc<dyn Policy>);

#[async_trait]
impl Stage for PolicyStage {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        self.0.exec(PolicyContext::new(ctx)).await?;
        next.run().await
    }
}
