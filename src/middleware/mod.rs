use crate::context::{Context, MiddlewareContext};
use crate::di::{Annotate, Args};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future every stage of the request pipeline returns.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of running the rest of the pipeline.
pub type Outcome = Result<(), anyhow::Error>;

/// Represents the rest of the chain
pub struct Next {
    run: Box<dyn FnOnce() -> BoxFuture<'static, Outcome> + Send>,
}

impl Next {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'static, Outcome> + Send + 'static,
    {
        Self { run: Box::new(f) }
    }

    /// A chain end that does nothing.
    pub(crate) fn end() -> Self {
        Self::new(|| Box::pin(async { Ok(()) }))
    }

    /// Execute the rest of the chain
    pub async fn run(self) -> Outcome {
        (self.run)().await
    }
}

/// The Middleware trait
///
/// Middlewares wrap everything below the scope they are attached to and may
/// act before and after it, or not call it at all.
///
/// # Example
/// ```
/// use octavo::prelude::*;
///
/// struct PoweredByTea;
///
/// #[async_trait]
/// impl Middleware for PoweredByTea {
///     async fn exec(&self, ctx: MiddlewareContext, next: Next) -> Outcome {
///         next.run().await?;
///         ctx.set_header("X-Brewed-With", "tea")?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn exec(&self, ctx: MiddlewareContext, next: Next) -> Outcome;
}

impl<T: Middleware> Annotate<T> {
    pub fn middleware<F>(self, construct: F) -> crate::Result<()>
    where
        F: Fn(&Args) -> crate::Result<T> + Send + Sync + 'static,
    {
        self.implements::<dyn Middleware, _>(|it| it as Arc<dyn Middleware>)
            .service_named("Middleware", construct)
    }
}

/// One step of the pipeline over the shared request context.
#[async_trait]
pub(crate) trait Stage: Send + Sync + 'static {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome;
}

/// Runs a user middleware as a pipeline stage.
pub(crate) struct MiddlewareStage(pub(crate) Arc<dyn Middleware>);

#[async_trait]
impl Stage for MiddlewareStage {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        self.0.exec(MiddlewareContext::new(ctx), next).await
    }
}

/// Folds `stages` around `last`: the first stage runs first and wraps all
/// the others.
pub(crate) fn chain(ctx: &Context, stages: &[Arc<dyn Stage>], last: Next) -> Next {
    let mut next = last;

    for stage in stages.iter().rev() {
        let stage = Arc::clone(stage);
        let ctx = ctx.clone();
        let inner = next;

        next = Next::new(move || Box::pin(async move { stage.handle(ctx, inner).await }));
    }

    next
}
