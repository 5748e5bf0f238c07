use super::path::{Pattern, split_path};
use super::scope::Verb;
use crate::context::{Context, ControllerContext, Payload, RequestState};
use crate::controller::{Action, RequestSchema, ResponseSchema};
use crate::di;
use crate::error_interceptor::ErrorInterceptor;
use crate::formatter::FormatterEntry;
use crate::middleware::{BoxFuture, Next, Outcome, Stage, chain};
use crate::state::{ResolveState, resolve_states};
use crate::transformer::Transform;
use crate::view::Views;
use axum::http::{Method, StatusCode};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A handler with its controller instance and action resolved.
pub(crate) struct CompiledHandler {
    pub(crate) name: String,
    pub(crate) verb: Verb,
    pub(crate) status: StatusCode,
    pub(crate) controller: di::Value,
    pub(crate) action: Action,
    pub(crate) request: Option<RequestSchema>,
    pub(crate) response: Option<ResponseSchema>,
    pub(crate) view: Option<String>,
    pub(crate) views: Arc<Views>,
}

impl CompiledHandler {
    async fn invoke(&self, ctx: &Context, params: Map<String, Value>) -> anyhow::Result<()> {
        tracing::debug!(route = %self.name, method = %ctx.method(), path = %ctx.path(), "dispatching");

        ctx.with(|state| state.params = params);
        if let Some(schema) = &self.request {
            schema.apply(ctx)?;
        }
        resolve_states(ctx).await?;

        let data = (self.action)(self.controller.clone(), ControllerContext::new(ctx.clone())).await?;
        let data = match &self.response {
            Some(schema) => schema.apply(ctx, data)?,
            None => data,
        };

        let payload = match (&self.view, data) {
            (Some(view), data) => Payload::Html(self.views.render(view, &data).await?),
            (None, Value::Null) => {
                ctx.set_payload(Payload::Data(Value::Null));
                return Ok(());
            }
            (None, Value::String(text)) => Payload::Text(text),
            (None, data) => Payload::Data(data),
        };

        ctx.with(|state| {
            state.status.get_or_insert(self.status);
        });
        ctx.set_payload(payload);
        Ok(())
    }
}

/// Route tree node with every referenced type resolved.
pub(crate) struct CompiledScope {
    pub(crate) pattern: Pattern,
    pub(crate) handler: Option<CompiledHandler>,
    /// Middlewares, then policies.
    pub(crate) stages: Vec<Arc<dyn Stage>>,
    pub(crate) formatters: Vec<FormatterEntry>,
    pub(crate) interceptors: Vec<Arc<dyn ErrorInterceptor>>,
    pub(crate) states: Vec<(String, Arc<dyn ResolveState>)>,
    pub(crate) transformer: Option<Arc<dyn Transform>>,
    pub(crate) children: Vec<Arc<CompiledScope>>,
}

/// Request state as it was before a scope was entered.
struct Snapshot {
    formatters: usize,
    interceptors: usize,
    resolvers: usize,
    transformer: Option<Arc<dyn Transform>>,
}

impl Snapshot {
    fn restore(self, state: &mut RequestState) {
        state.formatters.truncate(self.formatters);
        state.interceptors.truncate(self.interceptors);
        state.resolvers.truncate(self.resolvers);
        state.transformer = self.transformer;
    }
}

/// Per-request routing state shared by every visited scope.
#[derive(Clone)]
struct Walk {
    path: Arc<[String]>,
    method_mismatch: Arc<AtomicBool>,
}

impl CompiledScope {
    fn enter(&self, state: &mut RequestState) -> Snapshot {
        let snapshot = Snapshot {
            formatters: state.formatters.len(),
            interceptors: state.interceptors.len(),
            resolvers: state.resolvers.len(),
            transformer: state.transformer.clone(),
        };

        if let Some(transformer) = &self.transformer {
            state.transformer = Some(Arc::clone(transformer));
        }
        state.formatters.extend(self.formatters.iter().cloned());
        state.interceptors.extend(self.interceptors.iter().cloned());
        state.resolvers.extend(self.states.iter().cloned());
        snapshot
    }

    /// Answers with the handler or the first child that matches.
    async fn answer(
        self: Arc<Self>,
        ctx: Context,
        walk: Walk,
        depth: usize,
        params: Map<String, Value>,
    ) -> anyhow::Result<bool> {
        if depth == walk.path.len() {
            if let Some(handler) = &self.handler {
                if handler.verb.allows(ctx.method()) {
                    handler.invoke(&ctx, params).await?;
                    return Ok(true);
                }
                walk.method_mismatch.store(true, Ordering::Relaxed);
            }
        }

        for child in &self.children {
            let answered = visit(
                Arc::clone(child),
                ctx.clone(),
                walk.clone(),
                depth,
                params.clone(),
            )
            .await?;
            if answered {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether a handler at or below this scope answers `method` at
    /// `walk.path[depth..]`. Handlers matching the path with another method
    /// are recorded on `walk`.
    fn reaches(&self, walk: &Walk, method: &Method, depth: usize) -> bool {
        if depth == walk.path.len() {
            if let Some(handler) = &self.handler {
                if handler.verb.allows(method) {
                    return true;
                }
                walk.method_mismatch.store(true, Ordering::Relaxed);
            }
        }

        self.children.iter().any(|child| {
            child.pattern.match_prefix(&walk.path[depth..]).is_some()
                && child.reaches(walk, method, depth + child.pattern.len())
        })
    }
}

/// Visits `node` if its path prefix matches. Middlewares and policies of a
/// scope run only when a route below it answers the request; otherwise the
/// next sibling is tried.
fn visit(
    node: Arc<CompiledScope>,
    ctx: Context,
    walk: Walk,
    depth: usize,
    params: Map<String, Value>,
) -> BoxFuture<'static, anyhow::Result<bool>> {
    Box::pin(async move {
        let Some(captured) = node.pattern.match_prefix(&walk.path[depth..]) else {
            return Ok(false);
        };
        let depth = depth + node.pattern.len();
        if !node.stages.is_empty() && !node.reaches(&walk, ctx.method(), depth) {
            return Ok(false);
        }
        let mut params = params;
        params.extend(captured);

        let snapshot = ctx.with(|state| node.enter(state));

        if node.stages.is_empty() {
            let answered = Arc::clone(&node).answer(ctx.clone(), walk, depth, params).await?;
            if !answered {
                ctx.with(|state| snapshot.restore(state));
            }
            return Ok(answered);
        }

        let inner = {
            let node = Arc::clone(&node);
            let ctx = ctx.clone();
            Next::new(move || {
                Box::pin(async move { node.answer(ctx, walk, depth, params).await.map(|_| ()) })
            })
        };
        chain(&ctx, &node.stages, inner).run().await?;
        Ok(true)
    })
}

/// Routes the request through the compiled tree. A path that matched only
/// with other methods answers `405 Method Not Allowed`; otherwise an
/// unanswered request keeps its status unset.
pub(crate) async fn route(root: Arc<CompiledScope>, ctx: Context) -> Outcome {
    let walk = Walk {
        path: split_path(ctx.path()).into(),
        method_mismatch: Arc::new(AtomicBool::new(false)),
    };

    visit(root, ctx.clone(), walk.clone(), 0, Map::new()).await?;
    if ctx.status().is_none() && walk.method_mismatch.load(Ordering::Relaxed) {
        ctx.set_status(StatusCode::METHOD_NOT_ALLOWED);
    }
    Ok(())
}
