use crate::context::{Context, Payload};
use crate::exception::to_http_error;
use crate::middleware::{BoxFuture, Next, Stage, chain};
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tower::Service;

/// The composed request pipeline.
pub(crate) struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub(crate) fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub(crate) async fn handle(&self, request: Request<Body>) -> Response {
        let ctx = Context::from_request(request);

        if let Err(err) = chain(&ctx, &self.stages, Next::end()).run().await {
            tracing::error!(error = ?err, "error escaped the request pipeline");
            let http = to_http_error(&err);
            ctx.set_status(http.status_code());
            ctx.replace_payload(Payload::Text(http.message().to_string()));
        }

        ctx.finish()
    }
}

/// Tower service running every request through the kernel pipeline.
#[derive(Clone)]
pub struct KernelService {
    pipeline: Arc<Pipeline>,
}

impl KernelService {
    pub(crate) fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }
}

impl Service<Request<Body>> for KernelService {
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Response, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let pipeline = Arc::clone(&self.pipeline);
        Box::pin(async move { Ok(pipeline.handle(request).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::HttpError;
    use crate::middleware::Outcome;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    struct Fail;

    #[async_trait]
    impl Stage for Fail {
        async fn handle(&self, _ctx: Context, _next: Next) -> Outcome {
            Err(HttpError::bad_request().into())
        }
    }

    #[tokio::test]
    async fn test_escaped_errors_still_answer() {
        let service = KernelService::new(Arc::new(Pipeline::new(vec![Arc::new(Fail)])));
        let response = service
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_pipeline_answers_not_found() {
        let service = KernelService::new(Arc::new(Pipeline::new(Vec::new())));
        let response = service
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
