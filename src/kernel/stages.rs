//! The fixed stages of the request pipeline, outermost first.

use crate::context::{Context, CookieOptions, Payload, find_cookie};
use crate::error_interceptor::{ErrorInterceptor, intercept};
use crate::exception::{ErrorKind, HttpError, StatusError, to_http_error};
use crate::formatter::{FormatterEntry, negotiate};
use crate::middleware::{Next, Outcome, Stage};
use crate::router::{CompiledScope, dispatch_routes};
use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const SESSION_COOKIE: &str = "octavo:sess";
const SESSION_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);
const POWERED_BY: &str = "Octavo";

/// Seeds the request with the framework defaults every scope builds on.
pub(crate) struct Augment {
    pub(crate) formatter: FormatterEntry,
    pub(crate) interceptors: Vec<Arc<dyn ErrorInterceptor>>,
}

#[async_trait]
impl Stage for Augment {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        ctx.with(|state| {
            state.body = Value::Object(Map::new());
            state.formatters.push(self.formatter.clone());
            state.interceptors.extend(self.interceptors.iter().cloned());
        });
        next.run().await
    }
}

/// Answers every error left over as `text/plain` with its reason.
pub(crate) struct CatchAll;

#[async_trait]
impl Stage for CatchAll {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        if let Err(err) = next.run().await {
            let http = to_http_error(&err);
            tracing::debug!(status = http.status(), error = %err, "answering with error");
            ctx.set_status(http.status_code());
            ctx.remove_header(CONTENT_TYPE.as_str());
            ctx.replace_payload(Payload::Text(http.message().to_string()));
        }
        Ok(())
    }
}

/// Buffers and parses the request body.
pub(crate) struct BodyParser {
    pub(crate) limit: usize,
}

impl BodyParser {
    async fn parse(&self, ctx: &Context) -> Result<(), HttpError> {
        let declared = ctx
            .header(CONTENT_LENGTH.as_str())
            .and_then(|length| length.parse::<usize>().ok());
        if declared.is_some_and(|length| length > self.limit) {
            return Err(HttpError::request_entity_too_large());
        }

        let Some(body) = ctx.take_raw_body() else {
            return Ok(());
        };
        let bytes = axum::body::to_bytes(body, self.limit)
            .await
            .map_err(|err| {
                if err.to_string().contains("length limit") {
                    HttpError::request_entity_too_large()
                } else {
                    HttpError::bad_request()
                }
            })?;
        if bytes.is_empty() {
            return Ok(());
        }

        let content_type = ctx.header(CONTENT_TYPE.as_str()).unwrap_or_default();
        let body = parse_body(content_type, &bytes)?;
        ctx.with(|state| state.body = body);
        Ok(())
    }
}

fn parse_body(content_type: &str, bytes: &Bytes) -> Result<Value, HttpError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if essence == "application/json" || essence.ends_with("+json") {
        return serde_json::from_slice(bytes).map_err(|err| {
            HttpError::with_message(ErrorKind::BadRequest, format!("Invalid JSON body: {err}"))
        });
    }
    if essence == "application/x-www-form-urlencoded" {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
            .map_err(|_| HttpError::with_message(ErrorKind::BadRequest, "Invalid form body"))?;
        return Ok(Value::Object(
            pairs
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        ));
    }
    if essence.starts_with("text/") {
        return Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()));
    }
    Ok(Value::Object(Map::new()))
}

#[async_trait]
impl Stage for BodyParser {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        self.parse(&ctx).await?;
        next.run().await
    }
}

/// Loads the session from its cookie and re-issues the cookie when a
/// request changed it.
pub(crate) struct Session;

fn decode_session(raw: &str) -> Option<Map<String, Value>> {
    let bytes = STANDARD.decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn encode_session(values: &Map<String, Value>) -> anyhow::Result<String> {
    Ok(STANDARD.encode(serde_json::to_vec(values)?))
}

#[async_trait]
impl Stage for Session {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        let values = ctx
            .header(COOKIE.as_str())
            .and_then(|header| find_cookie(header, SESSION_COOKIE))
            .and_then(decode_session)
            .unwrap_or_default();
        ctx.with(|state| {
            state.session.values = values;
            state.session.dirty = false;
        });

        next.run().await?;

        let changed = ctx.with(|state| state.session.dirty.then(|| state.session.values.clone()));
        if let Some(values) = changed {
            let options = CookieOptions::default()
                .max_age(SESSION_MAX_AGE)
                .expires(Utc::now() + chrono::Duration::days(1));
            ctx.set_cookie(SESSION_COOKIE, &encode_session(&values)?, &options);
        }
        Ok(())
    }
}

pub(crate) struct PoweredBy;

#[async_trait]
impl Stage for PoweredBy {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        ctx.set_header("X-Powered-By", POWERED_BY)?;
        next.run().await
    }
}

/// Serializes structured payloads with the negotiated formatter.
pub(crate) struct Format;

#[async_trait]
impl Stage for Format {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        next.run().await?;

        let Payload::Data(data) = ctx.payload() else {
            return Ok(());
        };
        let formatters = ctx.with(|state| state.formatters.clone());
        let Some(entry) = negotiate(ctx.header(ACCEPT.as_str()), &formatters) else {
            return Ok(());
        };

        let body = entry.formatter.format(&data)?;
        ctx.replace_payload(Payload::Raw {
            content_type: entry.options.content_type.clone(),
            bytes: Bytes::from(body),
        });
        Ok(())
    }
}

/// Runs the transformer of the innermost matched scope.
pub(crate) struct Transform;

#[async_trait]
impl Stage for Transform {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        let outcome = next.run().await;
        let Some(transformer) = ctx.with(|state| state.transformer.clone()) else {
            return outcome;
        };

        match outcome {
            Ok(()) => {
                let data = match ctx.payload() {
                    Payload::Data(data) => data,
                    Payload::Text(text) => Value::String(text),
                    _ => return Ok(()),
                };
                match transformer.success(data) {
                    Value::String(text) => ctx.replace_payload(Payload::Text(text)),
                    data => ctx.replace_payload(Payload::Data(data)),
                }
                Ok(())
            }
            Err(err) => {
                let http = to_http_error(&err);
                let Some(body) = transformer.error(&http) else {
                    return Err(err);
                };
                ctx.set_status(http.status_code());
                ctx.replace_payload(Payload::Data(body));
                Ok(())
            }
        }
    }
}

/// Sets the response status from the error on its way out.
pub(crate) struct StatusFixup;

#[async_trait]
impl Stage for StatusFixup {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        next.run().await.inspect_err(|err| {
            ctx.set_status(to_http_error(err).status_code());
        })
    }
}

/// Hands errors to the request's error interceptors.
pub(crate) struct Intercept;

#[async_trait]
impl Stage for Intercept {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        match next.run().await {
            Ok(()) => Ok(()),
            Err(err) => {
                let interceptors = ctx.with(|state| state.interceptors.clone());
                intercept(&interceptors, err).await
            }
        }
    }
}

/// Turns an error status set without an error into one; an unanswered
/// request becomes `404 Not Found`.
pub(crate) struct StatusConvert;

#[async_trait]
impl Stage for StatusConvert {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        next.run().await?;

        let status = ctx.status().unwrap_or(StatusCode::NOT_FOUND).as_u16();
        if status < 400 {
            return Ok(());
        }
        match ErrorKind::from_status(status) {
            Some(kind) => Err(HttpError::new(kind).into()),
            None => Err(StatusError::Unexpected(status).into()),
        }
    }
}

pub(crate) struct Routes {
    pub(crate) root: Option<Arc<CompiledScope>>,
}

#[async_trait]
impl Stage for Routes {
    async fn handle(&self, ctx: Context, next: Next) -> Outcome {
        if let Some(root) = &self.root {
            dispatch_routes(Arc::clone(root), ctx).await?;
        }
        next.run().await
    }
}
