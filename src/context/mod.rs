//! Per-request state shared by the pipeline stages, and the narrowed views
//! of it handed to controllers, middlewares, policies and state resolvers.

mod cookie;

pub use cookie::{CookieOptions, SameSite};
pub(crate) use cookie::{find_cookie, serialize_cookie};

use crate::error_interceptor::ErrorInterceptor;
use crate::exception::{ErrorKind, HttpError};
use crate::formatter::FormatterEntry;
use crate::state::ResolveState;
use crate::transformer::Transform;
use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri};
use axum::response::Response;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Response body as set by the pipeline, serialized when the response is
/// finished.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Html(String),
    Data(Value),
    Raw { content_type: String, bytes: Bytes },
}

impl Payload {
    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }
}

#[derive(Default)]
pub(crate) struct SessionState {
    pub(crate) values: Map<String, Value>,
    pub(crate) dirty: bool,
}

/// Mutable per-request state.
#[derive(Default)]
pub(crate) struct RequestState {
    pub(crate) raw_body: Option<Body>,
    pub(crate) body: Value,
    pub(crate) params: Map<String, Value>,
    pub(crate) query: Map<String, Value>,
    pub(crate) headers: Option<Value>,
    pub(crate) session: SessionState,
    pub(crate) states: HashMap<String, Value>,

    pub(crate) transformer: Option<Arc<dyn Transform>>,
    pub(crate) formatters: Vec<FormatterEntry>,
    pub(crate) interceptors: Vec<Arc<dyn ErrorInterceptor>>,
    pub(crate) resolvers: Vec<(String, Arc<dyn ResolveState>)>,

    pub(crate) status: Option<StatusCode>,
    pub(crate) response_headers: HeaderMap,
    pub(crate) cookies: Vec<String>,
    pub(crate) payload: Payload,
}

struct Shared {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    state: Mutex<RequestState>,
}

/// Handle to one request in flight. Clones share the same request.
#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn from_request(request: Request<Body>) -> Self {
        let (parts, body) = request.into_parts();
        let query = parse_query(parts.uri.query());

        Self {
            shared: Arc::new(Shared {
                method: parts.method,
                uri: parts.uri,
                headers: parts.headers,
                state: Mutex::new(RequestState {
                    raw_body: Some(body),
                    query,
                    ..RequestState::default()
                }),
            }),
        }
    }

    /// Runs `f` on the request state. Never hold the result across an await.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut RequestState) -> R) -> R {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn method(&self) -> &Method {
        &self.shared.method
    }

    pub fn uri(&self) -> &Uri {
        &self.shared.uri
    }

    pub fn url(&self) -> String {
        self.shared
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    }

    pub fn path(&self) -> &str {
        self.shared.uri.path()
    }

    pub fn request_headers(&self) -> &HeaderMap {
        &self.shared.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.shared.headers.get(name)?.to_str().ok()
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.with(|state| state.status)
    }

    pub fn set_status(&self, status: StatusCode) {
        self.with(|state| state.status = Some(status));
    }

    pub fn payload(&self) -> Payload {
        self.with(|state| state.payload.clone())
    }

    /// Sets the response body. The status becomes `200` unless one was set;
    /// a JSON `null` answers `204 No Content`.
    pub fn set_payload(&self, payload: Payload) {
        self.with(|state| {
            let payload = match payload {
                Payload::Data(Value::Null) => {
                    state.status.get_or_insert(StatusCode::NO_CONTENT);
                    Payload::Empty
                }
                payload => {
                    state.status.get_or_insert(StatusCode::OK);
                    payload
                }
            };
            state.payload = payload;
        });
    }

    pub(crate) fn replace_payload(&self, payload: Payload) {
        self.with(|state| state.payload = payload);
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        let name = HeaderName::try_from(name).map_err(|_| invalid_header(name))?;
        let value = HeaderValue::try_from(value).map_err(|_| invalid_header(name.as_str()))?;
        self.with(|state| state.response_headers.insert(name, value));
        Ok(())
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.with(|state| {
            state
                .response_headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        })
    }

    pub fn remove_header(&self, name: &str) {
        self.with(|state| state.response_headers.remove(name));
    }

    pub fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
        let cookie = serialize_cookie(name, value, options);
        self.with(|state| state.cookies.push(cookie));
    }

    pub(crate) fn take_raw_body(&self) -> Option<Body> {
        self.with(|state| state.raw_body.take())
    }

    /// Builds the HTTP response from the final state.
    pub(crate) fn finish(&self) -> Response {
        let (status, headers, cookies, payload) = self.with(|state| {
            (
                state.status.unwrap_or(StatusCode::NOT_FOUND),
                std::mem::take(&mut state.response_headers),
                std::mem::take(&mut state.cookies),
                std::mem::take(&mut state.payload),
            )
        });

        let (content_type, body) = match payload {
            Payload::Empty => (None, Body::empty()),
            Payload::Text(text) => (Some("text/plain; charset=utf-8".to_string()), Body::from(text)),
            Payload::Html(html) => (Some("text/html; charset=utf-8".to_string()), Body::from(html)),
            Payload::Data(data) => (
                Some("application/json; charset=utf-8".to_string()),
                Body::from(serde_json::to_vec(&data).unwrap_or_default()),
            ),
            Payload::Raw {
                content_type,
                bytes,
            } => (Some(content_type), Body::from(bytes)),
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;

        let response_headers = response.headers_mut();
        response_headers.extend(headers);
        if let Some(content_type) = content_type {
            if !response_headers.contains_key(CONTENT_TYPE) {
                if let Ok(value) = HeaderValue::from_str(&content_type) {
                    response_headers.insert(CONTENT_TYPE, value);
                }
            }
        }
        for cookie in cookies {
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                response_headers.append(SET_COOKIE, value);
            }
        }

        response
    }

    pub(crate) fn params(&self) -> Map<String, Value> {
        self.with(|state| state.params.clone())
    }

    pub(crate) fn headers_value(&self) -> Value {
        if let Some(validated) = self.with(|state| state.headers.clone()) {
            return validated;
        }

        let headers = self
            .shared
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), Value::String(value.to_string())))
            })
            .collect();
        Value::Object(headers)
    }
}

fn invalid_header(name: &str) -> HttpError {
    HttpError::with_message(
        ErrorKind::InternalServerError,
        format!("Invalid response header `{name}`"),
    )
}

fn parse_query(query: Option<&str>) -> Map<String, Value> {
    let pairs: Vec<(String, String)> = query
        .and_then(|query| serde_urlencoded::from_str(query).ok())
        .unwrap_or_default();

    pairs
        .into_iter()
        .map(|(key, value)| (key, Value::String(value)))
        .collect()
}

fn deserialize<T: DeserializeOwned>(value: Value, what: &str) -> Result<T, HttpError> {
    serde_json::from_value(value).map_err(|err| {
        HttpError::with_message(ErrorKind::BadRequest, format!("Invalid {what}: {err}"))
    })
}

/// Session values of the current request, persisted in a cookie.
#[derive(Clone)]
pub struct Session {
    ctx: Context,
}

impl Session {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.ctx.with(|state| state.session.values.get(key).cloned())
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        serde_json::from_value(self.get(key)?).ok()
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        self.ctx.with(|state| {
            state.session.values.insert(key.to_string(), value);
            state.session.dirty = true;
        });
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.ctx.with(|state| {
            let removed = state.session.values.remove(key);
            state.session.dirty |= removed.is_some();
            removed
        })
    }

    pub fn clear(&self) {
        self.ctx.with(|state| {
            state.session.dirty |= !state.session.values.is_empty();
            state.session.values.clear();
        });
    }

    pub fn len(&self) -> usize {
        self.ctx.with(|state| state.session.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

macro_rules! request_view {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Context);

        impl $name {
            pub(crate) fn new(ctx: Context) -> Self {
                Self(ctx)
            }

            pub fn method(&self) -> &Method {
                self.0.method()
            }

            pub fn url(&self) -> String {
                self.0.url()
            }

            pub fn path(&self) -> &str {
                self.0.path()
            }

            pub fn header(&self, name: &str) -> Option<&str> {
                self.0.header(name)
            }

            pub fn session(&self) -> Session {
                Session {
                    ctx: self.0.clone(),
                }
            }
        }
    };
}

request_view! {
    /// What an action sees of the request.
    ControllerContext
}

request_view! {
    /// What a middleware sees: the request plus response status, headers
    /// and cookies.
    MiddlewareContext
}

request_view! {
    /// What a policy sees of the request.
    PolicyContext
}

request_view! {
    /// What a state resolver sees of the request.
    StateContext
}

impl ControllerContext {
    /// Route parameters, converted by the request schema when one is set.
    pub fn params(&self) -> Map<String, Value> {
        self.0.params()
    }

    pub fn param(&self, name: &str) -> Option<Value> {
        self.0.with(|state| state.params.get(name).cloned())
    }

    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        deserialize(Value::Object(self.params()), "params")
    }

    pub fn body(&self) -> Value {
        self.0.with(|state| state.body.clone())
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        deserialize(self.body(), "body")
    }

    pub fn query(&self) -> Value {
        self.0.with(|state| Value::Object(state.query.clone()))
    }

    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        deserialize(self.query(), "query")
    }

    /// Request headers as a JSON object with lowercase names.
    pub fn headers(&self) -> Value {
        self.0.headers_value()
    }

    /// A value resolved by a state resolver of an enclosing scope.
    pub fn state(&self, name: &str) -> Option<Value> {
        self.0.with(|state| state.states.get(name).cloned())
    }

    pub fn state_as<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        serde_json::from_value(self.state(name)?).ok()
    }

    /// Overrides the status the route would answer with.
    pub fn set_status(&self, status: StatusCode) {
        self.0.set_status(status);
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        self.0.set_header(name, value)
    }
}

impl MiddlewareContext {
    /// Current response status; `404` until something answers.
    pub fn status(&self) -> StatusCode {
        self.0.status().unwrap_or(StatusCode::NOT_FOUND)
    }

    pub fn set_status(&self, status: StatusCode) {
        self.0.set_status(status);
    }

    pub fn set_header(&self, name: &str, value: &str) -> Result<(), HttpError> {
        self.0.set_header(name, value)
    }

    pub fn response_header(&self, name: &str) -> Option<String> {
        self.0.response_header(name)
    }

    pub fn remove_header(&self, name: &str) {
        self.0.remove_header(name);
    }

    pub fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
        self.0.set_cookie(name, value, options);
    }

    pub fn payload(&self) -> Payload {
        self.0.payload()
    }
}

impl StateContext {
    pub fn params(&self) -> Map<String, Value> {
        self.0.params()
    }

    pub fn query(&self) -> Value {
        self.0.with(|state| Value::Object(state.query.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(uri: &str) -> Context {
        Context::from_request(
            Request::builder()
                .uri(uri)
                .header("x-token", "secret")
                .body(Body::empty())
                .unwrap(),
        )
    }

    #[test]
    fn test_query_is_parsed() {
        let ctx = ControllerContext::new(context("/books?page=2&q=dune"));

        assert_eq!(ctx.query(), json!({"page": "2", "q": "dune"}));
        assert_eq!(ctx.url(), "/books?page=2&q=dune");
        assert_eq!(ctx.path(), "/books");
    }

    #[test]
    fn test_null_payload_answers_no_content() {
        let ctx = context("/");
        ctx.set_payload(Payload::Data(Value::Null));

        assert_eq!(ctx.status(), Some(StatusCode::NO_CONTENT));
        assert!(ctx.payload().is_empty());
    }

    #[test]
    fn test_finish_sets_content_type_and_cookies() {
        let ctx = context("/");
        ctx.set_payload(Payload::Text("pong".to_string()));
        ctx.set_cookie("a", "1", &CookieOptions::default());
        ctx.set_cookie("b", "2", &CookieOptions::default());

        let response = ctx.finish();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }

    #[test]
    fn test_session_tracks_changes() {
        let ctx = MiddlewareContext::new(context("/"));
        let session = ctx.session();
        assert!(session.is_empty());

        session.set("user", "alice");
        assert_eq!(session.get_as::<String>("user").as_deref(), Some("alice"));
        assert!(ctx.0.with(|state| state.session.dirty));
    }

    #[test]
    fn test_headers_view() {
        let ctx = ControllerContext::new(context("/"));

        assert_eq!(ctx.header("x-token"), Some("secret"));
        assert_eq!(ctx.headers()["x-token"], json!("secret"));
    }
}
