//! In-process testing for octavo applications.
//!
//! [`TestAgent`] configures and boots an application, then sends requests
//! straight into its router without binding a port. Cookies set by
//! responses are replayed on later requests, so sessions survive between
//! calls of the same agent.
//!
//! ```no_run
//! # use octavo::prelude::*;
//! # struct App;
//! # #[async_trait]
//! # impl Application for App {}
//! # impl Annotated for App {
//! #     fn annotate() -> octavo::Result<()> {
//! #         Annotate::<App>::new().application([], |_| Ok(App))
//! #     }
//! # }
//! use octavo_testing::TestAgent;
//!
//! # async fn run() -> octavo::Result<()> {
//! let agent = TestAgent::new::<App>().await?;
//! let response = agent.get("/ping").send().await;
//! assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! # Ok(())
//! # }
//! ```

use axum::body::{Body, Bytes};
use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode};
use octavo::application::Application;
use octavo::di::Annotated;
use octavo::Kernel;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tower::ServiceExt;

/// Sends requests to a configured application.
#[derive(Clone)]
pub struct TestAgent {
    router: axum::Router,
    cookies: Arc<Mutex<BTreeMap<String, String>>>,
}

impl TestAgent {
    /// Creates, configures and boots `A`.
    pub async fn new<A: Application + Annotated>() -> octavo::Result<Self> {
        let mut kernel = Kernel::new::<A>()?;
        kernel.configure().await?.boot().await?;
        Self::from_kernel(&kernel)
    }

    /// Agent over an already configured kernel.
    pub fn from_kernel(kernel: &Kernel) -> octavo::Result<Self> {
        Ok(Self {
            router: kernel.router()?,
            cookies: Arc::default(),
        })
    }

    pub fn get(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PUT, path)
    }

    pub fn patch(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::PATCH, path)
    }

    pub fn delete(&self, path: &str) -> TestRequest<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> TestRequest<'_> {
        TestRequest {
            agent: self,
            method,
            path: path.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Cookie currently stored under `name`.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.jar().get(name).cloned()
    }

    fn jar(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cookie_header(&self) -> Option<String> {
        let jar = self.jar();
        if jar.is_empty() {
            return None;
        }
        let pairs: Vec<String> = jar.iter().map(|(name, value)| format!("{name}={value}")).collect();
        Some(pairs.join("; "))
    }

    fn store_cookies(&self, headers: &HeaderMap) {
        let mut jar = self.jar();
        for header in headers.get_all(SET_COOKIE) {
            let Ok(header) = header.to_str() else {
                continue;
            };
            let pair = header.split(';').next().unwrap_or_default();
            if let Some((name, value)) = pair.split_once('=') {
                jar.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }
}

/// A request being built.
pub struct TestRequest<'a> {
    agent: &'a TestAgent,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl TestRequest<'_> {
    /// # Panics
    /// When `name` or `value` is not a valid header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        let name = HeaderName::try_from(name)
            .unwrap_or_else(|err| panic!("invalid header name {name:?}: {err}"));
        let value = HeaderValue::try_from(value)
            .unwrap_or_else(|err| panic!("invalid header value {value:?}: {err}"));
        self.headers.insert(name, value);
        self
    }

    pub fn json<T: Serialize>(self, body: &T) -> Self {
        let bytes = serde_json::to_vec(body)
            .unwrap_or_else(|err| panic!("cannot serialize request body: {err}"));
        self.body(bytes, "application/json")
    }

    pub fn form<T: Serialize>(self, body: &T) -> Self {
        let encoded = serde_urlencoded::to_string(body)
            .unwrap_or_else(|err| panic!("cannot encode request form: {err}"));
        self.body(encoded, "application/x-www-form-urlencoded")
    }

    pub fn text(self, body: &str) -> Self {
        self.body(body.to_string(), "text/plain")
    }

    /// Raw body with its content type.
    pub fn body(mut self, body: impl Into<Bytes>, content_type: &str) -> Self {
        self.body = body.into();
        self.header(CONTENT_TYPE.as_str(), content_type)
    }

    /// # Panics
    /// When the request cannot be built or its response body cannot be read.
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method).uri(self.path.as_str());
        if let Some(headers) = builder.headers_mut() {
            headers.extend(self.headers);
            if let Some(cookies) = self.agent.cookie_header() {
                if !headers.contains_key(COOKIE) {
                    if let Ok(value) = HeaderValue::from_str(&cookies) {
                        headers.insert(COOKIE, value);
                    }
                }
            }
        }
        let request = builder
            .body(Body::from(self.body))
            .unwrap_or_else(|err| panic!("invalid request to {}: {err}", self.path));

        let response = match self.agent.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };

        let (parts, body) = response.into_parts();
        self.agent.store_cookies(&parts.headers);
        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .unwrap_or_else(|err| panic!("cannot read response body: {err}"));

        TestResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        }
    }
}

/// A buffered response.
#[derive(Debug, Clone)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Content type without parameters.
    pub fn content_type(&self) -> Option<&str> {
        let value = self.header(CONTENT_TYPE.as_str())?;
        Some(value.split(';').next().unwrap_or_default().trim())
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// # Panics
    /// When the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|err| panic!("response body is not the expected JSON ({err}): {}", self.text()))
    }
}
