//! Transport-level values
//!
//! These are the concrete shapes exchanged with the transport collaborator:
//! the fully built `HttpRequest`, the `Session` that dispatches it, the
//! `TransportCall` pair handed to dispatch, and the `RawResponse` pair it
//! returns.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use super::Transport;
use crate::error::{StageResult, TransportError};
use crate::services::http::HttpTransport;

/// Process-wide default session backed by the HTTP transport
static SHARED_SESSION: Lazy<Session> =
    Lazy::new(|| Session::named("shared", HttpTransport::default()));

/// A fully resolved HTTP request, ready for dispatch
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Per-request timeout, overriding the transport default
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: Url) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn put(url: Url) -> Self {
        Self::new(Method::PUT, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header, replacing any previous value
    pub fn header(mut self, name: &str, value: &str) -> StageResult<Self> {
        self.insert_header(name, value)?;
        Ok(self)
    }

    /// Insert a header in place, replacing any previous value
    pub fn insert_header(&mut self, name: &str, value: &str) -> StageResult<()> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Serialize a JSON body and set the content type
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> StageResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get a header value as a string, if present and valid
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body length in bytes
    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, Vec::len)
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Handle to the transport that will dispatch a request
///
/// Cloning is cheap; all clones share the same transport.
#[derive(Clone)]
pub struct Session {
    name: Arc<str>,
    transport: Arc<dyn Transport>,
}

impl Session {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::named("session", transport)
    }

    pub fn named(name: &str, transport: impl Transport + 'static) -> Self {
        Self::from_arc(name, Arc::new(transport))
    }

    pub fn from_arc(name: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            name: Arc::from(name),
            transport,
        }
    }

    /// The process-wide default HTTP session
    pub fn shared() -> Self {
        SHARED_SESSION.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dispatch a request through this session's transport
    pub async fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self.transport.dispatch(request).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("name", &self.name).finish()
    }
}

/// The session and request pair handed to dispatch
#[derive(Debug, Clone)]
pub struct TransportCall {
    pub session: Session,
    pub request: HttpRequest,
}

impl TransportCall {
    pub fn new(session: Session, request: HttpRequest) -> Self {
        Self { session, request }
    }
}

impl fmt::Display for TransportCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (session {})", self.request, self.session.name())
    }
}

/// Response metadata returned alongside the raw body
#[derive(Debug, Clone)]
pub struct ResponseMetadata {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Final URL after redirects
    pub url: Url,
}

/// Untyped response bytes plus metadata
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub body: Vec<u8>,
    pub metadata: ResponseMetadata,
}

impl RawResponse {
    pub fn new(status: StatusCode, url: Url, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            metadata: ResponseMetadata {
                status,
                headers: HeaderMap::new(),
                url,
            },
        }
    }

    /// Add a response header, replacing any previous value
    pub fn with_header(mut self, name: &str, value: &str) -> StageResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.metadata.headers.insert(name, value);
        Ok(self)
    }

    pub fn status(&self) -> StatusCode {
        self.metadata.status
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.metadata.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body decoded as UTF-8, lossy
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Body deserialized from JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}
