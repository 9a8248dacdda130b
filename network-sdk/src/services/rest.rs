//! JSON API request shape
//!
//! `JsonApi<B, T>` sends an `ApiCall<B>` relative to a base URL, serializing
//! `B` as the JSON body and deserializing a successful response into `T`.
//! Non-success statuses fail the run with an `HttpStatusError` during
//! postprocessing.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::ApiConfig;
use crate::core::{HttpRequest, RawResponse, RequestDelegate, RequestInfo, Session};
use crate::error::{ConfigError, HttpStatusError, StageResult};

/// What to call: verb, path relative to the base URL, query and body
#[derive(Debug, Clone)]
pub struct ApiCall<B = ()> {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<B>,
}

impl<B> ApiCall<B> {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post(path: impl Into<String>, body: B) -> Self {
        Self::new(Method::POST, path).body(body)
    }

    pub fn put(path: impl Into<String>, body: B) -> Self {
        Self::new(Method::PUT, path).body(body)
    }

    pub fn body(mut self, body: B) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A call resolved against the base URL, with its body already serialized
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
}

/// Successful response with its decoded body
#[derive(Debug, Clone)]
pub struct JsonResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
}

/// Delegate for JSON APIs
pub struct JsonApi<B, T> {
    base_url: Url,
    headers: HeaderMap,
    session: Option<Session>,
    timeout: Option<Duration>,
    _marker: PhantomData<fn(B) -> T>,
}

impl<B, T> JsonApi<B, T> {
    /// Create a delegate for the API rooted at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::invalid("base_url", e))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            headers: HeaderMap::new(),
            session: None,
            timeout: None,
            _marker: PhantomData,
        })
    }

    /// Create a delegate from a loaded `ApiConfig`
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        let mut api = Self::new(&config.base_url)?;
        if let Some(ref key) = config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| ConfigError::invalid(format!("{}_api_key", config.name), e))?;
            value.set_sensitive(true);
            api.headers.insert(reqwest::header::AUTHORIZATION, value);
        }
        api.timeout = config.timeout_seconds.map(Duration::from_secs);
        Ok(api)
    }

    /// Header sent with every call of this delegate
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let header_name = name
            .parse::<reqwest::header::HeaderName>()
            .map_err(|e| ConfigError::invalid(name, e))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::invalid(name, e))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Dispatch through `session` instead of the shared one
    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl<B, T> fmt::Debug for JsonApi<B, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonApi")
            .field("base_url", &self.base_url.as_str())
            .field("session", &self.session)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<B, T> RequestDelegate for JsonApi<B, T>
where
    B: Serialize + fmt::Debug + Send + Sync + 'static,
    T: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    type Descriptor = ApiCall<B>;
    type Request = ApiRequest;
    type Response = JsonResponse<T>;
    type Content = T;

    fn build_request(&self, call: ApiCall<B>, _info: &RequestInfo) -> StageResult<ApiRequest> {
        let mut url = self.base_url.join(call.path.trim_start_matches('/'))?;
        if !call.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&call.query);
        }

        let body = call.body.as_ref().map(serde_json::to_value).transpose()?;

        Ok(ApiRequest {
            method: call.method,
            url,
            headers: self.headers.clone(),
            body,
        })
    }

    fn session(&self, _request: &ApiRequest, _info: &RequestInfo) -> StageResult<Session> {
        Ok(self.session.clone().unwrap_or_else(Session::shared))
    }

    fn http_request(&self, request: &ApiRequest, _info: &RequestInfo) -> StageResult<HttpRequest> {
        let mut http = HttpRequest::new(request.method.clone(), request.url.clone());
        http.headers = request.headers.clone();
        http.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(ref body) = request.body {
            http = http.json(body)?;
        }
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        Ok(http)
    }

    fn parse_response(&self, raw: RawResponse, _info: &RequestInfo) -> StageResult<JsonResponse<T>> {
        let status = raw.status();
        if !status.is_success() {
            return Err(HttpStatusError::new(status, &raw.body).into());
        }

        // An empty body decodes as JSON null, so `()` and `Option<_>` accept 204s
        let bytes: &[u8] = if raw.body.is_empty() { b"null" } else { &raw.body };
        let body = serde_json::from_slice(bytes)?;

        Ok(JsonResponse {
            status,
            headers: raw.metadata.headers,
            body,
        })
    }

    fn extract_content(&self, response: JsonResponse<T>, _info: &RequestInfo) -> StageResult<T> {
        Ok(response.body)
    }
}
