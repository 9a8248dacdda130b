//! Raw body upload request shape

use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE, ETAG, LOCATION};
use reqwest::{Method, StatusCode};
use url::Url;

use crate::core::{HttpRequest, RawResponse, RequestDelegate, RequestInfo, Session};
use crate::error::{ConfigError, HttpStatusError, StageResult};

/// One upload: target path, media type and payload
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub path: String,
    pub content_type: String,
    pub data: Vec<u8>,
    /// `PUT` unless overridden
    pub method: Method,
}

impl UploadDescriptor {
    pub fn new(path: impl Into<String>, content_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
            data: data.into(),
            method: Method::PUT,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }
}

/// An upload resolved against the target URL
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub method: Method,
    pub url: Url,
    pub content_type: HeaderValue,
    pub data: Vec<u8>,
}

/// What the server reported about a stored upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: StatusCode,
    pub location: Option<String>,
    pub etag: Option<String>,
}

/// Delegate for uploading raw bodies below a base URL
#[derive(Debug, Clone)]
pub struct Uploader {
    base_url: Url,
    session: Option<Session>,
    timeout: Option<Duration>,
}

impl Uploader {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let mut base_url = Url::parse(base_url).map_err(|e| ConfigError::invalid("base_url", e))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            base_url,
            session: None,
            timeout: None,
        })
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl RequestDelegate for Uploader {
    type Descriptor = UploadDescriptor;
    type Request = UploadRequest;
    type Response = UploadReceipt;
    type Content = UploadReceipt;

    fn build_request(&self, upload: UploadDescriptor, _info: &RequestInfo) -> StageResult<UploadRequest> {
        if upload.path.trim_matches('/').is_empty() {
            return Err("upload path must name a resource".into());
        }

        Ok(UploadRequest {
            method: upload.method,
            url: self.base_url.join(upload.path.trim_start_matches('/'))?,
            content_type: HeaderValue::from_str(&upload.content_type)?,
            data: upload.data,
        })
    }

    fn session(&self, _request: &UploadRequest, _info: &RequestInfo) -> StageResult<Session> {
        Ok(self.session.clone().unwrap_or_else(Session::shared))
    }

    fn http_request(&self, request: &UploadRequest, _info: &RequestInfo) -> StageResult<HttpRequest> {
        let mut http = HttpRequest::new(request.method.clone(), request.url.clone()).body(request.data.clone());
        http.headers.insert(CONTENT_TYPE, request.content_type.clone());
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        Ok(http)
    }

    fn parse_response(&self, raw: RawResponse, _info: &RequestInfo) -> StageResult<UploadReceipt> {
        let status = raw.status();
        if !status.is_success() {
            return Err(HttpStatusError::new(status, &raw.body).into());
        }

        Ok(UploadReceipt {
            status,
            location: raw.header_str(LOCATION.as_str()).map(str::to_string),
            etag: raw.header_str(ETAG.as_str()).map(str::to_string),
        })
    }

    fn extract_content(&self, receipt: UploadReceipt, _info: &RequestInfo) -> StageResult<UploadReceipt> {
        Ok(receipt)
    }
}
