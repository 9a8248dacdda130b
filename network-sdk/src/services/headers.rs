//! Interceptor that stamps fixed headers onto every transport call

use std::str::FromStr;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::core::{RequestInfo, RequestInterceptor, TransportCall};
use crate::error::{ConfigError, StageResult};

/// Adds a fixed set of headers to every outgoing request
///
/// Existing values for the same header names are replaced.
#[derive(Debug, Clone, Default)]
pub struct HeaderInterceptor {
    headers: HeaderMap,
}

impl HeaderInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header; names and values are validated up front
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
        let header_name = HeaderName::from_str(name).map_err(|e| ConfigError::invalid(name, e))?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::invalid(name, e))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// `Authorization: Bearer <token>`, marked sensitive
    pub fn bearer(mut self, token: &str) -> Result<Self, ConfigError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ConfigError::invalid("authorization", e))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl RequestInterceptor for HeaderInterceptor {
    fn transport_call(&self, mut call: TransportCall, _info: &RequestInfo) -> StageResult<TransportCall> {
        for (name, value) in &self.headers {
            call.request.headers.insert(name.clone(), value.clone());
        }
        Ok(call)
    }
}
