//! HTTP transport backed by reqwest

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;

use crate::config::TransportConfig;
use crate::core::{HttpRequest, RawResponse, ResponseMetadata, Transport};
use crate::error::mapping::map_reqwest_error;
use crate::error::{ConfigError, TransportError};

/// Dispatches requests with a shared reqwest `Client`
///
/// The whole body is read before returning, so a `RawResponse` is always
/// complete. Dropping the dispatch future aborts the request.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from transport settings
    pub fn from_config(config: &TransportConfig) -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.default_headers {
            let header_name = HeaderName::from_str(name)
                .map_err(|e| ConfigError::invalid("transport_default_headers", e))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::invalid("transport_default_headers", e))?;
            headers.insert(header_name, header_value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .gzip(config.gzip)
            .cookie_store(config.cookies)
            .default_headers(headers)
            .build()
            .map_err(|e| ConfigError::validation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        log::trace!(target: "network_sdk::http", "Dispatching {}", request);

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        log::trace!(target: "network_sdk::http", "Received {} from {} ({} bytes)", status, url, body.len());

        Ok(RawResponse {
            body: body.to_vec(),
            metadata: ResponseMetadata { status, headers, url },
        })
    }
}
