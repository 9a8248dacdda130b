//! Error mapping for the HTTP transport
//!
//! This module converts reqwest failures into `TransportError` values and
//! classifies HTTP statuses for the bundled delegates and for callers that
//! implement their own retry policy.

use reqwest::StatusCode;
use serde_json::Value;

use super::{TransportError, TransportErrorKind};
use crate::util::truncate_string;

/// Maximum number of body characters kept in an error description
const MAX_BODY_IN_MESSAGE: usize = 100;

/// Map a reqwest error to a transport error, keeping it as the source
pub fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_connect() {
        TransportErrorKind::Connect
    } else if err.is_redirect() {
        TransportErrorKind::Redirect
    } else if err.is_body() {
        TransportErrorKind::Body
    } else if err.is_decode() {
        TransportErrorKind::Decode
    } else if err.is_request() || err.is_builder() {
        TransportErrorKind::Request
    } else {
        TransportErrorKind::Other
    };

    let message = match err.url() {
        Some(url) => format!("{} ({})", err, url),
        None => err.to_string(),
    };

    TransportError::new(kind, message).with_source(err)
}

/// Build a human-readable description of an HTTP error response
pub fn describe_http_error(status: StatusCode, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);

    // Try to parse as JSON first
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        let message = json
            .get("message")
            .or_else(|| json.get("error").and_then(|e| e.get("message").or(Some(e))))
            .and_then(|m| m.as_str());

        if let Some(message) = message {
            return format!("{}: {}", status, message);
        }
    }

    // Fallback to status-based description
    if text.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, truncate_string(text.trim(), MAX_BODY_IN_MESSAGE))
    }
}

/// Helper function to classify HTTP statuses by category
pub fn classify_http_status(status: StatusCode) -> &'static str {
    match status.as_u16() {
        200..=299 => "success",
        300..=399 => "redirect",
        400 => "validation",
        401 => "authentication",
        403 => "authorization",
        404 => "not_found",
        408 => "timeout",
        429 => "rate_limit",
        500..=599 => "server",
        _ => "unknown",
    }
}

/// Determine if an HTTP status code indicates a retryable error
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
}

/// Determine if a transport error kind indicates a retryable failure
pub fn is_retryable_transport(kind: TransportErrorKind) -> bool {
    matches!(kind, TransportErrorKind::Timeout | TransportErrorKind::Connect)
}
