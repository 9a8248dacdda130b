//! Consolidated log records
//!
//! A `LogRecord` pairs a run's `RequestInfo` with one of three categories:
//! the dispatched transport call, the raw response, or the terminal error.
//! Records are produced from stage events and consumed by `LogHandler` sinks.

use std::fmt::Write as _;

use crate::core::{RawResponse, RequestInfo, TransportCall};
use crate::error::ControllerError;
use crate::util::{sanitize_for_logging, truncate_string};

const LOG_TARGET: &str = "network_sdk::controller";

/// What a log record describes
#[derive(Debug, Clone, Copy)]
pub enum Category<'a> {
    Request(&'a TransportCall),
    Response(&'a RawResponse),
    Error(&'a ControllerError),
}

/// Read-only record handed to log sinks
#[derive(Debug, Clone, Copy)]
pub struct LogRecord<'a> {
    pub info: &'a RequestInfo,
    pub category: Category<'a>,
}

impl<'a> LogRecord<'a> {
    pub fn new(info: &'a RequestInfo, category: Category<'a>) -> Self {
        Self { info, category }
    }

    /// Render this record with a converter
    pub fn convert<C: LogRecordConverter + ?Sized>(&self, converter: &C) -> String {
        converter.convert(self)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.category, Category::Error(_))
    }
}

/// Sink for consolidated log records
pub trait LogHandler: Send + Sync {
    fn log(&self, record: &LogRecord<'_>);
}

impl<F> LogHandler for F
where
    F: Fn(&LogRecord<'_>) + Send + Sync,
{
    fn log(&self, record: &LogRecord<'_>) {
        self(record)
    }
}

/// Turns a record into a human-readable string
pub trait LogRecordConverter: Send + Sync {
    fn convert(&self, record: &LogRecord<'_>) -> String;
}

/// Single-line converter with credential redaction
#[derive(Debug, Clone)]
pub struct PlainConverter {
    /// Maximum number of body characters included
    pub max_body: usize,
    /// Include request headers in request records
    pub include_headers: bool,
}

impl Default for PlainConverter {
    fn default() -> Self {
        Self {
            max_body: 256,
            include_headers: false,
        }
    }
}

impl PlainConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_headers(mut self) -> Self {
        self.include_headers = true;
        self
    }

    pub fn max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    fn body_preview(&self, body: &[u8]) -> String {
        if body.is_empty() || self.max_body == 0 {
            return String::new();
        }
        let text = String::from_utf8_lossy(body);
        format!(" {}", truncate_string(text.trim(), self.max_body))
    }
}

impl LogRecordConverter for PlainConverter {
    fn convert(&self, record: &LogRecord<'_>) -> String {
        let mut line = record.info.to_string();

        // Writing to a String cannot fail
        match record.category {
            Category::Request(call) => {
                let _ = write!(
                    line,
                    " -> {} via {} ({} bytes)",
                    call.request,
                    call.session.name(),
                    call.request.body_len()
                );
                if self.include_headers {
                    for (name, value) in &call.request.headers {
                        let value = if value.is_sensitive() {
                            "[REDACTED]"
                        } else {
                            value.to_str().unwrap_or("<binary>")
                        };
                        let _ = write!(line, " [{}: {}]", name, value);
                    }
                }
                if let Some(ref body) = call.request.body {
                    line.push_str(&self.body_preview(body));
                }
            }
            Category::Response(raw) => {
                let _ = write!(
                    line,
                    " <- {} {} ({} bytes){}",
                    raw.status(),
                    raw.metadata.url,
                    raw.body.len(),
                    self.body_preview(&raw.body)
                );
            }
            Category::Error(error) => {
                let _ = write!(line, " !! {} failure: {}", error.phase(), error);
            }
        }

        sanitize_for_logging(&line)
    }
}

/// Forwards records to the `log` facade
///
/// Requests and responses are logged at `debug`, errors at `error`.
#[derive(Debug, Clone, Default)]
pub struct StandardLogHandler<C = PlainConverter> {
    converter: C,
}

impl StandardLogHandler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: LogRecordConverter> StandardLogHandler<C> {
    pub fn with_converter(converter: C) -> Self {
        Self { converter }
    }
}

impl<C: LogRecordConverter> LogHandler for StandardLogHandler<C> {
    fn log(&self, record: &LogRecord<'_>) {
        if record.is_error() {
            if log::log_enabled!(target: LOG_TARGET, log::Level::Error) {
                log::error!(target: LOG_TARGET, "{}", record.convert(&self.converter));
            }
        } else if log::log_enabled!(target: LOG_TARGET, log::Level::Debug) {
            log::debug!(target: LOG_TARGET, "{}", record.convert(&self.converter));
        }
    }
}
