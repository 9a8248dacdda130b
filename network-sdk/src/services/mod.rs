//! Bundled transport and request shapes
//!
//! - `http`: the reqwest-backed `Transport`
//! - `rest`: JSON API calls through `JsonApi`
//! - `upload`: raw body uploads through `Uploader`
//! - `headers`: `HeaderInterceptor` for fixed headers such as credentials

pub mod headers;
pub mod http;
pub mod rest;
pub mod upload;
mod common;

pub use common::UserAgent;
pub use headers::HeaderInterceptor;
pub use http::HttpTransport;
pub use rest::{ApiCall, ApiRequest, JsonApi, JsonResponse};
pub use upload::{UploadDescriptor, UploadReceipt, Uploader};
