//! # Network SDK
//!
//! A generic request pipeline: callers describe a request with a
//! delegate-specific descriptor, and a `NetworkController` drives it through
//! build, override, dispatch, parse and extract stages.
//!
//! This crate provides:
//!
//! - The `RequestDelegate` contract for request shapes
//! - The optional `RequestInterceptor` override authority
//! - A per-stage `EventBus` for logging, metrics and tracing sinks
//! - A three-phase error taxonomy
//! - A reqwest-backed transport and bundled JSON and upload shapes
//!
//! ## Architecture
//!
//! - `NetworkController`: The engine; one `send` is one run
//! - `RequestDelegate`: Pure transforms for one request shape
//! - `RequestInterceptor`: Rewrites stage values, identity by default
//! - `Transport` / `Session`: Dispatches the built `HttpRequest`
//! - `EventBus`: Observes every stage boundary
//! - `ControllerError`: Preprocessing, network or postprocessing failure
//!
//! ```no_run
//! use network_sdk::services::{ApiCall, JsonApi};
//! use network_sdk::NetworkController;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = NetworkController::new();
//! let api = JsonApi::<(), serde_json::Value>::new("https://api.example.com")?;
//! let item = controller.send(&api, ApiCall::get("items/7")).await?;
//! println!("{}", item);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod events;
pub mod services;
pub mod util;

pub use crate::config::{ConfigProvider, ServiceConfig, TransportConfig};
pub use crate::controller::NetworkController;
pub use crate::core::{
    ControllerBuilder, HttpRequest, IdentificationInfo, Payload, RawResponse, RequestDelegate,
    RequestInfo, RequestInterceptor, Session, Transport, TransportCall,
};
pub use crate::error::{ControllerError, Phase, Result, StageResult, TransportError};
pub use crate::events::{EventBus, LogHandler, Stage, StandardLogHandler};

#[cfg(test)]
mod tests;
