//! Core abstractions for the Network SDK
//!
//! This module provides the contracts the pipeline engine is built on:
//!
//! - `RequestDelegate`: One implementation per request shape; supplies the
//!   pure transforms from descriptor to content
//! - `RequestInterceptor`: The optional override authority that may rewrite
//!   the value produced by any stage
//! - `Transport`: The collaborator that dispatches a built HTTP request
//! - `Payload`: Bound for delegate-specific values carried by stage events
//! - `ControllerBuilder`: Builder pattern for creating controllers

pub mod builder;
pub mod info;
pub mod transport;

pub use builder::ControllerBuilder;
pub use info::{IdentificationInfo, RequestInfo};
pub use transport::{HttpRequest, RawResponse, ResponseMetadata, Session, TransportCall};

use std::any::Any;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::{ControllerError, StageResult, TransportError};

/// A delegate-specific value flowing through the pipeline
///
/// Implemented for every `Debug + Send + Sync + 'static` type, so events can
/// carry it both printable and downcastable.
pub trait Payload: Any + Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any + Debug + Send + Sync> Payload for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Payload {
    /// View the payload as a concrete type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

/// Transforms for one request shape
///
/// Every transform must be pure with respect to controller state. Failures
/// before the transport call are reported as preprocessing failures, failures
/// after it as postprocessing failures.
pub trait RequestDelegate: Send + Sync {
    /// Caller-supplied value describing what to request
    type Descriptor: Payload;
    /// Shape-specific built request
    type Request: Payload;
    /// Parsed response
    type Response: Payload;
    /// Final domain value returned to the caller
    type Content: Payload;

    /// Build the request from the descriptor
    fn build_request(
        &self,
        descriptor: Self::Descriptor,
        info: &RequestInfo,
    ) -> StageResult<Self::Request>;

    /// Session that should dispatch the request
    fn session(&self, _request: &Self::Request, _info: &RequestInfo) -> StageResult<Session> {
        Ok(Session::shared())
    }

    /// Concrete HTTP parameters (target, verb, headers, body)
    fn http_request(&self, request: &Self::Request, info: &RequestInfo) -> StageResult<HttpRequest>;

    /// Build the transport call pair
    fn build_transport_call(
        &self,
        request: &Self::Request,
        info: &RequestInfo,
    ) -> StageResult<TransportCall> {
        Ok(TransportCall::new(
            self.session(request, info)?,
            self.http_request(request, info)?,
        ))
    }

    /// Parse the raw response pair
    fn parse_response(&self, raw: RawResponse, info: &RequestInfo) -> StageResult<Self::Response>;

    /// Extract the content handed back to the caller
    fn extract_content(
        &self,
        response: Self::Response,
        info: &RequestInfo,
    ) -> StageResult<Self::Content>;

    /// Called exactly once per terminal failure
    fn on_error(&self, _error: &ControllerError, _info: &RequestInfo) {}
}

/// Cross-cutting override authority attached to a controller
///
/// Every hook defaults to identity. Delegate-specific values are rewritten
/// in place through `downcast_mut`; transport values are rewritten by value.
/// A hook failure is classified by the phase it happens in.
pub trait RequestInterceptor: Send + Sync {
    /// Rewrite the built request
    fn request(&self, _request: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
        Ok(())
    }

    /// Rewrite the transport call before dispatch
    fn transport_call(&self, call: TransportCall, _info: &RequestInfo) -> StageResult<TransportCall> {
        Ok(call)
    }

    /// Rewrite the raw response pair
    fn raw_response(&self, raw: RawResponse, _info: &RequestInfo) -> StageResult<RawResponse> {
        Ok(raw)
    }

    /// Rewrite the parsed response
    fn response(&self, _response: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
        Ok(())
    }

    /// Rewrite the extracted content
    fn content(&self, _content: &mut dyn Any, _info: &RequestInfo) -> StageResult<()> {
        Ok(())
    }

    /// Called after the delegate's error hook, once per terminal failure
    fn error(&self, _error: &ControllerError, _info: &RequestInfo) {}
}

/// Trait responsible for dispatching built HTTP requests
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch the request and return the full response body
    async fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}
