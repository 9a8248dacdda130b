//! The pipeline engine
//!
//! `NetworkController` turns a delegate and a descriptor into content by
//! walking a fixed sequence of states. At each of the five delegate-produced
//! values it calls the delegate, emits the unmodified event, calls the
//! interceptor, and emits the post-override event. The only suspension point
//! is the transport dispatch; dropping the returned future cancels the
//! dispatch and no further events fire for that run.

mod state;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::Instrument;

use crate::core::{ControllerBuilder, IdentificationInfo, RequestDelegate, RequestInfo, RequestInterceptor};
use crate::error::{ControllerError, Result};
use crate::events::{panic_message, EventBus, LogHandler, Stage};
use state::RunState;

const LOG_TARGET: &str = "network_sdk::controller";

/// Executes request delegates through the stage pipeline
///
/// The interceptor and identification are fixed at construction. The event
/// bus accepts new subscribers at any time.
pub struct NetworkController {
    identification: IdentificationInfo,
    source: Vec<String>,
    interceptor: Option<Arc<dyn RequestInterceptor>>,
    events: EventBus,
}

impl NetworkController {
    /// Create a controller with default settings, identified by the caller's location
    #[track_caller]
    pub fn new() -> Self {
        ControllerBuilder::new().build()
    }

    /// Create a new builder, identified by the caller's location
    #[track_caller]
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::new()
    }

    pub(crate) fn from_parts(
        identification: IdentificationInfo,
        source: Vec<String>,
        interceptor: Option<Arc<dyn RequestInterceptor>>,
        events: EventBus,
    ) -> Self {
        Self {
            identification,
            source,
            interceptor,
            events,
        }
    }

    pub fn identification(&self) -> &IdentificationInfo {
        &self.identification
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn has_interceptor(&self) -> bool {
        self.interceptor.is_some()
    }

    /// The event bus for this controller
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Register subscribers on the event bus
    pub fn logging(&self, configure: impl FnOnce(&EventBus)) -> &Self {
        configure(&self.events);
        self
    }

    /// Attach a consolidated log sink
    pub fn log_handler(&self, handler: impl LogHandler + 'static) -> &Self {
        self.events.log_handler(Arc::new(handler));
        self
    }

    /// Run a delegate for one descriptor
    pub async fn send<D: RequestDelegate>(
        &self,
        delegate: &D,
        descriptor: D::Descriptor,
    ) -> Result<D::Content> {
        let info = RequestInfo::new(None).extended(&self.identification, &self.source, None);
        self.run(delegate, descriptor, info).await
    }

    /// Run a delegate with a human label recorded in the request info
    pub async fn send_labeled<D: RequestDelegate>(
        &self,
        delegate: &D,
        descriptor: D::Descriptor,
        label: impl Into<String>,
    ) -> Result<D::Content> {
        let info = RequestInfo::new(Some(label.into())).extended(&self.identification, &self.source, None);
        self.run(delegate, descriptor, info).await
    }

    /// Run a delegate on behalf of another run
    ///
    /// The parent's info is extended with this controller's identification
    /// and source; the correlation id is kept.
    pub async fn send_nested<D: RequestDelegate>(
        &self,
        delegate: &D,
        descriptor: D::Descriptor,
        parent: &RequestInfo,
    ) -> Result<D::Content> {
        let info = parent.extended(&self.identification, &self.source, None);
        self.run(delegate, descriptor, info).await
    }

    async fn run<D: RequestDelegate>(
        &self,
        delegate: &D,
        descriptor: D::Descriptor,
        info: RequestInfo,
    ) -> Result<D::Content> {
        let span = tracing::debug_span!(
            "network_request",
            request_id = %info.id(),
            label = info.label().unwrap_or_default()
        );

        async {
            log::debug!(target: LOG_TARGET, "Request {} started by {}", info.id(), self.identification);

            let mut state = RunState::<D>::Described(descriptor);
            loop {
                state = match state {
                    RunState::Completed(content) => {
                        log::debug!(target: LOG_TARGET, "Request {} completed", info.id());
                        return Ok(content);
                    }
                    current => {
                        log::trace!(target: LOG_TARGET, "Request {} leaving {}", info.id(), current.name());
                        match self.advance(delegate, current, &info).await {
                            Ok(next) => next,
                            Err(error) => {
                                self.fail(delegate, &error, &info);
                                return Err(error);
                            }
                        }
                    }
                };
            }
        }
        .instrument(span)
        .await
    }

    /// Perform one transition
    async fn advance<D: RequestDelegate>(
        &self,
        delegate: &D,
        state: RunState<D>,
        info: &RequestInfo,
    ) -> Result<RunState<D>> {
        let phase = state.phase();
        let classify = |cause| ControllerError::classify(phase, cause);
        let interceptor = self.interceptor.as_deref();

        let next = match state {
            RunState::Described(descriptor) => {
                self.events.publish_payload(Stage::Delegate, info, &descriptor);
                let request = delegate.build_request(descriptor, info).map_err(classify)?;
                self.events.publish_payload(Stage::UnmodifiedRequest, info, &request);
                RunState::Built(request)
            }
            RunState::Built(mut request) => {
                if let Some(interceptor) = interceptor {
                    interceptor.request(&mut request, info).map_err(classify)?;
                }
                self.events.publish_payload(Stage::Request, info, &request);
                RunState::RequestOverridden(request)
            }
            RunState::RequestOverridden(request) => {
                let call = delegate.build_transport_call(&request, info).map_err(classify)?;
                self.events.publish_transport_call(Stage::UnmodifiedTransportCall, info, &call);
                RunState::CallBuilt(call)
            }
            RunState::CallBuilt(call) => {
                let call = match interceptor {
                    Some(interceptor) => interceptor.transport_call(call, info).map_err(classify)?,
                    None => call,
                };
                self.events.publish_transport_call(Stage::TransportCall, info, &call);
                RunState::CallOverridden(call)
            }
            RunState::CallOverridden(call) => {
                let raw = match call.session.dispatch(&call.request).await {
                    Ok(raw) => raw,
                    Err(source) => return Err(ControllerError::network(call, source)),
                };
                self.events.publish_raw_response(Stage::RawResponse, info, &raw);
                RunState::Dispatched(raw)
            }
            RunState::Dispatched(raw) => {
                let raw = match interceptor {
                    Some(interceptor) => interceptor.raw_response(raw, info).map_err(classify)?,
                    None => raw,
                };
                self.events.publish_raw_response(Stage::ModifiedRawResponse, info, &raw);
                RunState::RawResponseOverridden(raw)
            }
            RunState::RawResponseOverridden(raw) => {
                let response = delegate.parse_response(raw, info).map_err(classify)?;
                self.events.publish_payload(Stage::Response, info, &response);
                RunState::Parsed(response)
            }
            RunState::Parsed(mut response) => {
                if let Some(interceptor) = interceptor {
                    interceptor.response(&mut response, info).map_err(classify)?;
                }
                self.events.publish_payload(Stage::ModifiedResponse, info, &response);
                RunState::ResponseOverridden(response)
            }
            RunState::ResponseOverridden(response) => {
                let content = delegate.extract_content(response, info).map_err(classify)?;
                self.events.publish_payload(Stage::Content, info, &content);
                RunState::Extracted(content)
            }
            RunState::Extracted(mut content) => {
                if let Some(interceptor) = interceptor {
                    interceptor.content(&mut content, info).map_err(classify)?;
                }
                self.events.publish_payload(Stage::ModifiedContent, info, &content);
                RunState::Completed(content)
            }
            completed @ RunState::Completed(_) => completed,
        };

        Ok(next)
    }

    /// Notify the delegate, the interceptor and the bus, in that order
    fn fail<D: RequestDelegate>(&self, delegate: &D, error: &ControllerError, info: &RequestInfo) {
        log::warn!(target: LOG_TARGET, "Request {} failed: {}", info.id(), error);

        isolate("delegate error hook", info, || delegate.on_error(error, info));
        if let Some(ref interceptor) = self.interceptor {
            isolate("interceptor error hook", info, || interceptor.error(error, info));
        }
        self.events.publish_error(info, error);
    }
}

impl std::fmt::Debug for NetworkController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkController")
            .field("identification", &self.identification)
            .field("source", &self.source)
            .field("interceptor", &self.interceptor.is_some())
            .field("events", &self.events)
            .finish()
    }
}

/// Error hooks must not fail; a panic is logged and otherwise ignored
fn isolate(hook: &str, info: &RequestInfo, f: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
        log::error!(
            target: LOG_TARGET,
            "The {} panicked on request {}: {}",
            hook,
            info.id(),
            panic_message(panic.as_ref())
        );
    }
}
