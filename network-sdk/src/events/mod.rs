//! Stage events for pipeline runs
//!
//! The `EventBus` exposes one channel per stage boundary plus an aggregated
//! `on_any` subscription. Within a run, events are delivered synchronously and
//! in pipeline order on the run's own control path, so subscribers must not
//! block. A panicking subscriber is isolated: it is logged and the remaining
//! subscribers still receive the event.

pub mod record;

pub use record::{Category, LogHandler, LogRecord, LogRecordConverter, PlainConverter, StandardLogHandler};

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{Payload, RawResponse, RequestInfo, TransportCall};
use crate::error::ControllerError;

const LOG_TARGET: &str = "network_sdk::events";

/// Stage boundaries, in the order events fire for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Delegate,
    UnmodifiedRequest,
    Request,
    UnmodifiedTransportCall,
    TransportCall,
    RawResponse,
    ModifiedRawResponse,
    Response,
    ModifiedResponse,
    Content,
    ModifiedContent,
    /// Terminal, mutually exclusive with completion
    Error,
}

impl Stage {
    /// Every event of a successful run, in delivery order
    pub const SUCCESS_SEQUENCE: [Stage; 11] = [
        Stage::Delegate,
        Stage::UnmodifiedRequest,
        Stage::Request,
        Stage::UnmodifiedTransportCall,
        Stage::TransportCall,
        Stage::RawResponse,
        Stage::ModifiedRawResponse,
        Stage::Response,
        Stage::ModifiedResponse,
        Stage::Content,
        Stage::ModifiedContent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Delegate => "on_delegate",
            Stage::UnmodifiedRequest => "on_unmodified_request",
            Stage::Request => "on_request",
            Stage::UnmodifiedTransportCall => "on_unmodified_transport_call",
            Stage::TransportCall => "on_transport_call",
            Stage::RawResponse => "on_raw_response",
            Stage::ModifiedRawResponse => "on_modified_raw_response",
            Stage::Response => "on_response",
            Stage::ModifiedResponse => "on_modified_response",
            Stage::Content => "on_content",
            Stage::ModifiedContent => "on_modified_content",
            Stage::Error => "on_error",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single stage event: the run's info plus the stage's value
#[derive(Debug)]
pub struct Event<'a, T: ?Sized> {
    pub info: &'a RequestInfo,
    pub details: &'a T,
}

/// Value carried by an aggregated event
#[derive(Debug, Clone, Copy)]
pub enum StageDetails<'a> {
    Payload(&'a dyn Payload),
    TransportCall(&'a TransportCall),
    RawResponse(&'a RawResponse),
    Error(&'a ControllerError),
}

/// Event delivered to `on_any` subscribers
#[derive(Debug, Clone, Copy)]
pub struct StageEvent<'a> {
    pub stage: Stage,
    pub info: &'a RequestInfo,
    pub details: StageDetails<'a>,
}

type Callback<T> = dyn Fn(&Event<'_, T>) + Send + Sync;
type AnyCallback = dyn Fn(&StageEvent<'_>) + Send + Sync;

/// Subscriber list that can grow while runs are in flight
struct Subscribers<F: ?Sized> {
    inner: RwLock<Vec<Arc<F>>>,
}

impl<F: ?Sized> Subscribers<F> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, subscriber: Arc<F>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Copy of the current list; delivery never holds the lock
    fn snapshot(&self) -> Vec<Arc<F>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Publish point for one stage
pub struct Channel<T: ?Sized> {
    stage: Stage,
    subscribers: Subscribers<Callback<T>>,
}

impl<T: ?Sized> Channel<T> {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            subscribers: Subscribers::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn subscribe<F>(&self, subscriber: F)
    where
        F: Fn(&Event<'_, T>) + Send + Sync + 'static,
    {
        self.subscribers.push(Arc::new(subscriber));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn publish(&self, info: &RequestInfo, details: &T) {
        let event = Event { info, details };
        for subscriber in self.subscribers.snapshot() {
            deliver(self.stage, info, || subscriber(&event));
        }
    }
}

/// One channel per stage boundary plus the aggregated subscription
pub struct EventBus {
    delegate: Channel<dyn Payload>,
    unmodified_request: Channel<dyn Payload>,
    request: Channel<dyn Payload>,
    unmodified_transport_call: Channel<TransportCall>,
    transport_call: Channel<TransportCall>,
    raw_response: Channel<RawResponse>,
    modified_raw_response: Channel<RawResponse>,
    response: Channel<dyn Payload>,
    modified_response: Channel<dyn Payload>,
    content: Channel<dyn Payload>,
    modified_content: Channel<dyn Payload>,
    error: Channel<ControllerError>,
    any: Subscribers<AnyCallback>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self {
            delegate: Channel::new(Stage::Delegate),
            unmodified_request: Channel::new(Stage::UnmodifiedRequest),
            request: Channel::new(Stage::Request),
            unmodified_transport_call: Channel::new(Stage::UnmodifiedTransportCall),
            transport_call: Channel::new(Stage::TransportCall),
            raw_response: Channel::new(Stage::RawResponse),
            modified_raw_response: Channel::new(Stage::ModifiedRawResponse),
            response: Channel::new(Stage::Response),
            modified_response: Channel::new(Stage::ModifiedResponse),
            content: Channel::new(Stage::Content),
            modified_content: Channel::new(Stage::ModifiedContent),
            error: Channel::new(Stage::Error),
            any: Subscribers::new(),
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor observed, before the request is built
    pub fn on_delegate<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.delegate.subscribe(subscriber);
        self
    }

    /// Request as built by the delegate
    pub fn on_unmodified_request<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.unmodified_request.subscribe(subscriber);
        self
    }

    /// Request after the interceptor
    pub fn on_request<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.request.subscribe(subscriber);
        self
    }

    /// Transport call as built by the delegate
    pub fn on_unmodified_transport_call<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, TransportCall>) + Send + Sync + 'static,
    {
        self.unmodified_transport_call.subscribe(subscriber);
        self
    }

    /// Transport call after the interceptor, exactly as dispatched
    pub fn on_transport_call<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, TransportCall>) + Send + Sync + 'static,
    {
        self.transport_call.subscribe(subscriber);
        self
    }

    /// Raw response as returned by the transport
    pub fn on_raw_response<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, RawResponse>) + Send + Sync + 'static,
    {
        self.raw_response.subscribe(subscriber);
        self
    }

    /// Raw response after the interceptor
    pub fn on_modified_raw_response<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, RawResponse>) + Send + Sync + 'static,
    {
        self.modified_raw_response.subscribe(subscriber);
        self
    }

    pub fn on_response<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.response.subscribe(subscriber);
        self
    }

    pub fn on_modified_response<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.modified_response.subscribe(subscriber);
        self
    }

    pub fn on_content<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.content.subscribe(subscriber);
        self
    }

    pub fn on_modified_content<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, dyn Payload>) + Send + Sync + 'static,
    {
        self.modified_content.subscribe(subscriber);
        self
    }

    /// Terminal failure, fires at most once per run
    pub fn on_error<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&Event<'_, ControllerError>) + Send + Sync + 'static,
    {
        self.error.subscribe(subscriber);
        self
    }

    /// Every event of every run, in pipeline order per run
    pub fn on_any<F>(&self, subscriber: F) -> &Self
    where
        F: Fn(&StageEvent<'_>) + Send + Sync + 'static,
    {
        self.any.push(Arc::new(subscriber));
        self
    }

    /// Route dispatched calls, raw responses and terminal errors to a log sink
    pub fn log_handler(&self, handler: Arc<dyn LogHandler>) -> &Self {
        let requests = Arc::clone(&handler);
        self.on_transport_call(move |event| {
            requests.log(&LogRecord::new(event.info, Category::Request(event.details)))
        });
        let responses = Arc::clone(&handler);
        self.on_raw_response(move |event| {
            responses.log(&LogRecord::new(event.info, Category::Response(event.details)))
        });
        self.on_error(move |event| handler.log(&LogRecord::new(event.info, Category::Error(event.details))))
    }

    /// Number of subscribers registered for a stage, excluding `on_any`
    pub fn subscriber_count(&self, stage: Stage) -> usize {
        match stage {
            Stage::Delegate => self.delegate.subscriber_count(),
            Stage::UnmodifiedRequest => self.unmodified_request.subscriber_count(),
            Stage::Request => self.request.subscriber_count(),
            Stage::UnmodifiedTransportCall => self.unmodified_transport_call.subscriber_count(),
            Stage::TransportCall => self.transport_call.subscriber_count(),
            Stage::RawResponse => self.raw_response.subscriber_count(),
            Stage::ModifiedRawResponse => self.modified_raw_response.subscriber_count(),
            Stage::Response => self.response.subscriber_count(),
            Stage::ModifiedResponse => self.modified_response.subscriber_count(),
            Stage::Content => self.content.subscriber_count(),
            Stage::ModifiedContent => self.modified_content.subscriber_count(),
            Stage::Error => self.error.subscriber_count(),
        }
    }

    pub(crate) fn publish_payload(&self, stage: Stage, info: &RequestInfo, value: &dyn Payload) {
        let channel = match stage {
            Stage::Delegate => &self.delegate,
            Stage::UnmodifiedRequest => &self.unmodified_request,
            Stage::Request => &self.request,
            Stage::Response => &self.response,
            Stage::ModifiedResponse => &self.modified_response,
            Stage::Content => &self.content,
            Stage::ModifiedContent => &self.modified_content,
            other => {
                log::warn!(target: LOG_TARGET, "Stage {} does not carry a delegate payload", other);
                return;
            }
        };
        channel.publish(info, value);
        self.publish_any(stage, info, StageDetails::Payload(value));
    }

    pub(crate) fn publish_transport_call(&self, stage: Stage, info: &RequestInfo, call: &TransportCall) {
        let channel = match stage {
            Stage::UnmodifiedTransportCall => &self.unmodified_transport_call,
            Stage::TransportCall => &self.transport_call,
            other => {
                log::warn!(target: LOG_TARGET, "Stage {} does not carry a transport call", other);
                return;
            }
        };
        channel.publish(info, call);
        self.publish_any(stage, info, StageDetails::TransportCall(call));
    }

    pub(crate) fn publish_raw_response(&self, stage: Stage, info: &RequestInfo, raw: &RawResponse) {
        let channel = match stage {
            Stage::RawResponse => &self.raw_response,
            Stage::ModifiedRawResponse => &self.modified_raw_response,
            other => {
                log::warn!(target: LOG_TARGET, "Stage {} does not carry a raw response", other);
                return;
            }
        };
        channel.publish(info, raw);
        self.publish_any(stage, info, StageDetails::RawResponse(raw));
    }

    pub(crate) fn publish_error(&self, info: &RequestInfo, error: &ControllerError) {
        self.error.publish(info, error);
        self.publish_any(Stage::Error, info, StageDetails::Error(error));
    }

    fn publish_any(&self, stage: Stage, info: &RequestInfo, details: StageDetails<'_>) {
        let event = StageEvent { stage, info, details };
        for subscriber in self.any.snapshot() {
            deliver(stage, info, || subscriber(&event));
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("any", &self.any.len())
            .field("error", &self.error.subscriber_count())
            .finish_non_exhaustive()
    }
}

/// Run one subscriber, isolating a panic from the run and its siblings
pub(crate) fn deliver(stage: Stage, info: &RequestInfo, subscriber: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(subscriber)) {
        log::error!(
            target: LOG_TARGET,
            "Subscriber for {} panicked on request {}: {}",
            stage,
            info.id(),
            panic_message(panic.as_ref())
        );
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
