//! Run states of a single `send`
//!
//! Each transition either calls the delegate or the interceptor, then emits
//! one stage event. A failure leaves the machine through `Err` and is never
//! resumed.

use crate::core::{RawResponse, RequestDelegate, TransportCall};
use crate::error::Phase;

pub(crate) enum RunState<D: RequestDelegate> {
    Described(D::Descriptor),
    Built(D::Request),
    RequestOverridden(D::Request),
    CallBuilt(TransportCall),
    CallOverridden(TransportCall),
    Dispatched(RawResponse),
    RawResponseOverridden(RawResponse),
    Parsed(D::Response),
    ResponseOverridden(D::Response),
    Extracted(D::Content),
    Completed(D::Content),
}

impl<D: RequestDelegate> RunState<D> {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            RunState::Described(_) => "described",
            RunState::Built(_) => "built",
            RunState::RequestOverridden(_) => "request_overridden",
            RunState::CallBuilt(_) => "call_built",
            RunState::CallOverridden(_) => "call_overridden",
            RunState::Dispatched(_) => "dispatched",
            RunState::RawResponseOverridden(_) => "raw_response_overridden",
            RunState::Parsed(_) => "parsed",
            RunState::ResponseOverridden(_) => "response_overridden",
            RunState::Extracted(_) => "extracted",
            RunState::Completed(_) => "completed",
        }
    }

    /// Phase a hook failure leaving this state is classified as
    pub(crate) fn phase(&self) -> Phase {
        match self {
            RunState::Described(_)
            | RunState::Built(_)
            | RunState::RequestOverridden(_)
            | RunState::CallBuilt(_)
            | RunState::CallOverridden(_) => Phase::Preprocessing,
            RunState::Dispatched(_)
            | RunState::RawResponseOverridden(_)
            | RunState::Parsed(_)
            | RunState::ResponseOverridden(_)
            | RunState::Extracted(_)
            | RunState::Completed(_) => Phase::Postprocessing,
        }
    }
}
