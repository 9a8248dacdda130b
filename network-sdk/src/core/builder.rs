//! Controller builder implementation
//!
//! Collects identification, the optional interceptor and any subscribers
//! registered before the controller exists.

use std::panic::Location;
use std::sync::Arc;

use super::info::IdentificationInfo;
use super::RequestInterceptor;
use crate::controller::NetworkController;
use crate::events::{EventBus, LogHandler};

/// Builder for `NetworkController`
///
/// The call site of `new` (or of `NetworkController::builder`) becomes the
/// file and line of the controller's identification.
pub struct ControllerBuilder {
    /// Module name reported in the identification
    module: String,

    /// Optional human label for the controller
    label: Option<String>,

    /// Source tags appended to every run
    source: Vec<String>,

    location: &'static Location<'static>,

    interceptor: Option<Arc<dyn RequestInterceptor>>,

    events: EventBus,
}

impl Default for ControllerBuilder {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerBuilder {
    #[track_caller]
    pub fn new() -> Self {
        Self {
            module: env!("CARGO_PKG_NAME").to_string(),
            label: None,
            source: vec!["NetworkController".to_string()],
            location: Location::caller(),
            interceptor: None,
            events: EventBus::new(),
        }
    }

    /// Set the module name reported in the identification
    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Replace the source tags
    pub fn source<I, S>(mut self, source: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source = source.into_iter().map(Into::into).collect();
        self
    }

    /// Install the override authority
    pub fn interceptor(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptor = Some(Arc::new(interceptor));
        self
    }

    /// Install an interceptor shared with other controllers
    pub fn shared_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    /// Attach a consolidated log sink
    pub fn log_handler(self, handler: impl LogHandler + 'static) -> Self {
        self.events.log_handler(Arc::new(handler));
        self
    }

    /// Register subscribers before the first run
    pub fn logging(self, configure: impl FnOnce(&EventBus)) -> Self {
        configure(&self.events);
        self
    }

    /// Build the controller
    pub fn build(self) -> NetworkController {
        let identification = IdentificationInfo::new(
            self.module,
            "NetworkController",
            self.location,
            self.label,
        );

        log::debug!(target: "network_sdk::controller", "Built controller {}", identification);

        NetworkController::from_parts(identification, self.source, self.interceptor, self.events)
    }
}
