//! Identification and correlation context for pipeline runs

use std::fmt;
use std::panic::Location;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::util::generate_request_id;

/// Identifies one controller instance and the call site that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentificationInfo {
    pub module: String,
    pub type_name: String,
    pub file: String,
    pub line: u32,
    pub label: Option<String>,
}

impl IdentificationInfo {
    pub fn new(
        module: impl Into<String>,
        type_name: impl Into<String>,
        location: &Location<'_>,
        label: Option<String>,
    ) -> Self {
        Self {
            module: module.into(),
            type_name: type_name.into(),
            file: location.file().to_string(),
            line: location.line(),
            label,
        }
    }
}

impl fmt::Display for IdentificationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.type_name)?;
        if let Some(ref label) = self.label {
            write!(f, "({})", label)?;
        }
        write!(f, " @ {}:{}", self.file, self.line)
    }
}

/// Correlation context threaded read-only through every stage of a run
///
/// Only the controller creates or extends a `RequestInfo`; delegates,
/// interceptors and subscribers receive it by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestInfo {
    id: Uuid,
    controllers: Vec<IdentificationInfo>,
    source: Vec<String>,
    label: Option<String>,
    started_at: DateTime<Utc>,
}

impl RequestInfo {
    pub(crate) fn new(label: Option<String>) -> Self {
        Self {
            id: generate_request_id(),
            controllers: Vec::new(),
            source: Vec::new(),
            label,
            started_at: Utc::now(),
        }
    }

    /// Extended copy for a run driven by another controller
    pub(crate) fn extended(
        &self,
        controller: &IdentificationInfo,
        source: &[String],
        label: Option<String>,
    ) -> Self {
        let mut info = self.clone();
        info.controllers.push(controller.clone());
        info.source.extend_from_slice(source);
        if label.is_some() {
            info.label = label;
        }
        info
    }

    /// Correlation id of this run
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Controllers that touched this run, outermost first
    pub fn controllers(&self) -> &[IdentificationInfo] {
        &self.controllers
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl fmt::Display for RequestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.id)?;
        if let Some(ref label) = self.label {
            write!(f, " {}", label)?;
        }
        if !self.source.is_empty() {
            write!(f, " <{}>", self.source.join(" > "))?;
        }
        Ok(())
    }
}
