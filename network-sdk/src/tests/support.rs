//! Shared fixtures: a scripted transport, an item delegate and a stage recorder

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;
use uuid::Uuid;

use crate::core::{HttpRequest, RawResponse, RequestDelegate, RequestInfo, Session, Transport};
use crate::error::{ControllerError, StageResult, TransportError};
use crate::events::{EventBus, Stage};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemQuery {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRequest {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemResponse {
    pub name: String,
}

/// Answers every dispatch with the same response and remembers the requests
pub struct ScriptedTransport {
    status: StatusCode,
    body: Vec<u8>,
    refuse: bool,
    delay: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn ok(body: &str) -> Self {
        Self::status(StatusCode::OK, body)
    }

    pub fn status(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
            refuse: false,
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fails every dispatch with a connection error
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::ok("")
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn dispatch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.refuse {
            return Err(TransportError::connect("connection refused"));
        }
        Ok(RawResponse::new(self.status, request.url.clone(), self.body.clone()))
    }
}

/// Builds `GET /items/{id}`, parses `{"name": ...}` and extracts the name
pub struct ItemDelegate {
    session: Session,
    fail_build: bool,
    fail_extract: bool,
    errors: AtomicUsize,
}

impl ItemDelegate {
    pub fn new(transport: Arc<ScriptedTransport>) -> Self {
        Self::with_session(Session::from_arc("scripted", transport))
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session,
            fail_build: false,
            fail_extract: false,
            errors: AtomicUsize::new(0),
        }
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    pub fn failing_extract(mut self) -> Self {
        self.fail_extract = true;
        self
    }

    /// How many times `on_error` ran
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

impl RequestDelegate for ItemDelegate {
    type Descriptor = ItemQuery;
    type Request = ItemRequest;
    type Response = ItemResponse;
    type Content = String;

    fn build_request(&self, query: ItemQuery, _info: &RequestInfo) -> StageResult<ItemRequest> {
        if self.fail_build {
            return Err(anyhow::anyhow!("invalid descriptor: id {}", query.id).into());
        }
        Ok(ItemRequest { id: query.id })
    }

    fn session(&self, _request: &ItemRequest, _info: &RequestInfo) -> StageResult<Session> {
        Ok(self.session.clone())
    }

    fn http_request(&self, request: &ItemRequest, _info: &RequestInfo) -> StageResult<HttpRequest> {
        let url = Url::parse("https://api.example.com/items/")?.join(&request.id.to_string())?;
        Ok(HttpRequest::get(url))
    }

    fn parse_response(&self, raw: RawResponse, _info: &RequestInfo) -> StageResult<ItemResponse> {
        Ok(raw.json()?)
    }

    fn extract_content(&self, response: ItemResponse, _info: &RequestInfo) -> StageResult<String> {
        if self.fail_extract {
            return Err("no content in response".into());
        }
        Ok(response.name)
    }

    fn on_error(&self, _error: &ControllerError, _info: &RequestInfo) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

pub type StageLog = Arc<Mutex<Vec<(Uuid, Stage)>>>;

/// Record every event delivered by the bus, tagged with its run id
pub fn record_stages(events: &EventBus) -> StageLog {
    let log: StageLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    events.on_any(move |event| sink.lock().unwrap().push((event.info.id(), event.stage)));
    log
}

/// Stages recorded so far, without run ids
pub fn stages(log: &StageLog) -> Vec<Stage> {
    log.lock().unwrap().iter().map(|(_, stage)| *stage).collect()
}
