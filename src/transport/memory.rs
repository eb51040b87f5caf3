//! In-process transport that behaves like a small REST backend.
//!
//! `POST <root>` stores the body and assigns an incrementing identifier, `GET <root>` lists,
//! `GET|PUT|DELETE <root>/<id>` address one stored item. Requests are logged, and replies
//! can be stubbed, failed or delayed per method and URL prefix.

use super::{Operation, SyncRequest, SyncResponse, Transport};
use crate::core::{Attributes, TransportError, id_to_string};
use crate::schema::DEFAULT_ID_ATTRIBUTE;
use async_trait::async_trait;
use http::Method;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{Level, event};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub operation: Operation,
    pub method: Method,
    pub url: String,
    pub data: Option<Value>,
}

#[derive(Debug, Clone)]
struct Stub {
    method: Option<Method>,
    url_prefix: String,
    status: u16,
    body: Value,
    remaining: Option<usize>,
}

impl Stub {
    fn matches(&self, request: &SyncRequest) -> bool {
        self.remaining != Some(0)
            && self.method.as_ref().is_none_or(|method| *method == request.method)
            && request.url.starts_with(&self.url_prefix)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: BTreeMap<String, Attributes>,
    next_id: u64,
    log: Vec<RecordedRequest>,
    stubs: Vec<Stub>,
    delays: Vec<(String, Duration)>,
}

#[derive(Debug)]
pub struct MemoryTransport {
    id_attribute: String,
    state: Mutex<MemoryState>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            state: Mutex::new(MemoryState {
                next_id: 1,
                ..MemoryState::default()
            }),
        }
    }

    pub fn with_id_attribute(mut self, id_attribute: &str) -> Self {
        self.id_attribute = id_attribute.to_string();
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        // every mutation under this lock is a single insert or remove
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declares an empty collection so `GET <root>` lists it.
    pub fn with_collection(self, root: &str) -> Self {
        self.state().collections.entry(root.to_string()).or_default();
        self
    }

    /// Stores items as if they had been created. Items without an identifier get one.
    pub fn seed(&self, root: &str, items: Vec<Value>) {
        let mut state = self.state();
        for item in items {
            let Value::Object(mut item) = item else {
                continue;
            };
            let id = match item.get(&self.id_attribute).filter(|id| !id.is_null()) {
                Some(id) => id_to_string(id),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    item.insert(self.id_attribute.clone(), json!(id));
                    id.to_string()
                }
            };
            state
                .collections
                .entry(root.to_string())
                .or_default()
                .insert(id, Value::Object(item));
        }
    }

    /// Delays every request whose URL starts with `url_prefix`.
    pub fn delay(&self, url_prefix: &str, delay: Duration) {
        self.state().delays.push((url_prefix.to_string(), delay));
    }

    /// Answers matching requests with an error status instead of processing them.
    pub fn fail(&self, method: Method, url_prefix: &str, status: u16) {
        self.push_stub(Some(method), url_prefix, status, json!({"error": "stubbed failure"}), None);
    }

    /// Answers matching requests with `body` instead of processing them.
    pub fn respond(&self, method: Method, url_prefix: &str, body: Value) {
        self.push_stub(Some(method), url_prefix, 200, body, None);
    }

    /// Like [`respond`](Self::respond), for the next `times` matching requests only.
    pub fn respond_times(&self, method: Method, url_prefix: &str, body: Value, times: usize) {
        self.push_stub(Some(method), url_prefix, 200, body, Some(times));
    }

    fn push_stub(&self, method: Option<Method>, url_prefix: &str, status: u16, body: Value, remaining: Option<usize>) {
        self.state().stubs.push(Stub {
            method,
            url_prefix: url_prefix.to_string(),
            status,
            body,
            remaining,
        });
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state().log.clone()
    }

    pub fn requests_matching(&self, method: &Method, url_prefix: &str) -> Vec<RecordedRequest> {
        self.state()
            .log
            .iter()
            .filter(|request| request.method == *method && request.url.starts_with(url_prefix))
            .cloned()
            .collect()
    }

    pub fn clear_requests(&self) {
        self.state().log.clear();
    }

    pub fn stored(&self, root: &str, id: &str) -> Option<Value> {
        self.state()
            .collections
            .get(root)
            .and_then(|items| items.get(id))
            .cloned()
    }

    pub fn items(&self, root: &str) -> Vec<Value> {
        self.state()
            .collections
            .get(root)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    fn delay_for(&self, url: &str) -> Option<Duration> {
        self.state()
            .delays
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, delay)| *delay)
            .max()
    }

    fn take_stub(&self, request: &SyncRequest) -> Option<(u16, Value)> {
        let mut state = self.state();
        let stub = state.stubs.iter_mut().rev().find(|stub| stub.matches(request))?;
        if let Some(remaining) = stub.remaining.as_mut() {
            *remaining -= 1;
        }
        Some((stub.status, stub.body.clone()))
    }

    fn process(&self, request: &SyncRequest) -> Result<SyncResponse, TransportError> {
        let mut state = self.state();

        if request.method == Method::POST {
            let Some(Value::Object(mut item)) = request.data.clone() else {
                return Err(rejected(400, "body must be an object"));
            };
            let id = match item.get(&self.id_attribute).filter(|id| !id.is_null()) {
                Some(id) => id_to_string(id),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    item.insert(self.id_attribute.clone(), json!(id));
                    id.to_string()
                }
            };
            let item = Value::Object(item);
            state
                .collections
                .entry(request.url.clone())
                .or_default()
                .insert(id, item.clone());
            return Ok(SyncResponse { status: 201, body: item });
        }

        if request.method == Method::GET {
            if let Some(items) = state.collections.get(&request.url) {
                return Ok(SyncResponse::ok(Value::Array(items.values().cloned().collect())));
            }
        }

        let (root, id) = request
            .url
            .rsplit_once('/')
            .ok_or_else(|| rejected(404, "not found"))?;
        let items = state
            .collections
            .get_mut(root)
            .ok_or_else(|| rejected(404, "not found"))?;

        match request.method.clone() {
            Method::GET => items
                .get(id)
                .cloned()
                .map(SyncResponse::ok)
                .ok_or_else(|| rejected(404, "not found")),
            Method::PUT | Method::PATCH => {
                let Some(Value::Object(stored)) = items.get_mut(id) else {
                    return Err(rejected(404, "not found"));
                };
                if let Some(Value::Object(changes)) = &request.data {
                    for (field, value) in changes {
                        stored.insert(field.clone(), value.clone());
                    }
                }
                Ok(SyncResponse::ok(Value::Object(stored.clone())))
            }
            Method::DELETE => match items.shift_remove(id) {
                Some(_) => Ok(SyncResponse { status: 204, body: Value::Null }),
                None => Err(rejected(404, "not found")),
            },
            other => Err(rejected(405, &format!("method {} not supported", other))),
        }
    }
}

fn rejected(status: u16, message: &str) -> TransportError {
    TransportError::Status {
        status,
        body: json!({ "error": message }),
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn perform(&self, request: SyncRequest) -> Result<SyncResponse, TransportError> {
        self.state().log.push(RecordedRequest {
            operation: request.operation,
            method: request.method.clone(),
            url: request.url.clone(),
            data: request.data.clone(),
        });

        if let Some(delay) = self.delay_for(&request.url) {
            tokio::time::sleep(delay).await;
        }

        if let Some((status, body)) = self.take_stub(&request) {
            event!(Level::DEBUG, url = %request.url, status, "memory transport stubbed reply");
            if (200..300).contains(&status) {
                return Ok(SyncResponse { status, body });
            }
            return Err(TransportError::Status { status, body });
        }

        self.process(&request)
    }
}
