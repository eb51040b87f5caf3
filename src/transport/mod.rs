//! Transport collaborator: performs one CRUD operation for a record.

pub mod http_transport;
pub mod memory;
pub mod url;

use crate::core::{Attributes, Result, TransportError};
use crate::record::Record;
use async_trait::async_trait;
use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub use http_transport::HttpTransport;
pub use memory::{MemoryTransport, RecordedRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn default_method(self) -> Method {
        match self {
            Operation::Create => Method::POST,
            Operation::Read => Method::GET,
            Operation::Update => Method::PUT,
            Operation::Delete => Method::DELETE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call options for save / fetch / destroy.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub method: Option<Method>,
    pub url: Option<String>,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl SyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncRequest {
    pub operation: Operation,
    pub method: Method,
    pub url: String,
    pub data: Option<Value>,
    pub params: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncResponse {
    pub status: u16,
    pub body: Value,
}

impl SyncResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: SyncRequest) -> std::result::Result<SyncResponse, TransportError>;
}

/// Builds the request for `operation` on `record`.
///
/// Method and URL come from `options` when set, otherwise from the operation and the
/// record's derived URL. URL derivation failures surface here, before any I/O.
pub fn prepare_request(
    operation: Operation,
    record: &Record,
    options: &SyncOptions,
    data: Option<Attributes>,
) -> Result<SyncRequest> {
    let url = match &options.url {
        Some(url) => url.clone(),
        None => record.url()?,
    };
    Ok(SyncRequest {
        operation,
        method: options
            .method
            .clone()
            .unwrap_or_else(|| operation.default_method()),
        url,
        data: data.map(Value::Object),
        params: options.params.clone(),
        headers: options.headers.clone(),
    })
}
