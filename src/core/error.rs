use crate::validation::ErrorMap;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RecordError {
    #[error("Validation failed: {0}")]
    Validation(ErrorMap),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cascade failure on '{type_name}': {reason}")]
    Cascade { type_name: String, reason: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Record type '{0}' is not registered")]
    UnknownType(String),

    #[error("Record type '{0}' has no association named '{1}'")]
    UnknownAssociation(String, String),

    #[error("Record {0} not found in session")]
    RecordNotFound(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl RecordError {
    /// Field errors carried by a validation failure.
    pub fn validation_errors(&self) -> Option<&ErrorMap> {
        match self {
            RecordError::Validation(errors) => Some(errors),
            _ => None,
        }
    }

    pub fn is_cascade(&self) -> bool {
        matches!(self, RecordError::Cascade { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;

impl<T> From<std::sync::PoisonError<T>> for RecordError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// The orchestrator never inspects these beyond logging; they reach the caller unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("HTTP status {status}")]
    Status {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}
