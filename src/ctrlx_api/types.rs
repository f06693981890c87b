use serde::{Deserialize, Serialize};
use std::fmt;

/// ctrlX client error type
///
/// Every failed network call made by [`CtrlxClient`](crate::CtrlxClient) is
/// reported exactly once as [`CtrlxError::Request`], tagged with the
/// operation that was running and the classified underlying cause.
#[derive(Debug, thiserror::Error)]
pub enum CtrlxError {
    /// A request to the device failed (network, HTTP status, or decoding)
    #[error("{operation} failed: {source}")]
    Request {
        operation: Operation,
        #[source]
        source: ApiError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Motion-data key that does not name a known channel
    #[error("Unknown motion data channel: '{0}' (expected couple, position, vitesse or temps)")]
    UnknownChannel(String),
}

impl CtrlxError {
    pub(crate) fn request(operation: Operation, source: ApiError) -> Self {
        CtrlxError::Request { operation, source }
    }

    /// The operation that failed, if this is a request failure
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            CtrlxError::Request { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// The classified underlying cause, if this is a request failure
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            CtrlxError::Request { source, .. } => Some(source),
            _ => None,
        }
    }

    /// HTTP status code of the failing response, when the device answered
    pub fn status(&self) -> Option<u16> {
        match self.api_error() {
            Some(ApiError::Http { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// True when the failure happened while exchanging credentials for a token
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.operation(), Some(Operation::Login))
    }
}

/// The client operation during which a request failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Login,
    ReadNode { path: String },
    WriteNode { path: String },
    ListDriveNames,
    SetDriveValue,
    GetMotionData { channel: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Login => write!(f, "Authentication request"),
            Operation::ReadNode { path } => write!(f, "Reading node '{}'", path),
            Operation::WriteNode { path } => write!(f, "Writing node '{}'", path),
            Operation::ListDriveNames => write!(f, "Listing EtherCAT drive names"),
            Operation::SetDriveValue => write!(f, "Setting drive value"),
            Operation::GetMotionData { channel } => {
                write!(f, "Reading motion data channel '{}'", channel)
            }
        }
    }
}

/// API-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network error (connection, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP error with status code
    #[error("HTTP {status} error: {message}")]
    Http { status: u16, message: String },
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Request building failed
    #[error("Request error: {0}")]
    Request(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timeout".to_string())
        } else if err.is_connect() {
            ApiError::Network(format!("Connection failed: {}", err))
        } else if let Some(status) = err.status() {
            ApiError::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else if err.is_builder() {
            ApiError::Request(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Credential exchange payload sent to the identity manager
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub name: String,
    pub password: String,
}

/// Typed value written to a data-layer node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeValue {
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: serde_json::Value,
}

impl NodeValue {
    /// A `string` typed node value
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value_type: "string".to_string(),
            value: serde_json::Value::String(value.into()),
        }
    }
}
