use std::time::Duration;

use fender_schema::{SchemaError, Violations};
use fender_transport::TransportError;
use serde::Serialize;

/// Errors raised while binding services or looking up handles.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A method references a type the supplied registry does not define.
    #[error("cannot bind {service}.{method}: type {type_name} is not in the registry")]
    UnresolvedScope {
        service: String,
        method: String,
        type_name: String,
    },

    /// No factory is bound under this service name.
    #[error("no bound service named {0}")]
    UnknownService(String),

    /// The service does not declare this method.
    #[error("service {service} has no method {method}")]
    UnknownMethod { service: String, method: String },

    /// The transport already serves another client.
    #[error("cannot attach to transport: {0}")]
    Attach(#[source] TransportError),

    /// Schema lookup error.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The call itself failed.
    #[error(transparent)]
    Call(#[from] CallError),
}

impl ClientError {
    /// The underlying call error, if this is one.
    pub fn as_call(&self) -> Option<&CallError> {
        match self {
            Self::Call(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Why a single invocation failed.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The request did not match the request schema; nothing was sent.
    #[error("request to {method} is invalid: {violations}")]
    RequestValidation {
        method: String,
        violations: Violations,
    },

    /// The reply could not be decoded or did not match the response schema.
    #[error("response from {method} is invalid: {}", response_detail(.violations, .decode_error))]
    ResponseValidation {
        method: String,
        violations: Violations,
        decode_error: Option<String>,
    },

    /// The transport could not carry the call or the peer reported failure.
    #[error("call to {method} failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: TransportError,
    },

    /// No reply arrived before the deadline.
    #[error("call to {method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },
}

fn response_detail(violations: &Violations, decode_error: &Option<String>) -> String {
    match decode_error {
        Some(err) => format!("undecodable body: {err}"),
        None => violations.to_string(),
    }
}

/// Coarse classification of a [`CallError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallErrorKind {
    RequestValidation,
    ResponseValidation,
    Transport,
    Timeout,
}

impl CallErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequestValidation => "request_validation",
            Self::ResponseValidation => "response_validation",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
        }
    }
}

impl CallError {
    pub fn kind(&self) -> CallErrorKind {
        match self {
            Self::RequestValidation { .. } => CallErrorKind::RequestValidation,
            Self::ResponseValidation { .. } => CallErrorKind::ResponseValidation,
            Self::Transport { .. } => CallErrorKind::Transport,
            Self::Timeout { .. } => CallErrorKind::Timeout,
        }
    }

    /// Fully-qualified name of the method that failed.
    pub fn method(&self) -> &str {
        match self {
            Self::RequestValidation { method, .. }
            | Self::ResponseValidation { method, .. }
            | Self::Transport { method, .. }
            | Self::Timeout { method, .. } => method,
        }
    }

    /// Validation failures for either direction.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::RequestValidation { violations, .. }
            | Self::ResponseValidation { violations, .. } => Some(violations),
            _ => None,
        }
    }

    /// Human-readable cause for failures that carry no violations.
    pub fn cause(&self) -> Option<String> {
        match self {
            Self::RequestValidation { .. } => None,
            Self::ResponseValidation { decode_error, .. } => decode_error.clone(),
            Self::Transport { source, .. } => Some(source.to_string()),
            Self::Timeout { after, .. } => Some(format!("no response within {after:?}")),
        }
    }

    /// Structured, serializable form of this error.
    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            kind: self.kind(),
            method: self.method().to_string(),
            violations: self.violations().cloned(),
            cause: self.cause(),
        }
    }
}

/// What callers and tools see of a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub kind: CallErrorKind,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Violations>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorPayload {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
