use std::fmt;
use std::io;

use fender_client::{CallError, CallErrorKind, ClientError};
use fender_schema::SchemaError;
use fender_transport::TransportError;

// Process exit codes, stable across subcommands.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const RESPONSE_INVALID: i32 = 65;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn schema_error(context: &str, err: SchemaError) -> CliError {
    let code = match err {
        SchemaError::LoadFailed(_) => FAILURE,
        SchemaError::InvalidBundle(_)
        | SchemaError::InvalidJson(_)
        | SchemaError::DuplicateSymbol(_) => DATA_INVALID,
        SchemaError::ScopeNotFound(_) | SchemaError::ServiceNotFound { .. } => USAGE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Schema(err) => schema_error(context, err),
        ClientError::Call(err) => CliError::new(call_exit_code(&err), format!("{context}: {err}")),
        ClientError::UnresolvedScope { .. } => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ClientError::UnknownService(_) | ClientError::UnknownMethod { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        ClientError::Attach(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn call_exit_code(err: &CallError) -> i32 {
    match err.kind() {
        CallErrorKind::RequestValidation => DATA_INVALID,
        CallErrorKind::ResponseValidation => RESPONSE_INVALID,
        CallErrorKind::Transport => TRANSPORT_ERROR,
        CallErrorKind::Timeout => TIMEOUT,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn call_errors_map_to_distinct_codes() {
        let timeout = CallError::Timeout {
            method: "a.S.M".into(),
            after: Duration::from_secs(1),
        };
        assert_eq!(call_exit_code(&timeout), TIMEOUT);

        let response = CallError::ResponseValidation {
            method: "a.S.M".into(),
            violations: Default::default(),
            decode_error: None,
        };
        assert_eq!(call_exit_code(&response), RESPONSE_INVALID);
    }

    #[test]
    fn missing_socket_is_a_transport_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                path: "/tmp/none.sock".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn client_scope_failures_keep_schema_codes() {
        let err = client_error(
            "bind failed",
            ClientError::Schema(SchemaError::ScopeNotFound("x.v1".into())),
        );
        assert_eq!(err.code, USAGE);

        let err = client_error("client setup failed", ClientError::Attach(TransportError::AlreadyAttached));
        assert_eq!(err.code, INTERNAL);
    }

    #[test]
    fn unknown_scope_is_usage() {
        let err = schema_error("lookup", SchemaError::ScopeNotFound("x.v1".into()));
        assert_eq!(err.code, USAGE);
    }
}
