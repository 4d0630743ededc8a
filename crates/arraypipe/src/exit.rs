use std::fmt;
use std::io;

use arraypipe::document::DocumentError;
use arraypipe::session::SessionError;
use arraypipe::transport::TransportError;

// Exit code constants aligned with rsfulmen/DDR-0002 semantics.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
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
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Channel(err) => transport_error(context, err),
        SessionError::Timeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::UnknownType(_)
        | SessionError::Shape { .. }
        | SessionError::UnsupportedValue(_)
        | SessionError::Conversion { .. }
        | SessionError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::Protocol(_) => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        SessionError::PeerRejected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn document_error(context: &str, err: DocumentError) -> CliError {
    match err {
        DocumentError::Json(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use arraypipe::session::Stage;

    use super::*;

    #[test]
    fn session_timeouts_map_to_124() {
        let err = session_error(
            "receive failed",
            SessionError::Timeout {
                stage: Stage::Header,
            },
        );
        assert_eq!(err.code, TIMEOUT);
        assert_eq!(err.message, "receive failed: timed out during header");
    }

    #[test]
    fn rejected_values_map_to_data_invalid() {
        let err = session_error(
            "send failed",
            SessionError::UnsupportedValue("cell values are not supported".into()),
        );
        assert_eq!(err.code, DATA_INVALID);
        assert_eq!(session_error("x", SessionError::PeerRejected).code, FAILURE);
    }

    #[test]
    fn missing_endpoint_is_transport_error() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                path: "/tmp/nope.sock".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
