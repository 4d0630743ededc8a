use std::path::PathBuf;

/// Errors that can occur in pipe transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the pipe endpoint.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open or connect to the pipe endpoint.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The deadline passed before the whole span was transferred.
    #[error("timed out after transferring {transferred} of {requested} bytes")]
    Timeout { transferred: usize, requested: usize },

    /// The peer closed its end of the channel.
    #[error("channel closed by peer after {transferred} of {requested} bytes")]
    Closed { transferred: usize, requested: usize },
}

impl TransportError {
    /// Returns true if this error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
