use std::fmt;

use arraypipe_frame::{FrameError, TypeCode};
use arraypipe_transport::TransportError;

/// Session step in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Ready-byte exchange before the header.
    Sync,
    /// Type code of the header.
    Header,
    /// Rows and columns of the header.
    Shape,
    /// Payload bytes and their chunk acknowledgements.
    Payload,
    /// End-of-session acknowledgement.
    Ack,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Sync => "sync",
            Stage::Header => "header",
            Stage::Shape => "shape",
            Stage::Payload => "payload",
            Stage::Ack => "ack",
        })
    }
}

/// Errors surfaced by a transfer session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The budget ran out during `stage`.
    #[error("timed out during {stage}")]
    Timeout { stage: Stage },

    /// The header carries a type code outside the registry.
    #[error("unknown type code {0}")]
    UnknownType(u32),

    /// Rows and columns are inconsistent for the type.
    #[error("invalid shape {rows}x{cols}: {reason}")]
    Shape {
        rows: u32,
        cols: u32,
        reason: &'static str,
    },

    /// The value cannot be represented on the wire.
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),

    /// Channel failure not attributable to a timeout.
    #[error("channel error: {0}")]
    Channel(TransportError),

    /// The peer broke the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The payload arrived but could not be turned into a value.
    #[error("cannot convert {type_code} payload: {reason}")]
    Conversion { type_code: TypeCode, reason: String },

    /// The peer answered the final handshake with a negative acknowledgement.
    #[error("peer rejected the transfer")]
    PeerRejected,

    /// The header declares more payload than this side accepts.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },
}

impl SessionError {
    /// Returns true for deadline expiries at any stage.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SessionError::Timeout { .. })
    }

    /// The stage of a timeout, if this is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SessionError::Timeout { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Map a transport failure during `stage`.
    pub(crate) fn transport(stage: Stage, err: TransportError) -> Self {
        if err.is_timeout() {
            SessionError::Timeout { stage }
        } else {
            SessionError::Channel(err)
        }
    }

    /// Map a framing failure during `stage`.
    pub(crate) fn frame(stage: Stage, err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => Self::transport(stage, err),
            FrameError::UnknownType(code) => SessionError::UnknownType(code),
            FrameError::InvalidValue => {
                SessionError::UnsupportedValue("peer reported an unsupported value".to_string())
            }
            FrameError::Shape { rows, cols, reason } => SessionError::Shape { rows, cols, reason },
            FrameError::PayloadTooLarge { size, max } => {
                SessionError::PayloadTooLarge { size, max }
            }
            FrameError::UnexpectedAck { got, .. } if got == arraypipe_frame::SESSION_NACK => {
                SessionError::PeerRejected
            }
            other => SessionError::Protocol(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
