use arraypipe_transport::TransportError;

/// Errors that can occur while encoding, decoding, or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The header carries a type code outside the registry.
    #[error("unknown type code {0}")]
    UnknownType(u32),

    /// The header carries the `Invalid` sentinel: the peer rejected its own value.
    #[error("peer reported an unsupported value")]
    InvalidValue,

    /// Rows and columns are inconsistent for the type.
    #[error("invalid shape {rows}x{cols}: {reason}")]
    Shape {
        rows: u32,
        cols: u32,
        reason: &'static str,
    },

    /// The declared payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// A frame's payload does not match `rows * cols * element_width`.
    #[error("payload length {actual} does not match shape (expected {expected})")]
    PayloadLength { expected: usize, actual: usize },

    /// The peer answered a chunk with something other than the accept marker.
    #[error("chunk {chunk} rejected: expected ack {expected:#04x}, got {got:#04x}")]
    UnexpectedAck { chunk: usize, expected: u8, got: u8 },

    /// A chunk header declared an impossible length.
    #[error("malformed chunk length {declared} ({remaining} payload bytes remaining)")]
    MalformedChunk { declared: usize, remaining: usize },

    /// The underlying channel failed or the deadline passed.
    #[error("frame transport error: {0}")]
    Transport(#[from] TransportError),
}

impl FrameError {
    /// Returns true if the failure was a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FrameError::Transport(err) if err.is_timeout())
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
