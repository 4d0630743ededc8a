use std::time::Duration;

use arraypipe_frame::DEFAULT_MAX_PAYLOAD;

/// How the receiver expects the payload to be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFraming {
    /// Length-prefixed chunks, each acknowledged with `A`.
    #[default]
    Chunked,
    /// Exactly `payload_size` bytes with no framing.
    Raw,
}

/// Configuration shared by both session roles.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Total budget for the session, measured from its start.
    pub timeout: Duration,
    /// Payload chunk size. `None` derives it from the channel buffer size.
    pub block_size: Option<usize>,
    /// Sender: how long to wait for the receiver's ready byte.
    pub ready_timeout: Duration,
    /// Bound on each end-of-session exchange, independent of `timeout`.
    pub handshake_timeout: Duration,
    /// Receiver: largest payload a header may declare.
    pub max_payload_size: usize,
    /// Receiver: payload framing expected from the sender.
    pub payload_framing: PayloadFraming,
    /// Receiver: write the ready byte before reading the header.
    pub signal_ready: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            block_size: None,
            ready_timeout: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(1),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            payload_framing: PayloadFraming::Chunked,
            signal_ready: true,
        }
    }
}

impl SessionConfig {
    /// Defaults with a different total budget.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Self::default()
        }
    }
}
