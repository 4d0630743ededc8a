use arraypipe_transport::{deadline, Channel, Deadline};
use bytes::Bytes;
use tracing::debug;

use crate::codec::CHUNK_ACK;
use crate::error::{FrameError, Result};
use crate::writer::CHUNK_HEADER_SIZE;

/// Read a payload of exactly `payload_len` bytes sent by
/// [`write_with_ack`](crate::writer::write_with_ack), acknowledging each chunk.
///
/// A chunk header declaring zero bytes, or more than what is left of the
/// payload, is a protocol violation.
pub fn read_with_ack<C: Channel + ?Sized>(
    channel: &mut C,
    payload_len: usize,
    deadline: &Deadline,
) -> Result<Bytes> {
    let mut payload = vec![0u8; payload_len];
    let mut filled = 0usize;
    let mut chunks = 0usize;

    while filled < payload_len {
        let mut header = [0u8; CHUNK_HEADER_SIZE];
        deadline::read_exact(channel, &mut header, deadline)?;

        let declared = u32::from_le_bytes(header) as usize;
        let remaining = payload_len - filled;
        if declared == 0 || declared > remaining {
            return Err(FrameError::MalformedChunk {
                declared,
                remaining,
            });
        }

        deadline::read_exact(channel, &mut payload[filled..filled + declared], deadline)?;
        filled += declared;
        chunks += 1;

        deadline::write_exact(channel, &[CHUNK_ACK], deadline)?;
        debug!(chunk = chunks, len = declared, filled, total = payload_len, "chunk received");
    }

    Ok(Bytes::from(payload))
}

/// Read a payload written as one plain span, without chunk framing.
pub fn read_raw<C: Channel + ?Sized>(
    channel: &mut C,
    payload_len: usize,
    deadline: &Deadline,
) -> Result<Bytes> {
    let payload = deadline::read_vec(channel, payload_len, deadline)?;
    Ok(Bytes::from(payload))
}
