//! Chunked payload writer with per-chunk acknowledgement.
//!
//! Pipes become unreliable when a single write carries tens of megabytes, so
//! payloads go out in blocks smaller than the channel buffer, each one
//! confirmed by the peer before the next is sent:
//!
//! ```text
//! sender:   [len: u32 LE][len bytes]            [len: u32 LE][len bytes] ...
//! receiver:                          ['A']                                ['A']
//! ```

use arraypipe_transport::{deadline, BufferSizes, Channel, Deadline, TransportError};
use tracing::debug;

use crate::codec::CHUNK_ACK;
use crate::error::{FrameError, Result};

/// Chunk header: payload length of the chunk as u32 LE.
pub const CHUNK_HEADER_SIZE: usize = 4;

/// Share of the channel's inbound buffer used as the default block size.
pub const DEFAULT_BLOCK_FRACTION: f64 = 0.9;

/// Block size used when the channel reports no buffer capacity: 64 KiB.
pub const FALLBACK_BLOCK_SIZE: usize = 64 * 1024;

/// Summary of a completed chunked write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkReport {
    /// Chunks sent and acknowledged.
    pub chunks: usize,
    /// Payload bytes sent and acknowledged.
    pub bytes: usize,
}

/// Default block size for a channel: a fixed fraction of its inbound buffer.
pub fn default_block_size(sizes: BufferSizes) -> usize {
    let block = (sizes.inbound as f64 * DEFAULT_BLOCK_FRACTION) as usize;
    if block == 0 {
        FALLBACK_BLOCK_SIZE
    } else {
        block.min(u32::MAX as usize)
    }
}

/// Write `payload` in chunks of at most `block_size` bytes, waiting for the
/// peer's [`CHUNK_ACK`] after each one.
///
/// The deadline is shared by every step. Any acknowledgement byte other than
/// [`CHUNK_ACK`] aborts the write; nothing is retried.
pub fn write_with_ack<C: Channel + ?Sized>(
    channel: &mut C,
    payload: &[u8],
    block_size: usize,
    deadline: &Deadline,
) -> Result<ChunkReport> {
    let block_size = block_size.clamp(1, u32::MAX as usize);
    let mut report = ChunkReport::default();

    for chunk in payload.chunks(block_size) {
        let len = chunk.len() as u32;
        deadline::write_exact(channel, &len.to_le_bytes(), deadline)
            .map_err(|err| with_progress(err, &report, payload.len()))?;
        deadline::write_exact(channel, chunk, deadline)
            .map_err(|err| with_progress(err, &report, payload.len()))?;

        let mut ack = [0u8; 1];
        deadline::read_exact(channel, &mut ack, deadline)
            .map_err(|err| with_progress(err, &report, payload.len()))?;

        report.chunks += 1;
        if ack[0] != CHUNK_ACK {
            return Err(FrameError::UnexpectedAck {
                chunk: report.chunks,
                expected: CHUNK_ACK,
                got: ack[0],
            });
        }
        report.bytes += chunk.len();
        debug!(
            chunk = report.chunks,
            len,
            sent = report.bytes,
            total = payload.len(),
            "chunk acknowledged"
        );
    }

    Ok(report)
}

/// Report a timeout in terms of acknowledged payload bytes.
fn with_progress(err: TransportError, report: &ChunkReport, total: usize) -> FrameError {
    match err {
        TransportError::Timeout { .. } => FrameError::Transport(TransportError::Timeout {
            transferred: report.bytes,
            requested: total,
        }),
        other => FrameError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;
    use std::time::Duration;

    use arraypipe_transport::Wait;

    use super::*;

    /// Channel that answers reads from a queue of ack bytes and records writes.
    struct AckChannel {
        acks: VecDeque<u8>,
        written: Vec<u8>,
        ack_reads: usize,
    }

    impl AckChannel {
        fn new(acks: &[u8]) -> Self {
            Self {
                acks: acks.iter().copied().collect(),
                written: Vec::new(),
                ack_reads: 0,
            }
        }

        /// Split the written stream back into chunk payloads.
        fn chunks(&self) -> Vec<Vec<u8>> {
            let mut out = Vec::new();
            let mut rest = self.written.as_slice();
            while rest.len() >= CHUNK_HEADER_SIZE {
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                out.push(rest[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + len].to_vec());
                rest = &rest[CHUNK_HEADER_SIZE + len..];
            }
            out
        }
    }

    impl Channel for AckChannel {
        fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Wait> {
            match self.acks.pop_front() {
                Some(byte) => {
                    self.ack_reads += 1;
                    buf[0] = byte;
                    Ok(Wait::Done(1))
                }
                None => {
                    std::thread::sleep(timeout.min(Duration::from_millis(20)));
                    Ok(Wait::TimedOut)
                }
            }
        }

        fn write_some(&mut self, buf: &[u8], _timeout: Duration) -> io::Result<Wait> {
            self.written.extend_from_slice(buf);
            Ok(Wait::Done(buf.len()))
        }

        fn buffer_sizes(&self) -> io::Result<BufferSizes> {
            Ok(BufferSizes {
                outbound: 40,
                inbound: 40,
            })
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(2))
    }

    #[test]
    fn splits_into_ceil_chunks() {
        let payload: Vec<u8> = (0..100u8).collect();
        let mut channel = AckChannel::new(&[CHUNK_ACK; 8]);

        let report = write_with_ack(&mut channel, &payload, 16, &deadline()).unwrap();

        assert_eq!(report.chunks, 7);
        assert_eq!(report.bytes, 100);
        assert_eq!(channel.ack_reads, 7);
        let chunks = channel.chunks();
        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[6].len(), 4);
        assert_eq!(chunks.concat(), payload);
    }

    #[test]
    fn exact_multiple_of_block_size() {
        let payload = vec![7u8; 48];
        let mut channel = AckChannel::new(&[CHUNK_ACK; 3]);
        let report = write_with_ack(&mut channel, &payload, 16, &deadline()).unwrap();
        assert_eq!(report.chunks, 3);
        assert!(channel.acks.is_empty());
    }

    #[test]
    fn wrong_ack_aborts_after_that_chunk() {
        let payload = vec![1u8; 64];
        let mut channel = AckChannel::new(&[CHUNK_ACK, CHUNK_ACK, b'n', CHUNK_ACK]);

        let err = write_with_ack(&mut channel, &payload, 16, &deadline()).unwrap_err();

        assert!(matches!(
            err,
            FrameError::UnexpectedAck {
                chunk: 3,
                expected: CHUNK_ACK,
                got: b'n'
            }
        ));
        assert_eq!(channel.chunks().len(), 3);
        assert_eq!(channel.ack_reads, 3);
    }

    #[test]
    fn missing_ack_times_out() {
        let payload = vec![1u8; 32];
        let mut channel = AckChannel::new(&[CHUNK_ACK]);

        let err = write_with_ack(
            &mut channel,
            &payload,
            16,
            &Deadline::after(Duration::from_millis(50)),
        )
        .unwrap_err();

        assert!(err.is_timeout());
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Timeout {
                transferred: 16,
                requested: 32
            })
        ));
    }

    #[test]
    fn expired_deadline_sends_nothing() {
        let mut channel = AckChannel::new(&[CHUNK_ACK]);
        let err = write_with_ack(&mut channel, b"abc", 16, &Deadline::after(Duration::ZERO))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(channel.written.is_empty());
    }

    #[test]
    fn empty_payload_is_a_no_op() {
        let mut channel = AckChannel::new(&[]);
        let report = write_with_ack(&mut channel, &[], 16, &deadline()).unwrap();
        assert_eq!(report, ChunkReport::default());
        assert!(channel.written.is_empty());
    }

    #[test]
    fn default_block_size_uses_buffer_fraction() {
        let sizes = BufferSizes {
            outbound: 1000,
            inbound: 4096,
        };
        assert_eq!(default_block_size(sizes), 3686);
        let none = BufferSizes {
            outbound: 0,
            inbound: 0,
        };
        assert_eq!(default_block_size(none), FALLBACK_BLOCK_SIZE);
    }
}
