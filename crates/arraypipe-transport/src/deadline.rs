//! Deadline-bounded exact reads and writes.
//!
//! A single call may need several underlying operations to move the whole
//! span; the deadline is re-checked before each one, so the budget is shared
//! across all of them. Anything short of the full span is a failure.

use std::io::ErrorKind;

use tracing::trace;

use crate::channel::{Channel, Wait};
use crate::clock::Deadline;
use crate::error::{Result, TransportError};

/// Read exactly `buf.len()` bytes before `deadline`.
pub fn read_exact<C: Channel + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
    deadline: &Deadline,
) -> Result<()> {
    let requested = buf.len();
    let mut filled = 0usize;

    while filled < requested {
        let Some(remaining) = deadline.remaining() else {
            return Err(TransportError::Timeout {
                transferred: filled,
                requested,
            });
        };

        match channel
            .read_some(&mut buf[filled..], remaining)
            .map_err(|err| classify(err, filled, requested))?
        {
            Wait::Done(n) => {
                filled += n;
                trace!(read = n, filled, requested, "partial read");
            }
            Wait::TimedOut => {
                return Err(TransportError::Timeout {
                    transferred: filled,
                    requested,
                })
            }
        }
    }

    Ok(())
}

/// Read exactly `n` bytes into a fresh buffer.
pub fn read_vec<C: Channel + ?Sized>(
    channel: &mut C,
    n: usize,
    deadline: &Deadline,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    read_exact(channel, &mut buf, deadline)?;
    Ok(buf)
}

/// Write all of `bytes` before `deadline`. Returns the number written.
pub fn write_exact<C: Channel + ?Sized>(
    channel: &mut C,
    bytes: &[u8],
    deadline: &Deadline,
) -> Result<usize> {
    let requested = bytes.len();
    let mut written = 0usize;

    while written < requested {
        let Some(remaining) = deadline.remaining() else {
            return Err(TransportError::Timeout {
                transferred: written,
                requested,
            });
        };

        match channel
            .write_some(&bytes[written..], remaining)
            .map_err(|err| classify(err, written, requested))?
        {
            Wait::Done(n) => {
                written += n;
                trace!(wrote = n, written, requested, "partial write");
            }
            Wait::TimedOut => {
                return Err(TransportError::Timeout {
                    transferred: written,
                    requested,
                })
            }
        }
    }

    Ok(written)
}

fn classify(err: std::io::Error, transferred: usize, requested: usize) -> TransportError {
    match err.kind() {
        ErrorKind::UnexpectedEof
        | ErrorKind::WriteZero
        | ErrorKind::BrokenPipe
        | ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted => TransportError::Closed {
            transferred,
            requested,
        },
        ErrorKind::TimedOut => TransportError::Timeout {
            transferred,
            requested,
        },
        _ => TransportError::Io(err),
    }
}
