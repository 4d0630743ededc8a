use std::io;
use std::time::Duration;

/// Outcome of one bounded channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The operation completed and moved this many bytes (may be fewer than
    /// requested, or zero on a spurious wakeup).
    Done(usize),
    /// The wait expired; the operation was cancelled before returning.
    TimedOut,
}

/// Negotiated buffer capacities of a channel, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSizes {
    /// Buffer for data leaving this endpoint.
    pub outbound: usize,
    /// Buffer for data arriving at this endpoint.
    pub inbound: usize,
}

/// A point-to-point duplex byte channel with bounded, cancellable operations.
///
/// Each call issues exactly one underlying operation and waits at most
/// `timeout` for it. On expiry the implementation cancels the operation and
/// releases any per-call wait resource before returning [`Wait::TimedOut`].
///
/// End of stream on read is reported as [`io::ErrorKind::UnexpectedEof`], a
/// write the peer refuses as [`io::ErrorKind::WriteZero`] or
/// [`io::ErrorKind::BrokenPipe`].
pub trait Channel {
    /// Read up to `buf.len()` bytes.
    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Wait>;

    /// Write up to `buf.len()` bytes.
    fn write_some(&mut self, buf: &[u8], timeout: Duration) -> io::Result<Wait>;

    /// Query the channel's buffer capacities.
    fn buffer_sizes(&self) -> io::Result<BufferSizes>;
}

impl<C: Channel + ?Sized> Channel for &mut C {
    fn read_some(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<Wait> {
        (**self).read_some(buf, timeout)
    }

    fn write_some(&mut self, buf: &[u8], timeout: Duration) -> io::Result<Wait> {
        (**self).write_some(buf, timeout)
    }

    fn buffer_sizes(&self) -> io::Result<BufferSizes> {
        (**self).buffer_sizes()
    }
}

/// Round a wait up to whole milliseconds so a sub-millisecond budget never
/// turns into a zero-length (non-blocking) wait.
pub(crate) fn timeout_millis(timeout: Duration, max: u128) -> u128 {
    timeout.as_nanos().div_ceil(1_000_000).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_millis_rounds_up() {
        assert_eq!(timeout_millis(Duration::from_micros(1), 1000), 1);
        assert_eq!(timeout_millis(Duration::from_millis(3), 1000), 3);
        assert_eq!(timeout_millis(Duration::from_micros(3001), 1000), 4);
        assert_eq!(timeout_millis(Duration::ZERO, 1000), 0);
    }

    #[test]
    fn timeout_millis_clamps() {
        assert_eq!(timeout_millis(Duration::from_secs(10_000), 500), 500);
    }
}
