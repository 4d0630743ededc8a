//! Deadline-bounded byte I/O over a local pipe endpoint.
//!
//! Provides the lowest layer of arraypipe:
//! - [`Channel`]: one bounded, cancellable read or write per call
//! - [`deadline`]: exact reads/writes sharing a single [`Deadline`]
//! - Endpoints: Unix domain sockets (Linux/macOS) and named pipes (Windows)
//!
//! Everything else builds on [`deadline::read_exact`] and
//! [`deadline::write_exact`].

pub mod channel;
pub mod clock;
pub mod deadline;
pub mod error;

#[cfg(unix)]
pub mod uds;

#[cfg(windows)]
pub mod named_pipe;

pub use channel::{BufferSizes, Channel, Wait};
pub use clock::Deadline;
pub use error::{Result, TransportError};

#[cfg(unix)]
pub use uds::UnixDomainSocket;

#[cfg(windows)]
pub use named_pipe::NamedPipe;

/// The platform's pipe channel type.
#[cfg(unix)]
pub type PipeStream = std::os::unix::net::UnixStream;

/// The platform's pipe channel type.
#[cfg(windows)]
pub type PipeStream = NamedPipe;

/// Open an existing pipe endpoint created by the peer.
#[cfg(unix)]
pub fn open_pipe(path: impl AsRef<std::path::Path>) -> Result<PipeStream> {
    UnixDomainSocket::connect(path)
}

/// Open an existing pipe endpoint created by the peer.
#[cfg(windows)]
pub fn open_pipe(path: impl AsRef<std::path::Path>) -> Result<PipeStream> {
    NamedPipe::open(path)
}
