//! Deadline-bounded transfer of typed arrays over named pipes.
//!
//! arraypipe moves one rectangular array (numbers, complex numbers, or text)
//! per session between two processes, under a single time budget, with
//! per-chunk acknowledgements for large payloads.
//!
//! # Crate Structure
//!
//! - [`transport`] for the clock, deadline-bounded I/O and pipe endpoints
//! - [`frame`] for the type registry, header codec and chunked payloads
//! - [`session`] for the sender and receiver state machines
//! - [`document`] for the JSON form of values (behind the `cli` feature)

/// Re-export transport types.
pub mod transport {
    pub use arraypipe_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use arraypipe_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use arraypipe_session::*;
}

#[cfg(feature = "cli")]
pub mod document;

pub use arraypipe_session::{receive, send, SessionConfig, SessionError, Value};
pub use arraypipe_transport::open_pipe;
