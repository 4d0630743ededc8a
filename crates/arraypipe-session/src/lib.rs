//! Transfer sessions for typed arrays over a pipe.
//!
//! One [`Receiver`] and one [`Sender`] per transfer, each driving a small
//! state machine over an exclusively owned [`Channel`](arraypipe_transport::Channel)
//! against a single session deadline:
//!
//! ```text
//! receiver                      sender
//!   'r' ───────────────────────▶ AwaitPeerReady
//!   AwaitHeader   ◀─────────────  header (12 bytes)
//!   AwaitPayload  ◀─────────────  chunks, each answered with 'A'
//!   'a' / 'n' ─────────────────▶ AwaitFinalAck
//!             ◀─────────────────  echo
//! ```
//!
//! Values cross the boundary through [`MarshalToWire`] and
//! [`UnmarshalFromWire`]; [`value::Value`] is the bundled implementation.

pub mod config;
pub mod error;
pub mod marshal;
pub mod receiver;
pub mod sender;
pub mod value;

pub use config::{PayloadFraming, SessionConfig};
pub use error::{Result, SessionError, Stage};
pub use marshal::{MarshalToWire, UnmarshalFromWire};
pub use receiver::{receive, Receiver, ReceiverState};
pub use sender::{send, Sender, SenderState};
pub use value::{Complex, NumericArray, NumericData, Value};
