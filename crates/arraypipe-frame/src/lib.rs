//! Typed-array framing for pipe transfers.
//!
//! A transfer is a 12-byte header followed by a payload:
//! - 4-byte little-endian type code from the [`registry`]
//! - 4-byte little-endian row count
//! - 4-byte little-endian column count
//! - `rows * cols * element_width` payload bytes, column-major
//!
//! Payloads are normally moved in acknowledged chunks with
//! [`write_with_ack`] and [`read_with_ack`].

pub mod codec;
pub mod error;
pub mod reader;
pub mod registry;
pub mod writer;

pub use codec::{
    decode_header, encode_header, header_bytes, validate_outgoing, Frame, Header, Shape,
    CHUNK_ACK, DEFAULT_MAX_PAYLOAD, HEADER_SIZE, READY, SESSION_ACK, SESSION_NACK,
};
pub use error::{FrameError, Result};
pub use reader::{read_raw, read_with_ack};
pub use registry::{element_width, is_complex, lookup, ElementKind, TypeCode, TypeInfo};
pub use writer::{
    default_block_size, write_with_ack, ChunkReport, CHUNK_HEADER_SIZE, DEFAULT_BLOCK_FRACTION,
    FALLBACK_BLOCK_SIZE,
};
