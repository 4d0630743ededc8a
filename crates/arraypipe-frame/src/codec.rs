use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::registry::{self, TypeCode};

/// Header: type code (4) + rows (4) + cols (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Default upper bound on a payload the receiver will allocate: 1 GiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024 * 1024;

/// Receiver → sender: the peer is listening and ready for the header.
pub const READY: u8 = b'r';

/// Receiver → sender after each payload chunk: chunk accepted.
pub const CHUNK_ACK: u8 = b'A';

/// Receiver → sender at the end of a session: transfer accepted.
pub const SESSION_ACK: u8 = b'a';

/// Receiver → sender at the end of a session: transfer failed.
pub const SESSION_NACK: u8 = b'n';

/// Array dimensions. `(0, 0)` is the empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    pub rows: u32,
    pub cols: u32,
}

impl Shape {
    pub const EMPTY: Shape = Shape { rows: 0, cols: 0 };

    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 && self.cols == 0
    }

    /// Number of elements.
    pub fn len(&self) -> u64 {
        u64::from(self.rows) * u64::from(self.cols)
    }

    /// Reject a zero dimension paired with a non-zero one.
    pub fn validate(&self) -> Result<()> {
        if (self.rows == 0) != (self.cols == 0) {
            return Err(FrameError::Shape {
                rows: self.rows,
                cols: self.cols,
                reason: "one dimension is zero and the other is not",
            });
        }
        Ok(())
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub type_code: TypeCode,
    pub shape: Shape,
}

impl Header {
    pub fn new(type_code: TypeCode, shape: Shape) -> Self {
        Self { type_code, shape }
    }

    /// Header announcing a value the sender could not marshal.
    pub fn invalid() -> Self {
        Self::new(TypeCode::Invalid, Shape::EMPTY)
    }

    /// `rows * cols * element_width`. Zero for `Invalid`.
    pub fn payload_size(&self) -> Result<usize> {
        let Some(width) = registry::element_width(self.type_code) else {
            return Ok(0);
        };
        let size = self
            .shape
            .len()
            .checked_mul(u64::from(width))
            .ok_or(FrameError::PayloadTooLarge {
                size: u64::MAX,
                max: usize::MAX as u64,
            })?;
        usize::try_from(size).map_err(|_| FrameError::PayloadTooLarge {
            size,
            max: usize::MAX as u64,
        })
    }
}

/// One complete typed-array transfer unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub type_code: TypeCode,
    pub shape: Shape,
    /// Column-major element bytes; complex elements interleave real then imaginary.
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame, checking the shape and that the payload length matches it.
    pub fn new(type_code: TypeCode, shape: Shape, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        let header = Header::new(type_code, shape);
        validate_outgoing(&header)?;
        let expected = header.payload_size()?;
        if payload.len() != expected {
            return Err(FrameError::PayloadLength {
                expected,
                actual: payload.len(),
            });
        }
        Ok(Self {
            type_code,
            shape,
            payload,
        })
    }

    /// An empty `(0, 0)` value of the given type.
    pub fn empty(type_code: TypeCode) -> Self {
        Self {
            type_code,
            shape: Shape::EMPTY,
            payload: Bytes::new(),
        }
    }

    pub fn header(&self) -> Header {
        Header::new(self.type_code, self.shape)
    }

    /// The total wire size of this frame (header + payload, without chunk framing).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a header into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬───────────┐
/// │ Type (4B LE) │ Rows      │ Cols      │
/// │              │ (4B LE)   │ (4B LE)   │
/// └──────────────┴───────────┴───────────┘
/// ```
pub fn encode_header(header: &Header, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    dst.put_u32_le(header.type_code.wire());
    dst.put_u32_le(header.shape.rows);
    dst.put_u32_le(header.shape.cols);
}

/// Encode a header into a fixed array.
pub fn header_bytes(header: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE);
    encode_header(header, &mut buf);
    let mut out = [0u8; HEADER_SIZE];
    out.copy_from_slice(&buf);
    out
}

/// Decode and validate a header.
///
/// Fails with [`FrameError::UnknownType`] for codes outside the registry,
/// [`FrameError::InvalidValue`] for the sentinel, and [`FrameError::Shape`]
/// for a zero dimension paired with a non-zero one.
pub fn decode_header(src: &[u8; HEADER_SIZE]) -> Result<Header> {
    let code = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
    let rows = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);
    let cols = u32::from_le_bytes([src[8], src[9], src[10], src[11]]);

    let type_code = TypeCode::from_wire(code).ok_or(FrameError::UnknownType(code))?;
    if type_code == TypeCode::Invalid {
        return Err(FrameError::InvalidValue);
    }

    let shape = Shape::new(rows, cols);
    shape.validate()?;

    let header = Header::new(type_code, shape);
    header.payload_size()?;
    Ok(header)
}

/// Checks a sender applies before transmitting: consistent shape, the
/// sentinel only as `(0, 0)`, and text limited to a single row.
pub fn validate_outgoing(header: &Header) -> Result<()> {
    header.shape.validate()?;
    match header.type_code {
        TypeCode::Invalid if !header.shape.is_empty() => Err(FrameError::Shape {
            rows: header.shape.rows,
            cols: header.shape.cols,
            reason: "the invalid sentinel carries no elements",
        }),
        TypeCode::String if header.shape.rows > 1 => Err(FrameError::Shape {
            rows: header.shape.rows,
            cols: header.shape.cols,
            reason: "text must be a single row",
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_header(code: u32, rows: u32, cols: u32) -> [u8; HEADER_SIZE] {
        let mut buf = BytesMut::new();
        buf.put_u32_le(code);
        buf.put_u32_le(rows);
        buf.put_u32_le(cols);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    #[test]
    fn test_encode_layout() {
        let header = Header::new(TypeCode::Float64, Shape::new(3, 2));
        let bytes = header_bytes(&header);
        assert_eq!(bytes, [8, 0, 0, 0, 3, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_decode_roundtrip() {
        for code in TypeCode::ALL.into_iter().filter(|c| *c != TypeCode::Invalid) {
            let header = Header::new(code, Shape::new(1, 7));
            assert_eq!(decode_header(&header_bytes(&header)).unwrap(), header);
        }
    }

    #[test]
    fn test_payload_size() {
        let header = Header::new(TypeCode::ComplexFloat64, Shape::new(3, 2));
        assert_eq!(header.payload_size().unwrap(), 96);
        let header = Header::new(TypeCode::Int16, Shape::EMPTY);
        assert_eq!(header.payload_size().unwrap(), 0);
        assert_eq!(Header::invalid().payload_size().unwrap(), 0);
    }

    #[test]
    fn test_decode_rejects_half_empty_shapes() {
        let err = decode_header(&raw_header(8, 0, 5)).unwrap_err();
        assert!(matches!(err, FrameError::Shape { rows: 0, cols: 5, .. }));
        let err = decode_header(&raw_header(8, 5, 0)).unwrap_err();
        assert!(matches!(err, FrameError::Shape { rows: 5, cols: 0, .. }));
    }

    #[test]
    fn test_decode_accepts_empty() {
        let header = decode_header(&raw_header(8, 0, 0)).unwrap();
        assert!(header.shape.is_empty());
        assert_eq!(header.payload_size().unwrap(), 0);
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = decode_header(&raw_header(42, 1, 1)).unwrap_err();
        assert!(matches!(err, FrameError::UnknownType(42)));
    }

    #[test]
    fn test_decode_invalid_sentinel() {
        let err = decode_header(&raw_header(0, 0, 0)).unwrap_err();
        assert!(matches!(err, FrameError::InvalidValue));
    }

    #[test]
    fn test_outgoing_text_single_row() {
        let ok = Header::new(TypeCode::String, Shape::new(1, 5));
        assert!(validate_outgoing(&ok).is_ok());
        let empty = Header::new(TypeCode::String, Shape::EMPTY);
        assert!(validate_outgoing(&empty).is_ok());
        let tall = Header::new(TypeCode::String, Shape::new(2, 5));
        assert!(matches!(
            validate_outgoing(&tall),
            Err(FrameError::Shape { rows: 2, .. })
        ));
    }

    #[test]
    fn test_frame_checks_payload_length() {
        let frame = Frame::new(TypeCode::Int32, Shape::new(2, 2), vec![0u8; 16]).unwrap();
        assert_eq!(frame.wire_size(), HEADER_SIZE + 16);

        let err = Frame::new(TypeCode::Int32, Shape::new(2, 2), vec![0u8; 15]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadLength {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn test_empty_frame() {
        let frame = Frame::empty(TypeCode::ComplexFloat32);
        assert!(frame.shape.is_empty());
        assert!(frame.payload.is_empty());
        assert_eq!(frame.header().payload_size().unwrap(), 0);
    }
}
