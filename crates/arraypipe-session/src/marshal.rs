//! Conversion between host values and wire frames.
//!
//! Sessions never look inside a host value; they move [`Frame`]s and rely on
//! these two capabilities at either end.

use arraypipe_frame::Frame;

/// Sender-side capability: turn a value into a frame.
pub trait MarshalToWire {
    /// Returns the frame, or a human-readable reason the value cannot be sent.
    fn marshal_to_wire(&self) -> Result<Frame, String>;
}

/// Receiver-side capability: rebuild a value from a frame.
pub trait UnmarshalFromWire: Sized {
    /// Returns the value, or a human-readable reason the frame was not usable.
    fn unmarshal_from_wire(frame: Frame) -> Result<Self, String>;
}

/// Frames pass through unchanged.
impl MarshalToWire for Frame {
    fn marshal_to_wire(&self) -> Result<Frame, String> {
        Ok(self.clone())
    }
}

impl UnmarshalFromWire for Frame {
    fn unmarshal_from_wire(frame: Frame) -> Result<Self, String> {
        Ok(frame)
    }
}
