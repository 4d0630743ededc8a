use arraypipe_frame::{
    decode_header, read_raw, read_with_ack, Frame, HEADER_SIZE, READY, SESSION_ACK, SESSION_NACK,
};
use arraypipe_transport::{deadline, Channel, Deadline};
use bytes::Bytes;
use tracing::{debug, debug_span, warn};

use crate::config::{PayloadFraming, SessionConfig};
use crate::error::{Result, SessionError, Stage};
use crate::marshal::UnmarshalFromWire;

/// Receiver progress through one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    AwaitHeader,
    AwaitPayload,
    Acknowledging,
    Done,
    Failed,
}

/// Receiving end of one transfer. Owns the channel until [`into_inner`](Self::into_inner).
#[derive(Debug)]
pub struct Receiver<C> {
    channel: C,
    config: SessionConfig,
    state: ReceiverState,
}

impl<C: Channel> Receiver<C> {
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self {
            channel,
            config,
            state: ReceiverState::AwaitHeader,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Hand the channel back to the caller.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Receive one value.
    ///
    /// The peer is acknowledged before the payload is converted, so a
    /// conversion failure is reported only after the sender was released.
    pub fn receive<V: UnmarshalFromWire>(&mut self) -> Result<V> {
        let frame = self.receive_frame()?;
        let type_code = frame.type_code;
        V::unmarshal_from_wire(frame).map_err(|reason| {
            warn!(%type_code, %reason, "received payload could not be converted");
            SessionError::Conversion { type_code, reason }
        })
    }

    /// Receive one frame and complete the final handshake.
    ///
    /// Every failure after the channel was handed over is answered with a
    /// negative acknowledgement before it is returned.
    pub fn receive_frame(&mut self) -> Result<Frame> {
        if self.state != ReceiverState::AwaitHeader {
            return Err(SessionError::Protocol(format!(
                "receiver session already ran (state {:?})",
                self.state
            )));
        }

        let span = debug_span!("receiver", timeout = ?self.config.timeout);
        let _enter = span.enter();
        let deadline = Deadline::after(self.config.timeout);

        let frame = match self.read_frame(&deadline) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, state = ?self.state, "receive failed, rejecting transfer");
                self.state = ReceiverState::Failed;
                if let Err(nack_err) = self.finish(SESSION_NACK, &deadline) {
                    debug!(error = %nack_err, "negative acknowledgement not delivered");
                }
                return Err(err);
            }
        };

        self.state = ReceiverState::Acknowledging;
        if let Err(err) = self.finish(SESSION_ACK, &deadline) {
            self.state = ReceiverState::Failed;
            return Err(err);
        }
        self.state = ReceiverState::Done;
        debug!(
            type_code = %frame.type_code,
            rows = frame.shape.rows,
            cols = frame.shape.cols,
            bytes = frame.payload.len(),
            elapsed = ?deadline.elapsed(),
            "transfer received"
        );
        Ok(frame)
    }

    fn read_frame(&mut self, deadline: &Deadline) -> Result<Frame> {
        if self.config.signal_ready {
            deadline::write_exact(&mut self.channel, &[READY], deadline)
                .map_err(|err| SessionError::transport(Stage::Sync, err))?;
            debug!("signalled ready");
        }

        let mut raw = [0u8; HEADER_SIZE];
        deadline::read_exact(&mut self.channel, &mut raw[..4], deadline)
            .map_err(|err| SessionError::transport(Stage::Header, err))?;
        deadline::read_exact(&mut self.channel, &mut raw[4..], deadline)
            .map_err(|err| SessionError::transport(Stage::Shape, err))?;

        let header = decode_header(&raw).map_err(|err| SessionError::frame(Stage::Header, err))?;
        let size = header
            .payload_size()
            .map_err(|err| SessionError::frame(Stage::Header, err))?;
        if size > self.config.max_payload_size {
            return Err(SessionError::PayloadTooLarge {
                size: size as u64,
                max: self.config.max_payload_size as u64,
            });
        }
        debug!(
            type_code = %header.type_code,
            rows = header.shape.rows,
            cols = header.shape.cols,
            size,
            "header received"
        );

        self.state = ReceiverState::AwaitPayload;
        let payload = if size == 0 {
            Bytes::new()
        } else {
            match self.config.payload_framing {
                PayloadFraming::Chunked => read_with_ack(&mut self.channel, size, deadline),
                PayloadFraming::Raw => read_raw(&mut self.channel, size, deadline),
            }
            .map_err(|err| SessionError::frame(Stage::Payload, err))?
        };

        Ok(Frame {
            type_code: header.type_code,
            shape: header.shape,
            payload,
        })
    }

    /// Send the session status byte and wait for the peer's echo.
    ///
    /// The status write has its own bound so a rejection still goes out after
    /// the session budget is spent. The echo wait never outlives the session
    /// deadline and is skipped once it has passed. A missing or wrong echo is
    /// only logged.
    fn finish(&mut self, status: u8, session: &Deadline) -> Result<()> {
        let handshake = Deadline::after(self.config.handshake_timeout);
        deadline::write_exact(&mut self.channel, &[status], &handshake)
            .map_err(|err| SessionError::transport(Stage::Ack, err))?;

        let echo_deadline = session.capped(self.config.handshake_timeout);
        if echo_deadline.is_expired() {
            debug!(status = %char::from(status), "session budget spent, not waiting for echo");
            return Ok(());
        }

        let mut echo = [0u8; 1];
        match deadline::read_exact(&mut self.channel, &mut echo, &echo_deadline) {
            Ok(()) if echo[0] == status => {
                debug!(status = %char::from(status), "handshake complete")
            }
            Ok(()) => warn!(
                sent = %char::from(status),
                got = echo[0],
                "peer echoed an unexpected handshake byte"
            ),
            Err(err) => debug!(error = %err, "no handshake echo from peer"),
        }
        Ok(())
    }
}

/// Receive one value over `channel` with `config`.
pub fn receive<C: Channel, V: UnmarshalFromWire>(
    channel: C,
    config: &SessionConfig,
) -> Result<V> {
    Receiver::new(channel, config.clone()).receive()
}
