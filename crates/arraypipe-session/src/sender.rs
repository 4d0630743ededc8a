use arraypipe_frame::{
    default_block_size, header_bytes, validate_outgoing, write_with_ack, Frame, Header,
    FALLBACK_BLOCK_SIZE, SESSION_ACK, SESSION_NACK,
};
use arraypipe_transport::{deadline, Channel, Deadline};
use tracing::{debug, debug_span, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError, Stage};
use crate::marshal::MarshalToWire;

/// Sender progress through one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    AwaitPeerReady,
    SendHeader,
    SendPayload,
    AwaitFinalAck,
    Done,
    Failed,
}

/// Sending end of one transfer. Owns the channel until [`into_inner`](Self::into_inner).
#[derive(Debug)]
pub struct Sender<C> {
    channel: C,
    config: SessionConfig,
    state: SenderState,
}

impl<C: Channel> Sender<C> {
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self {
            channel,
            config,
            state: SenderState::AwaitPeerReady,
        }
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Hand the channel back to the caller.
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Send one value and wait for the receiver's verdict.
    ///
    /// A value that cannot be marshalled is still announced with an
    /// `Invalid` header so the receiver is not left waiting; the local
    /// [`SessionError::UnsupportedValue`] is returned afterwards.
    pub fn send<V: MarshalToWire + ?Sized>(&mut self, value: &V) -> Result<()> {
        if self.state != SenderState::AwaitPeerReady {
            return Err(SessionError::Protocol(format!(
                "sender session already ran (state {:?})",
                self.state
            )));
        }

        let span = debug_span!("sender", timeout = ?self.config.timeout);
        let _enter = span.enter();

        let result = self.run(value);
        match &result {
            Ok(()) => self.state = SenderState::Done,
            Err(err) => {
                warn!(error = %err, state = ?self.state, "send failed");
                self.state = SenderState::Failed;
            }
        }
        result
    }

    fn run<V: MarshalToWire + ?Sized>(&mut self, value: &V) -> Result<()> {
        let deadline = Deadline::after(self.config.timeout);
        self.await_peer_ready(&deadline)?;

        let marshalled = value.marshal_to_wire().and_then(|frame| {
            check_frame(&frame)?;
            Ok(frame)
        });
        let header = match &marshalled {
            Ok(frame) => frame.header(),
            Err(_) => Header::invalid(),
        };

        self.state = SenderState::SendHeader;
        deadline::write_exact(&mut self.channel, &header_bytes(&header), &deadline)
            .map_err(|err| SessionError::transport(Stage::Header, err))?;
        debug!(
            type_code = %header.type_code,
            rows = header.shape.rows,
            cols = header.shape.cols,
            "header sent"
        );

        let frame = match marshalled {
            Ok(frame) => frame,
            Err(reason) => {
                if let Err(err) = self.await_final_ack() {
                    debug!(error = %err, "final handshake after invalid header failed");
                }
                return Err(SessionError::UnsupportedValue(reason));
            }
        };

        self.state = SenderState::SendPayload;
        if !frame.payload.is_empty() {
            let block_size = self.block_size();
            match write_with_ack(&mut self.channel, &frame.payload, block_size, &deadline) {
                Ok(report) => debug!(
                    chunks = report.chunks,
                    bytes = report.bytes,
                    block_size,
                    "payload sent"
                ),
                Err(err) => {
                    let err = SessionError::frame(Stage::Payload, err);
                    if matches!(err, SessionError::PeerRejected) {
                        // The rejection arrived in place of a chunk ack; echo it.
                        self.echo(SESSION_NACK);
                    }
                    return Err(err);
                }
            }
        }

        self.state = SenderState::AwaitFinalAck;
        self.await_final_ack()?;
        debug!(elapsed = ?deadline.elapsed(), "transfer acknowledged");
        Ok(())
    }

    fn await_peer_ready(&mut self, deadline: &Deadline) -> Result<()> {
        let ready = deadline.capped(self.config.ready_timeout);
        let mut sync = [0u8; 1];
        deadline::read_exact(&mut self.channel, &mut sync, &ready)
            .map_err(|err| SessionError::transport(Stage::Sync, err))?;
        debug!(byte = sync[0], "peer ready");
        Ok(())
    }

    /// Read the receiver's status byte and echo it back.
    fn await_final_ack(&mut self) -> Result<()> {
        let handshake = Deadline::after(self.config.handshake_timeout);
        let mut status = [0u8; 1];
        deadline::read_exact(&mut self.channel, &mut status, &handshake)
            .map_err(|err| SessionError::transport(Stage::Ack, err))?;
        self.echo(status[0]);

        match status[0] {
            SESSION_ACK => Ok(()),
            SESSION_NACK => Err(SessionError::PeerRejected),
            other => Err(SessionError::Protocol(format!(
                "unexpected final acknowledgement {other:#04x}"
            ))),
        }
    }

    fn echo(&mut self, status: u8) {
        let handshake = Deadline::after(self.config.handshake_timeout);
        if let Err(err) = deadline::write_exact(&mut self.channel, &[status], &handshake) {
            debug!(error = %err, "handshake echo not delivered");
        }
    }

    fn block_size(&self) -> usize {
        if let Some(size) = self.config.block_size {
            return size;
        }
        match self.channel.buffer_sizes() {
            Ok(sizes) => default_block_size(sizes),
            Err(err) => {
                debug!(error = %err, "buffer size query failed, using fallback block size");
                FALLBACK_BLOCK_SIZE
            }
        }
    }
}

/// Reject frames whose fields disagree with each other.
fn check_frame(frame: &Frame) -> std::result::Result<(), String> {
    let header = frame.header();
    validate_outgoing(&header).map_err(|err| err.to_string())?;
    let expected = header.payload_size().map_err(|err| err.to_string())?;
    if frame.payload.len() != expected {
        return Err(format!(
            "payload is {} bytes, shape requires {expected}",
            frame.payload.len()
        ));
    }
    Ok(())
}

/// Send one value over `channel` with `config`.
pub fn send<C: Channel, V: MarshalToWire + ?Sized>(
    channel: C,
    value: &V,
    config: &SessionConfig,
) -> Result<()> {
    Sender::new(channel, config.clone()).send(value)
}
