//! §4.3 Connection FSM: protocol-header exchange, `open`/`close`,
//! idle-timeout heartbeats, and channel demultiplexing to sessions.

/// Error types for this module.
pub mod error;

use std::collections::BTreeMap;

use amqp_types::definitions::{
    AmqpError as AmqpErrorCondition, ConnectionError as ConnectionErrorCondition, Error as AmqpProtocolError,
    ErrorCondition, MIN_MAX_FRAME_SIZE,
};
use amqp_types::performatives::{Close, Open, Performative};
use bytes::BytesMut;
use slab::Slab;
use tracing::{instrument, trace};

/// Re-exported error types.
pub use error::{Error, SendError};

use crate::frame::{
    self, encode_amqp_frame, encode_empty_frame, Frame, FrameBody, FrameCodec, AMQP_PROTOCOL_HEADER,
};
use crate::session::Session;
use crate::transport::Transport;

/// State of the connection FSM (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing sent or received yet.
    Start,
    /// We have sent our protocol header.
    HdrSent,
    /// We have received the remote's protocol header but not sent ours
    /// (never observed in this client-only implementation, kept for
    /// completeness of the state table).
    HdrRcvd,
    /// Both protocol headers have been exchanged.
    HdrExch,
    /// We have sent `open` and are waiting for the remote's.
    OpenSent,
    /// We have received the remote's `open` but not sent ours (never
    /// observed; this implementation always opens immediately after
    /// `HdrExch`).
    OpenRcvd,
    /// Both peers have exchanged `open`; normal operation.
    Opened,
    /// We sent `close` and are waiting for the remote's.
    CloseSent,
    /// We received `close` and have not yet sent ours.
    CloseRcvd,
    /// The connection is being torn down after a fatal error, before the
    /// close handshake completes.
    Discarding,
    /// Terminal: the connection is closed.
    End,
}

/// Parameters the application supplies when opening a connection.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// `container-id`, mandatory non-null.
    pub container_id: String,
    /// `hostname`, for virtual-hosting peers.
    pub hostname: Option<String>,
    /// Largest frame this side is willing to receive.
    pub max_frame_size: u32,
    /// Highest channel number this side is willing to use.
    pub channel_max: u16,
    /// Idle timeout this side proposes, in milliseconds.
    pub idle_time_out: Option<u32>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            container_id: String::new(),
            hostname: None,
            max_frame_size: 64 * 1024,
            channel_max: u16::MAX,
            idle_time_out: None,
        }
    }
}

impl OpenOptions {
    fn to_open(&self) -> Open {
        Open {
            container_id: self.container_id.clone(),
            hostname: self.hostname.clone(),
            max_frame_size: self.max_frame_size.max(MIN_MAX_FRAME_SIZE),
            channel_max: self.channel_max,
            idle_time_out: self.idle_time_out,
            ..Default::default()
        }
    }
}

/// Chained-setter builder for [`Connection`], mirroring
/// [`OpenOptions`]'s fields one for one. Terminal method is [`Builder::build`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    options: OpenOptions,
}

impl Builder {
    /// Start from [`OpenOptions::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// `container-id`, mandatory non-null.
    pub fn container_id(mut self, container_id: impl Into<String>) -> Self {
        self.options.container_id = container_id.into();
        self
    }

    /// `hostname`, for virtual-hosting peers.
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.options.hostname = Some(hostname.into());
        self
    }

    /// Largest frame this side is willing to receive.
    pub fn max_frame_size(mut self, max_frame_size: u32) -> Self {
        self.options.max_frame_size = max_frame_size;
        self
    }

    /// Highest channel number this side is willing to use.
    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.options.channel_max = channel_max;
        self
    }

    /// Idle timeout this side proposes, in milliseconds.
    pub fn idle_time_out(mut self, idle_time_out: u32) -> Self {
        self.options.idle_time_out = Some(idle_time_out);
        self
    }

    /// Construct the connection. Does not send the protocol header;
    /// call [`Connection::open`] to start the handshake.
    pub fn build(self) -> Connection {
        Connection::new(self.options)
    }
}

/// A state-change notification delivered to the application via the
/// connection's state callback (§6: `on_connection_state`).
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// `open` has been exchanged in both directions.
    Opened,
    /// The remote sent `close`, optionally with an error.
    RemoteClosed(Option<AmqpProtocolError>),
    /// The connection has reached `End` and can no longer be used.
    Closed,
}

type StateCallback = Box<dyn FnMut(StateChange)>;

/// A sans-io AMQP connection: owns the session table and the framing
/// state machine for one TCP byte stream. The host drives it with
/// [`Connection::on_bytes_received`] and [`Connection::on_tick`] and
/// writes whatever bytes [`Connection::take_outbound`] returns to its
/// transport.
pub struct Connection {
    state: State,
    local: OpenOptions,
    remote_open: Option<Open>,
    codec: FrameCodec,
    outbound: BytesMut,
    header_sent: bool,
    sessions: Slab<Session>,
    local_channel_to_session: BTreeMap<u16, usize>,
    remote_channel_to_session: BTreeMap<u16, usize>,
    last_received_millis: u64,
    last_sent_millis: u64,
    on_state_change: Option<StateCallback>,
    close_error: Option<AmqpProtocolError>,
}

impl Connection {
    /// Start a [`Builder`] for configuring a connection before creation.
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Create a connection in the `Start` state. Call
    /// [`Connection::open`] to begin the handshake.
    pub fn new(local: OpenOptions) -> Self {
        let local_max_frame_size = local.max_frame_size;
        Connection {
            state: State::Start,
            local,
            remote_open: None,
            codec: FrameCodec::new(local_max_frame_size),
            outbound: BytesMut::new(),
            header_sent: false,
            sessions: Slab::new(),
            local_channel_to_session: BTreeMap::new(),
            remote_channel_to_session: BTreeMap::new(),
            last_received_millis: 0,
            last_sent_millis: 0,
            on_state_change: None,
            close_error: None,
        }
    }

    /// Register the callback invoked on every connection state change.
    pub fn set_state_callback(&mut self, cb: impl FnMut(StateChange) + 'static) {
        self.on_state_change = Some(Box::new(cb));
    }

    /// Current FSM state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The remote's negotiated `open` parameters, available once
    /// [`State::Opened`] is reached.
    pub fn remote_open(&self) -> Option<&Open> {
        self.remote_open.as_ref()
    }

    /// The max-frame-size agreed with the remote (the smaller of the two
    /// proposals), `None` until `open` has round-tripped.
    pub fn remote_max_frame_size(&self) -> Option<u32> {
        self.remote_open.as_ref().map(|o| o.max_frame_size)
    }

    /// Begin the handshake: sends the protocol header immediately.
    #[instrument(name = "SEND", skip_all)]
    pub fn open(&mut self) {
        if self.state != State::Start {
            return;
        }
        trace!("protocol header");
        self.outbound.extend_from_slice(&AMQP_PROTOCOL_HEADER);
        self.header_sent = true;
        self.state = State::HdrSent;
    }

    /// Feed newly-received bytes from the transport.
    pub fn on_bytes_received(&mut self, now_millis: u64, bytes: &[u8]) -> Result<(), Error> {
        self.last_received_millis = now_millis;
        if matches!(self.state, State::Start | State::HdrSent) && !self.remote_header_consumed() {
            self.consume_header(bytes)?;
            return Ok(());
        }
        self.codec.push_bytes(bytes);
        loop {
            match self.codec.try_decode_frame() {
                Ok(Some(frame)) => {
                    if let Err(err) = self.on_incoming_frame(frame) {
                        if self.state != State::End {
                            let condition = dispatch_error_condition(&err);
                            self.fatal(condition, err.to_string());
                        }
                        return Err(err);
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    self.fatal(ConnectionErrorCondition::FramingError, err.to_string());
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    fn remote_header_consumed(&self) -> bool {
        matches!(self.state, State::HdrExch | State::OpenSent | State::OpenRcvd | State::Opened)
    }

    fn consume_header(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() < 8 {
            // A real transport should coalesce; a short first read is
            // tolerated by treating it as not-yet-matched and waiting.
            return Ok(());
        }
        if bytes[..8] != AMQP_PROTOCOL_HEADER {
            self.transition_to_end();
            return Err(Error::ProtocolHeaderMismatch);
        }
        self.state = State::HdrExch;
        if !self.header_sent {
            self.outbound.extend_from_slice(&AMQP_PROTOCOL_HEADER);
            self.header_sent = true;
        }
        self.send_open();
        if bytes.len() > 8 {
            self.codec.push_bytes(&bytes[8..]);
            while let Some(frame) = self.codec.try_decode_frame()? {
                if let Err(err) = self.on_incoming_frame(frame) {
                    if self.state != State::End {
                        let condition = dispatch_error_condition(&err);
                        self.fatal(condition, err.to_string());
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    #[instrument(name = "SEND", skip_all)]
    fn send_open(&mut self) {
        let open = self.local.to_open();
        trace!(container_id = %open.container_id, "open");
        let performative = Performative::Open(open);
        let encoded =
            encode_amqp_frame(0, &performative, &[], u32::MAX).expect("open performative never exceeds u32::MAX");
        self.outbound.extend_from_slice(&encoded);
        self.state = State::OpenSent;
    }

    #[instrument(name = "RECV", skip_all)]
    fn on_incoming_frame(&mut self, frame: Frame) -> Result<(), Error> {
        match frame.body {
            FrameBody::Empty => Ok(()),
            FrameBody::Sasl(_) => Err(Error::IllegalState(self.state)),
            FrameBody::Amqp { performative, payload } => match performative {
                Performative::Open(open) => self.on_incoming_open(open),
                Performative::Close(close) => self.on_incoming_close(close),
                other => self.dispatch_to_session(frame.channel, other, payload),
            },
        }
    }

    #[instrument(name = "RECV", skip_all)]
    fn on_incoming_open(&mut self, open: Open) -> Result<(), Error> {
        if self.state != State::OpenSent {
            return Err(Error::IllegalState(self.state));
        }
        trace!(container_id = %open.container_id, "open");
        self.remote_open = Some(open);
        self.state = State::Opened;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Opened);
        }
        self.flush_pending_sessions();
        Ok(())
    }

    #[instrument(name = "RECV", skip_all)]
    fn on_incoming_close(&mut self, close: Close) -> Result<(), Error> {
        let remote_error = close.error;
        match self.state {
            State::CloseSent => {
                self.transition_to_end();
            }
            _ => {
                self.state = State::CloseRcvd;
                if let Some(cb) = self.on_state_change.as_mut() {
                    cb(StateChange::RemoteClosed(remote_error.clone()));
                }
                self.send_close(None);
                self.transition_to_end();
            }
        }
        if remote_error.is_some() {
            self.close_error = remote_error.clone();
        }
        Err(Error::RemoteClosed(remote_error))
    }

    fn dispatch_to_session(&mut self, channel: u16, performative: Performative, payload: bytes::Bytes) -> Result<(), Error> {
        if self.state != State::Opened && self.state != State::CloseSent {
            return Err(Error::IllegalState(self.state));
        }

        if let Performative::Begin(begin) = &performative {
            if let Some(local_channel) = begin.remote_channel {
                if let Some(&idx) = self.local_channel_to_session.get(&local_channel) {
                    self.remote_channel_to_session.insert(channel, idx);
                }
            }
        }

        let idx = match self.remote_channel_to_session.get(&channel) {
            Some(&idx) => idx,
            None => return Err(Error::UnknownChannel(channel)),
        };
        let outcome = self
            .sessions
            .get_mut(idx)
            .expect("channel table never references a freed session")
            .on_incoming(performative, payload);
        self.apply_session_outcome(idx, outcome);
        Ok(())
    }

    /// Allocate a new session and, if the connection is already
    /// `Opened`, send its `begin` immediately; otherwise it is queued
    /// and flushed once `open` round-trips.
    pub fn create_session(&mut self, params: crate::session::BeginOptions) -> Result<crate::session::SessionHandle, Error> {
        if self.local_channel_to_session.len() >= self.local.channel_max as usize + 1 {
            return Err(Error::ChannelMaxReached);
        }
        let local_channel = (0..=self.local.channel_max)
            .find(|c| !self.local_channel_to_session.contains_key(c))
            .ok_or(Error::ChannelMaxReached)?;
        let session = Session::new(local_channel, params);
        let idx = self.sessions.insert(session);
        self.local_channel_to_session.insert(local_channel, idx);
        if self.state == State::Opened {
            self.send_session_begin(idx);
        }
        Ok(crate::session::SessionHandle::new(idx))
    }

    /// Borrow a previously created session for issuing API calls
    /// (`create_sender`, `create_receiver`, `end`, ...).
    pub fn session_mut(&mut self, handle: &crate::session::SessionHandle) -> Option<&mut Session> {
        self.sessions.get_mut(handle.index())
    }

    fn flush_pending_sessions(&mut self) {
        let pending: Vec<usize> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.state() == crate::session::State::Unmapped)
            .map(|(idx, _)| idx)
            .collect();
        for idx in pending {
            self.send_session_begin(idx);
        }
    }

    #[instrument(name = "SEND", skip_all)]
    fn send_session_begin(&mut self, idx: usize) {
        let local_channel = *self
            .local_channel_to_session
            .iter()
            .find(|(_, &v)| v == idx)
            .map(|(k, _)| k)
            .expect("session was registered under a local channel at creation");
        let session = self.sessions.get_mut(idx).expect("valid session index");
        let begin = session.send_begin();
        trace!(channel = local_channel, "begin");
        let performative = Performative::Begin(begin);
        let encoded = encode_amqp_frame(local_channel, &performative, &[], u32::MAX)
            .expect("begin performative never exceeds u32::MAX");
        self.outbound.extend_from_slice(&encoded);
    }

    fn apply_session_outcome(&mut self, idx: usize, outcome: crate::session::Outcome) {
        let remote_max_frame_size = self.remote_max_frame_size().unwrap_or(u32::MAX);
        for frame_out in outcome.frames {
            let local_channel = *self
                .local_channel_to_session
                .iter()
                .find(|(_, &v)| v == idx)
                .map(|(k, _)| k)
                .unwrap_or(&0);
            match encode_amqp_frame(local_channel, &frame_out.performative, &frame_out.payload, remote_max_frame_size) {
                Ok(encoded) => self.outbound.extend_from_slice(&encoded),
                Err(err) => trace!(error = %err, "dropping oversized outbound frame"),
            }
        }
        if outcome.ended {
            self.sessions.remove(idx);
            self.local_channel_to_session.retain(|_, &mut v| v != idx);
            self.remote_channel_to_session.retain(|_, &mut v| v != idx);
        }
    }

    /// Encode and buffer frames produced by a direct [`Session`] mutator
    /// call (`create_link`, `send`, `flow`, `settle`, `end`) obtained via
    /// [`Connection::session_mut`]. The session itself has no route to
    /// the channel table or the negotiated max-frame-size, so callers
    /// must drain its return value through this method rather than
    /// writing to the transport directly.
    pub fn send_session_frames(&mut self, handle: &crate::session::SessionHandle, frames: Vec<crate::frame::OutgoingFrame>) {
        let remote_max_frame_size = self.remote_max_frame_size().unwrap_or(u32::MAX);
        let local_channel = *self
            .local_channel_to_session
            .iter()
            .find(|(_, &v)| v == handle.index())
            .map(|(k, _)| k)
            .unwrap_or(&0);
        for frame_out in frames {
            match encode_amqp_frame(local_channel, &frame_out.performative, &frame_out.payload, remote_max_frame_size) {
                Ok(encoded) => self.outbound.extend_from_slice(&encoded),
                Err(err) => trace!(error = %err, "dropping oversized outbound frame"),
            }
        }
    }

    /// Drain bytes the connection wants written to the transport. The
    /// host should call this after every `on_*` entry point and write
    /// the result to its [`Transport`].
    pub fn take_outbound(&mut self) -> BytesMut {
        std::mem::take(&mut self.outbound)
    }

    /// Convenience wrapper around [`Connection::take_outbound`] that
    /// writes directly to a [`Transport`], looping on partial writes.
    pub fn flush(&mut self, transport: &mut dyn Transport) -> Result<(), crate::transport::TransportError> {
        let buf = self.take_outbound();
        let mut written = 0;
        while written < buf.len() {
            written += transport.send(&buf[written..])?;
        }
        if !buf.is_empty() {
            self.last_sent_millis = self.last_received_millis;
        }
        Ok(())
    }

    /// Drive timers: idle-timeout keepalive and expiry detection. The
    /// host calls this at least once per second with a monotonic
    /// millisecond clock.
    pub fn on_tick(&mut self, now_millis: u64) -> Result<(), Error> {
        if self.state != State::Opened {
            return Ok(());
        }
        let Some(remote_idle) = self.remote_open.as_ref().and_then(|o| o.idle_time_out) else {
            return Ok(());
        };
        if remote_idle == 0 {
            return Ok(());
        }
        let half = (remote_idle / 2) as u64;
        if now_millis.saturating_sub(self.last_sent_millis) >= half {
            self.outbound.extend_from_slice(&encode_empty_frame());
            self.last_sent_millis = now_millis;
        }
        if let Some(local_idle) = self.local.idle_time_out {
            if now_millis.saturating_sub(self.last_received_millis) >= local_idle as u64 {
                self.fatal(AmqpErrorCondition::ResourceLimitExceeded, "idle timeout".to_string());
                return Err(Error::IdleTimeout);
            }
        }
        Ok(())
    }

    /// Request a graceful close. Sends `close` and transitions to
    /// `CloseSent`; the connection reaches `End` once the remote's
    /// `close` is observed (or immediately, if it already sent one).
    pub fn close(&mut self) {
        if self.state == State::CloseSent || self.state == State::End {
            return;
        }
        self.send_close(None);
        if self.state == State::CloseRcvd {
            self.transition_to_end();
        } else {
            self.state = State::CloseSent;
        }
    }

    #[instrument(name = "SEND", skip_all)]
    fn send_close(&mut self, error: Option<AmqpProtocolError>) {
        trace!("close");
        let close = Close { error };
        let performative = Performative::Close(close);
        let encoded =
            encode_amqp_frame(0, &performative, &[], u32::MAX).expect("close performative never exceeds u32::MAX");
        self.outbound.extend_from_slice(&encoded);
    }

    fn fatal(&mut self, condition: impl Into<ErrorCondition>, description: String) {
        let error = AmqpProtocolError::new(condition, Some(description), None);
        self.send_close(Some(error.clone()));
        self.close_error = Some(error);
        self.transition_to_end();
    }

    fn transition_to_end(&mut self) {
        if self.state == State::End {
            return;
        }
        self.state = State::End;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Closed);
        }
    }
}

/// Maps a dispatch-time error to the close condition it warrants. An
/// unknown channel is a protocol violation distinct from a genuine
/// framing failure (§4.3: "A frame for an unknown channel is a
/// protocol error -> close(amqp:not-allowed)").
fn dispatch_error_condition(err: &Error) -> ErrorCondition {
    match err {
        Error::UnknownChannel(_) => AmqpErrorCondition::NotAllowed.into(),
        _ => ConnectionErrorCondition::FramingError.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_exchange_then_open() {
        let mut conn = Connection::new(OpenOptions { container_id: "test".into(), ..Default::default() });
        conn.open();
        let out = conn.take_outbound();
        assert_eq!(&out[..8], &AMQP_PROTOCOL_HEADER);
        assert_eq!(conn.state(), State::HdrSent);

        let mut remote_open_frame = AMQP_PROTOCOL_HEADER.to_vec();
        let remote_open = Performative::Open(Open { container_id: "remote".into(), ..Default::default() });
        remote_open_frame.extend_from_slice(&encode_amqp_frame(0, &remote_open, &[], u32::MAX).unwrap());

        conn.on_bytes_received(0, &remote_open_frame).unwrap();
        assert_eq!(conn.state(), State::Opened);
        assert_eq!(conn.remote_open().unwrap().container_id, "remote");
    }

    #[test]
    fn mismatched_header_is_fatal() {
        let mut conn = Connection::new(OpenOptions::default());
        conn.open();
        conn.take_outbound();
        let err = conn.on_bytes_received(0, b"GARBAGE!").unwrap_err();
        assert!(matches!(err, Error::ProtocolHeaderMismatch));
        assert_eq!(conn.state(), State::End);
    }
}
