//! §4.4 Session FSM: `begin`/`end`, transfer-id sequencing, credit
//! window accounting, and handle routing to link endpoints.

/// Error types for this module.
pub mod error;

use std::collections::BTreeMap;

use amqp_types::definitions::{Handle, Role, SessionError as SessionErrorCondition};
use amqp_types::messaging::{DeliveryState, Message};
use amqp_types::performatives::{Begin, Disposition, End, Performative, Transfer};
use bytes::{Bytes, BytesMut};
use slab::Slab;
use tracing::{instrument, trace};

/// Re-exported error types.
pub use error::{Error, SendError};

use crate::frame::OutgoingFrame;
use crate::link::{AttachOptions, Link};
use crate::serial;

/// State of the session FSM (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No `begin` sent or received.
    Unmapped,
    /// We sent `begin`, waiting for the remote's.
    BeginSent,
    /// We received the remote's `begin` but have not sent ours (never
    /// observed; this implementation always begins immediately).
    BeginRcvd,
    /// Both sides have exchanged `begin`.
    Mapped,
    /// We sent `end`, waiting for the remote's.
    EndSent,
    /// We received `end` but have not sent ours yet.
    EndRcvd,
    /// The session is being torn down after a fatal error.
    Discarding,
}

/// A state-change notification for one session (§6: `on_session_state`).
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// The begin exchange completed.
    Mapped,
    /// The session has ended, optionally with an error.
    Ended(Option<amqp_types::definitions::Error>),
}

/// Parameters the application supplies when beginning a session.
#[derive(Debug, Clone, Copy)]
pub struct BeginOptions {
    /// The initial incoming-window this side advertises.
    pub incoming_window: u32,
    /// The initial outgoing-window this side advertises.
    pub outgoing_window: u32,
    /// The largest link handle value this side will accept.
    pub handle_max: u32,
}

impl Default for BeginOptions {
    fn default() -> Self {
        BeginOptions { incoming_window: 2048, outgoing_window: 2048, handle_max: u32::MAX }
    }
}

/// Chained-setter builder for a [`Session`], mirroring [`BeginOptions`]'s
/// fields one for one. Terminal method is [`Builder::begin`].
///
/// ```ignore
/// let handle = Session::builder()
///     .handle_max(128)
///     .begin(&mut connection)
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    options: BeginOptions,
}

impl Builder {
    /// Start from [`BeginOptions::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial incoming-window this side advertises.
    pub fn incoming_window(mut self, incoming_window: u32) -> Self {
        self.options.incoming_window = incoming_window;
        self
    }

    /// The initial outgoing-window this side advertises.
    pub fn outgoing_window(mut self, outgoing_window: u32) -> Self {
        self.options.outgoing_window = outgoing_window;
        self
    }

    /// The largest link handle value this side will accept.
    pub fn handle_max(mut self, handle_max: u32) -> Self {
        self.options.handle_max = handle_max;
        self
    }

    /// Begin the session on `connection`, sending `begin` immediately
    /// if the connection is already open.
    pub fn begin(self, connection: &mut crate::connection::Connection) -> Result<SessionHandle, crate::connection::Error> {
        connection.create_session(self.options)
    }
}

impl Session {
    /// Start a [`Builder`] for configuring a session before `begin`.
    pub fn builder() -> Builder {
        Builder::new()
    }
}

/// Opaque reference to a session owned by a [`crate::connection::Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHandle(usize);

impl SessionHandle {
    pub(crate) fn new(index: usize) -> Self {
        SessionHandle(index)
    }

    pub(crate) fn index(&self) -> usize {
        self.0
    }
}

/// The result of feeding one incoming performative to a session: zero or
/// more frames to send in reply, and whether the session has now ended
/// and should be removed from the connection's channel table.
#[derive(Debug, Default)]
pub struct Outcome {
    /// Frames to encode and send, in order.
    pub frames: Vec<OutgoingFrame>,
    /// Set once the session has reached a terminal state.
    pub ended: bool,
}

/// The fixed `size`/`doff`/`type`/`channel` header preceding every
/// frame on the wire (§2.3).
const FRAME_HEADER_LEN: u32 = 8;

/// A session: per-channel multiplexing of link endpoints and
/// transfer-flow accounting (§4.4).
pub struct Session {
    local_channel: u16,
    state: State,
    next_outgoing_id: u32,
    next_incoming_id: u32,
    incoming_window: u32,
    outgoing_window: u32,
    remote_incoming_window: u32,
    remote_outgoing_window: u32,
    options: BeginOptions,
    links: Slab<Link>,
    local_handle_to_link: BTreeMap<u32, usize>,
    remote_handle_to_link: BTreeMap<u32, usize>,
    on_state_change: Option<Box<dyn FnMut(StateChange)>>,
}

impl Session {
    pub(crate) fn new(local_channel: u16, options: BeginOptions) -> Self {
        Session {
            local_channel,
            state: State::Unmapped,
            next_outgoing_id: 0,
            next_incoming_id: 0,
            incoming_window: options.incoming_window,
            outgoing_window: options.outgoing_window,
            remote_incoming_window: 0,
            remote_outgoing_window: 0,
            options,
            links: Slab::new(),
            local_handle_to_link: BTreeMap::new(),
            remote_handle_to_link: BTreeMap::new(),
            on_state_change: None,
        }
    }

    /// Register the callback fired on begin/end.
    pub fn set_state_callback(&mut self, cb: impl FnMut(StateChange) + 'static) {
        self.on_state_change = Some(Box::new(cb));
    }

    /// Current FSM state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The local channel this session is mapped to.
    pub fn local_channel(&self) -> u16 {
        self.local_channel
    }

    /// `remote_incoming_window`, the number of transfers this session
    /// may still send before blocking (§4.4 critical invariant).
    pub fn remote_incoming_window(&self) -> u32 {
        self.remote_incoming_window
    }

    /// Borrow a link by its local handle.
    pub fn link(&self, handle: Handle) -> Option<&Link> {
        self.local_handle_to_link.get(&handle.0).and_then(|&idx| self.links.get(idx))
    }

    pub(crate) fn send_begin(&mut self) -> Begin {
        self.state = State::BeginSent;
        Begin {
            remote_channel: None,
            next_outgoing_id: self.next_outgoing_id,
            incoming_window: self.incoming_window,
            outgoing_window: self.outgoing_window,
            handle_max: self.options.handle_max,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// Attach a new link. Returns its local handle immediately; the
    /// `attach` frame is sent right away if the session is already
    /// `Mapped`, or queued until it is.
    pub fn create_link(&mut self, role: Role, mut options: AttachOptions) -> (Handle, Vec<OutgoingFrame>) {
        options.role = role;
        let local_handle = Handle((0..self.options.handle_max).find(|h| !self.local_handle_to_link.contains_key(h)).unwrap_or(0));
        let mut link = Link::new(local_handle, options);
        let mut frames = Vec::new();
        if self.state == State::Mapped {
            frames.push(OutgoingFrame::new(Performative::Attach(link.send_attach())));
        }
        let idx = self.links.insert(link);
        self.local_handle_to_link.insert(local_handle.0, idx);
        (local_handle, frames)
    }

    /// Send a message on a sender link, fragmenting it across
    /// `remote_max_frame_size` as needed.
    pub fn send(
        &mut self,
        link_handle: Handle,
        message: &Message,
        remote_max_frame_size: u32,
        on_settled: Box<dyn FnMut(DeliveryState)>,
    ) -> Result<(u32, Vec<OutgoingFrame>), SendError> {
        let idx = *self.local_handle_to_link.get(&link_handle.0).ok_or(crate::link::Error::IllegalState)?;
        let link = self.links.get_mut(idx).expect("handle table never references a freed link");
        if link.state() != crate::link::State::Attached || !link.has_credit() {
            return Err(SendError::WouldBlock);
        }

        let mut encoded = BytesMut::new();
        for value in message.to_values() {
            value.encode(&mut encoded);
        }
        let encoded = encoded.freeze();

        // The first fragment's performative carries delivery-id,
        // delivery-tag and message-format; continuations omit all three
        // and so encode smaller. Measure each shape for real rather than
        // budgeting off one flat guess, so a small `remote_max_frame_size`
        // (a misbehaving or merely austere peer) still yields a sane
        // chunk size instead of collapsing toward single-byte fragments.
        let delivery_id = self.next_outgoing_id;
        let tag = link.peek_delivery_tag();
        let first_overhead = FRAME_HEADER_LEN + transfer_template(link, Some(delivery_id), Some(tag.clone()), Some(0)).to_value().encoded_size() as u32;
        let continuation_overhead = FRAME_HEADER_LEN + transfer_template(link, None, None, None).to_value().encoded_size() as u32;
        let first_chunk = remote_max_frame_size.saturating_sub(first_overhead).max(1) as usize;
        let rest_chunk = remote_max_frame_size.saturating_sub(continuation_overhead).max(1) as usize;

        let fragment_count = if encoded.len() <= first_chunk {
            1
        } else {
            1 + (encoded.len() - first_chunk).div_ceil(rest_chunk)
        };
        if self.remote_incoming_window < fragment_count as u32 {
            return Err(SendError::WouldBlock);
        }

        self.next_outgoing_id = serial::add(self.next_outgoing_id, 1);
        let tag = link.allocate_delivery();
        link.record_pending(delivery_id, on_settled);
        self.remote_incoming_window = self.remote_incoming_window.saturating_sub(fragment_count as u32);

        let mut frames = Vec::with_capacity(fragment_count);
        let mut offset = 0usize;
        for i in 0..fragment_count {
            let chunk_len = if i == 0 { first_chunk } else { rest_chunk };
            let end = (offset + chunk_len).min(encoded.len());
            let chunk = encoded.slice(offset..end);
            offset = end;
            let more = i + 1 != fragment_count;
            let transfer = if i == 0 {
                transfer_template(link, Some(delivery_id), Some(tag.clone()), Some(0))
            } else {
                transfer_template(link, None, None, None)
            };
            frames.push(OutgoingFrame { performative: Performative::Transfer(Transfer { more, ..transfer }), payload: chunk });
        }
        Ok((delivery_id, frames))
    }

    /// Grant link-credit on a receiver link, returning the `flow` frame
    /// to send.
    pub fn flow(&mut self, link_handle: Handle, credit: u32) -> Result<Vec<OutgoingFrame>, Error> {
        let idx = *self.local_handle_to_link.get(&link_handle.0).ok_or(Error::UnattachedHandle)?;
        let link = self.links.get_mut(idx).expect("handle table never references a freed link");
        let flow = link.build_flow(Some(credit), false);
        Ok(vec![OutgoingFrame::new(Performative::Flow(flow))])
    }

    /// Request (or cancel requesting) drain on a receiver link: the
    /// remote sender must either fulfill all outstanding credit or
    /// consume it and echo a `flow` with `link-credit=0` (§2.6.10).
    /// Returns the `flow` frame carrying the updated `drain` flag.
    pub fn set_drain(&mut self, link_handle: Handle, drain: bool) -> Result<Vec<OutgoingFrame>, Error> {
        let idx = *self.local_handle_to_link.get(&link_handle.0).ok_or(Error::UnattachedHandle)?;
        let link = self.links.get_mut(idx).expect("handle table never references a freed link");
        link.set_drain(drain);
        Ok(vec![OutgoingFrame::new(Performative::Flow(link.build_flow(None, false)))])
    }

    /// Settle a received delivery by sending a `disposition`.
    pub fn settle(&mut self, delivery_id: u32, state: DeliveryState, settled: bool) -> Vec<OutgoingFrame> {
        let disposition = Disposition { role: Role::Receiver, first: delivery_id, last: Some(delivery_id), settled, state: Some(state), batchable: false };
        vec![OutgoingFrame::new(Performative::Disposition(disposition))]
    }

    /// Request the session end.
    pub fn end(&mut self) -> Vec<OutgoingFrame> {
        if self.state == State::EndRcvd {
            self.state = State::Discarding;
            return vec![OutgoingFrame::new(Performative::End(End { error: None }))];
        }
        self.state = State::EndSent;
        vec![OutgoingFrame::new(Performative::End(End { error: None }))]
    }

    #[instrument(name = "RECV", skip(self, payload))]
    pub(crate) fn on_incoming(&mut self, performative: Performative, payload: Bytes) -> Outcome {
        match performative {
            Performative::Begin(begin) => self.on_incoming_begin(begin),
            Performative::Attach(attach) => self.on_incoming_attach(attach),
            Performative::Flow(flow) => self.on_incoming_flow(flow),
            Performative::Transfer(transfer) => self.on_incoming_transfer(transfer, payload),
            Performative::Disposition(disposition) => self.on_incoming_disposition(disposition),
            Performative::Detach(detach) => self.on_incoming_detach(detach),
            Performative::End(end) => self.on_incoming_end(end),
            Performative::Open(_) | Performative::Close(_) => Outcome::default(),
        }
    }

    fn on_incoming_begin(&mut self, begin: Begin) -> Outcome {
        trace!(next_outgoing_id = begin.next_outgoing_id, "begin");
        self.remote_incoming_window = begin.incoming_window;
        self.remote_outgoing_window = begin.outgoing_window;
        self.state = State::Mapped;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Mapped);
        }
        let mut frames = Vec::new();
        for (_, link) in self.links.iter_mut() {
            if link.state() == crate::link::State::Detached {
                frames.push(OutgoingFrame::new(Performative::Attach(link.send_attach())));
            }
        }
        Outcome { frames, ended: false }
    }

    fn on_incoming_attach(&mut self, attach: amqp_types::performatives::Attach) -> Outcome {
        let name = attach.name.clone();
        let remote_handle = attach.handle;
        let existing = self.links.iter().find(|(_, l)| l.name() == name && l.remote_handle().is_none()).map(|(i, _)| i);
        let Some(idx) = existing else {
            trace!(name = %name, "unsolicited attach rejected");
            return Outcome::default();
        };
        if let Some(&other) = self.remote_handle_to_link.get(&remote_handle.0) {
            if other != idx {
                return self.fatal(SessionErrorCondition::HandleInUse, format!("handle {} already in use", remote_handle.0));
            }
        }
        let link = self.links.get_mut(idx).expect("index from iter_mut above");
        let mut frames = Vec::new();
        match link.on_incoming_attach(attach) {
            Ok(Some(reply)) => frames.push(OutgoingFrame::new(Performative::Attach(reply))),
            Ok(None) => {}
            Err(_) => {}
        }
        self.remote_handle_to_link.insert(remote_handle.0, idx);
        Outcome { frames, ended: false }
    }

    fn on_incoming_flow(&mut self, flow: amqp_types::performatives::Flow) -> Outcome {
        if let Some(next_incoming_id) = flow.next_incoming_id {
            self.remote_incoming_window = flow.incoming_window.wrapping_sub(self.next_outgoing_id.wrapping_sub(next_incoming_id));
        } else {
            self.remote_incoming_window = flow.incoming_window;
        }
        self.remote_outgoing_window = flow.outgoing_window;

        let mut frames = Vec::new();
        if let Some(handle) = flow.handle {
            if let Some(&idx) = self.remote_handle_to_link.get(&handle.0) {
                let link = self.links.get_mut(idx).expect("remote handle table never references a freed link");
                let drain_fulfilled = link.on_incoming_flow(&flow);
                if flow.echo || drain_fulfilled {
                    frames.push(OutgoingFrame::new(Performative::Flow(link.build_flow(None, false))));
                }
            }
        }
        Outcome { frames, ended: false }
    }

    fn on_incoming_transfer(&mut self, transfer: amqp_types::performatives::Transfer, payload: Bytes) -> Outcome {
        self.next_incoming_id = serial::add(self.next_incoming_id, 1);
        self.incoming_window = self.incoming_window.saturating_sub(1);

        let Some(&idx) = self.remote_handle_to_link.get(&transfer.handle.0) else {
            trace!(handle = transfer.handle.0, "transfer on unattached handle");
            return self.fatal(SessionErrorCondition::UnattachedHandle, format!("transfer on unattached handle {}", transfer.handle.0));
        };
        let link = self.links.get_mut(idx).expect("remote handle table never references a freed link");
        match link.on_transfer_fragment(transfer.delivery_id, transfer.more, payload) {
            Ok(Some((delivery_id, full))) => {
                if let Ok(values) = decode_all(&full) {
                    if let Ok(message) = Message::from_values(&values) {
                        link.deliver_message(message, delivery_id);
                    }
                }
            }
            Ok(None) => {}
            Err(_) => {}
        }
        Outcome::default()
    }

    fn on_incoming_disposition(&mut self, disposition: amqp_types::performatives::Disposition) -> Outcome {
        let Some(state) = disposition.state else {
            return Outcome::default();
        };
        let last = disposition.last.unwrap_or(disposition.first);
        for (_, link) in self.links.iter_mut() {
            link.settle_range(disposition.first, last, state.clone());
        }
        Outcome::default()
    }

    fn on_incoming_detach(&mut self, detach: amqp_types::performatives::Detach) -> Outcome {
        let Some(&idx) = self.remote_handle_to_link.get(&detach.handle.0) else {
            return Outcome::default();
        };
        let link = self.links.get_mut(idx).expect("remote handle table never references a freed link");
        let (reply, _released) = link.on_incoming_detach(detach);
        let mut frames = Vec::new();
        if let Some(reply) = reply {
            frames.push(OutgoingFrame::new(Performative::Detach(reply)));
        }
        if link.state() == crate::link::State::Detached {
            self.local_handle_to_link.retain(|_, &mut v| v != idx);
            self.remote_handle_to_link.retain(|_, &mut v| v != idx);
            self.links.remove(idx);
        }
        Outcome { frames, ended: false }
    }

    fn on_incoming_end(&mut self, end: End) -> Outcome {
        if matches!(self.state, State::Unmapped | State::BeginSent) {
            return self.fatal(SessionErrorCondition::ErrantLink, "end received before the session was mapped".into());
        }
        let error = end.error;
        if self.state == State::EndSent {
            return Outcome { frames: Vec::new(), ended: true };
        }
        self.state = State::EndRcvd;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Ended(error.clone()));
        }
        Outcome { frames: vec![OutgoingFrame::new(Performative::End(End { error: None }))], ended: true }
    }

    pub(crate) fn fatal(&mut self, condition: SessionErrorCondition, description: String) -> Outcome {
        let error = amqp_types::definitions::Error::new(condition, Some(description), None);
        self.state = State::Discarding;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Ended(Some(error.clone())));
        }
        Outcome { frames: vec![OutgoingFrame::new(Performative::End(End { error: Some(error) }))], ended: true }
    }
}

/// Build a `transfer` performative shell with `more=true` and the given
/// first-fragment-only fields, used both to size fragments (via
/// `to_value().encoded_size()`) and, cloned with `more` overridden, as
/// the frame actually sent.
fn transfer_template(
    link: &Link,
    delivery_id: Option<u32>,
    delivery_tag: Option<Bytes>,
    message_format: Option<u32>,
) -> Transfer {
    Transfer {
        handle: link.local_handle(),
        delivery_id,
        delivery_tag,
        message_format,
        settled: Some(false),
        more: true,
        rcv_settle_mode: None,
        state: None,
        resume: false,
        aborted: false,
        batchable: false,
    }
}

/// Decode the concatenated section values of a reassembled message body.
fn decode_all(mut bytes: &[u8]) -> Result<Vec<amqp_codec::Value>, amqp_codec::DecodeError> {
    let mut values = Vec::new();
    while !bytes.is_empty() {
        let (value, consumed) = amqp_codec::Value::decode(bytes)?;
        values.push(value);
        bytes = &bytes[consumed..];
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_types::definitions::{ReceiverSettleMode, SenderSettleMode};
    use amqp_types::performatives::{Attach, Flow};

    fn attach_options(name: &str, role: Role) -> AttachOptions {
        AttachOptions {
            name: name.to_string(),
            role,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
        }
    }

    fn remote_begin(incoming_window: u32, outgoing_window: u32) -> Begin {
        Begin {
            remote_channel: None,
            next_outgoing_id: 0,
            incoming_window,
            outgoing_window,
            handle_max: u32::MAX,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    /// A session begun, mapped, with one sender link fully attached and
    /// granted `credit` link-credit.
    fn mapped_with_attached_sender(credit: u32) -> (Session, Handle) {
        let mut session = Session::new(0, BeginOptions::default());
        session.send_begin();
        session.on_incoming(Performative::Begin(remote_begin(100, 100)), Bytes::new());

        let (local_handle, frames) = session.create_link(Role::Sender, attach_options("link-1", Role::Sender));
        assert_eq!(frames.len(), 1, "attach is sent immediately once mapped");

        let remote_attach = Attach {
            name: "link-1".into(),
            handle: Handle(7),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        session.on_incoming(Performative::Attach(remote_attach), Bytes::new());
        assert_eq!(session.link(local_handle).unwrap().state(), crate::link::State::Attached);

        let flow = Flow {
            next_incoming_id: Some(0),
            incoming_window: 100,
            next_outgoing_id: 0,
            outgoing_window: 100,
            handle: Some(local_handle),
            delivery_count: Some(0),
            link_credit: Some(credit),
            available: None,
            drain: false,
            echo: false,
            properties: None,
        };
        session.on_incoming(Performative::Flow(flow), Bytes::new());
        (session, local_handle)
    }

    #[test]
    fn create_link_before_mapped_queues_attach() {
        let mut session = Session::new(0, BeginOptions::default());
        let (_, frames) = session.create_link(Role::Sender, attach_options("queued", Role::Sender));
        assert!(frames.is_empty(), "attach is queued, not sent, before begin round-trips");

        session.send_begin();
        let outcome = session.on_incoming(Performative::Begin(remote_begin(10, 10)), Bytes::new());
        assert_eq!(outcome.frames.len(), 1, "queued attach is flushed once mapped");
        assert!(matches!(outcome.frames[0].performative, Performative::Attach(_)));
    }

    #[test]
    fn send_fragments_large_message_and_decrements_window() {
        let (mut session, handle) = mapped_with_attached_sender(10);
        let before = session.remote_incoming_window();

        let message = Message::from_data(vec![0u8; 1000]);
        let (delivery_id, frames) = session.send(handle, &message, 256, Box::new(|_| {})).unwrap();

        assert_eq!(delivery_id, 0);
        assert!(frames.len() > 1, "a 1000-byte body over a 256-byte max-frame-size must fragment");
        let transfers: Vec<_> = frames
            .iter()
            .map(|f| match &f.performative {
                Performative::Transfer(t) => t,
                other => panic!("expected transfer, got {other:?}"),
            })
            .collect();
        assert!(!transfers.last().unwrap().more, "the last fragment carries more=false");
        for t in &transfers[..transfers.len() - 1] {
            assert!(t.more, "every fragment but the last carries more=true");
        }
        assert!(transfers[0].delivery_id.is_some(), "delivery_id is set only on the first fragment");
        assert!(transfers[1].delivery_id.is_none(), "delivery_id is omitted on continuations");
        assert!(session.remote_incoming_window() < before, "window is charged per fragment sent");
    }

    #[test]
    fn send_without_credit_would_block() {
        let (mut session, handle) = mapped_with_attached_sender(0);
        let message = Message::from_data(vec![0u8; 16]);
        let err = session.send(handle, &message, 1024, Box::new(|_| {})).unwrap_err();
        assert!(matches!(err, SendError::WouldBlock));
    }

    #[test]
    fn settle_emits_disposition_on_first_last() {
        let mut session = Session::new(0, BeginOptions::default());
        let frames = session.settle(5, amqp_types::messaging::DeliveryState::Accepted, true);
        assert_eq!(frames.len(), 1);
        match &frames[0].performative {
            Performative::Disposition(d) => {
                assert_eq!(d.first, 5);
                assert_eq!(d.last, Some(5));
                assert!(d.settled);
            }
            other => panic!("expected disposition, got {other:?}"),
        }
    }

    #[test]
    fn transfer_on_unattached_handle_is_fatal() {
        let mut session = Session::new(0, BeginOptions::default());
        session.send_begin();
        session.on_incoming(Performative::Begin(remote_begin(10, 10)), Bytes::new());

        let transfer = amqp_types::performatives::Transfer {
            handle: Handle(99),
            delivery_id: Some(0),
            delivery_tag: Some(Bytes::from_static(b"t")),
            message_format: Some(0),
            settled: Some(false),
            more: false,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        };
        let outcome = session.on_incoming(Performative::Transfer(transfer), Bytes::new());
        assert!(outcome.ended);
        assert_eq!(session.state(), State::Discarding);
        match &outcome.frames[0].performative {
            Performative::End(end) => assert!(end.error.is_some()),
            other => panic!("expected end, got {other:?}"),
        }
    }

    #[test]
    fn end_before_mapped_is_fatal() {
        let mut session = Session::new(0, BeginOptions::default());
        let outcome = session.on_incoming(Performative::End(End { error: None }), Bytes::new());
        assert!(outcome.ended);
        assert_eq!(session.state(), State::Discarding);
    }

    #[test]
    fn end_after_mapped_replies_and_marks_ended() {
        let mut session = Session::new(0, BeginOptions::default());
        session.send_begin();
        session.on_incoming(Performative::Begin(remote_begin(10, 10)), Bytes::new());

        let outcome = session.on_incoming(Performative::End(End { error: None }), Bytes::new());
        assert!(outcome.ended);
        assert_eq!(session.state(), State::EndRcvd);
        assert_eq!(outcome.frames.len(), 1);
    }

    #[test]
    fn reassembled_transfer_decodes_every_section_not_just_the_first() {
        use amqp_types::messaging::{Header, Message};
        use amqp_types::performatives::Transfer;
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut session = Session::new(0, BeginOptions::default());
        session.send_begin();
        session.on_incoming(Performative::Begin(remote_begin(10, 10)), Bytes::new());
        let (local_handle, _) = session.create_link(Role::Receiver, attach_options("recv", Role::Receiver));

        let remote_attach = Attach {
            name: "recv".into(),
            handle: Handle(3),
            role: Role::Sender,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: Some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        session.on_incoming(Performative::Attach(remote_attach), Bytes::new());

        let message = Message {
            header: Some(Header { durable: true, ..Default::default() }),
            ..Message::from_data(b"payload".to_vec())
        };
        let mut encoded = BytesMut::new();
        for value in message.to_values() {
            value.encode(&mut encoded);
        }
        assert!(message.header.is_some(), "the message carries a header section ahead of its body");

        let received = Rc::new(RefCell::new(None));
        let received_clone = Rc::clone(&received);
        {
            let idx = *session.local_handle_to_link.get(&local_handle.0).unwrap();
            let link = session.links.get_mut(idx).unwrap();
            link.set_message_callback(move |msg, _handle| {
                *received_clone.borrow_mut() = Some(msg);
            });
        }

        let transfer = Transfer {
            handle: Handle(3),
            delivery_id: Some(0),
            delivery_tag: Some(Bytes::from_static(b"tag")),
            message_format: Some(0),
            settled: Some(false),
            more: false,
            rcv_settle_mode: None,
            state: None,
            resume: false,
            aborted: false,
            batchable: false,
        };
        session.on_incoming(Performative::Transfer(transfer), encoded.freeze());

        let delivered = received.borrow_mut().take().expect("message callback fired");
        assert_eq!(delivered.header, message.header, "the header section must survive reassembly");
        assert_eq!(delivered.body, message.body, "the body section must survive reassembly alongside the header");
    }

    #[test]
    fn attach_with_handle_already_bound_to_another_link_is_fatal() {
        let mut session = Session::new(0, BeginOptions::default());
        session.send_begin();
        session.on_incoming(Performative::Begin(remote_begin(10, 10)), Bytes::new());

        session.create_link(Role::Sender, attach_options("a", Role::Sender));
        session.create_link(Role::Sender, attach_options("b", Role::Sender));

        let attach_a = Attach {
            name: "a".into(),
            handle: Handle(1),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        session.on_incoming(Performative::Attach(attach_a), Bytes::new());

        let attach_b_reuses_handle = Attach {
            name: "b".into(),
            handle: Handle(1),
            role: Role::Receiver,
            snd_settle_mode: SenderSettleMode::Mixed,
            rcv_settle_mode: ReceiverSettleMode::First,
            source: None,
            target: None,
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: None,
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        };
        let outcome = session.on_incoming(Performative::Attach(attach_b_reuses_handle), Bytes::new());
        assert!(outcome.ended);
        assert_eq!(session.state(), State::Discarding);
    }
}
