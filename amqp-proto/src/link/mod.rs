//! §4.5 Link FSM: `attach`/`detach`, link-credit flow control, and
//! per-delivery bookkeeping for one link endpoint.

/// Error types for this module.
pub mod error;

use amqp_codec::Value;
use amqp_types::definitions::{Handle, ReceiverSettleMode, Role, SenderSettleMode};
use amqp_types::messaging::{DeliveryState, Message};
use amqp_types::performatives::{Attach, Detach, Flow};
use bytes::{Bytes, BytesMut};

/// Re-exported error types.
pub use error::{Error, SendError};

/// State of the link FSM (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No `attach` sent or received.
    Detached,
    /// One `attach` has been sent or received; waiting for the other.
    HalfAttached,
    /// Both sides have exchanged `attach`.
    Attached,
    /// One `detach` has been sent or received; waiting for the other.
    HalfDetached,
}

/// A state-change notification for one link (§6: `on_link_state`).
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    /// The attach exchange completed.
    Attached,
    /// The link has been detached, optionally with an error.
    Detached(Option<amqp_types::definitions::Error>),
}

/// Parameters the application supplies when creating a link.
#[derive(Debug, Clone)]
pub struct AttachOptions {
    /// Link name, unique within (session, role).
    pub name: String,
    /// Sender or receiver.
    pub role: Role,
    /// Desired sender settlement policy.
    pub snd_settle_mode: SenderSettleMode,
    /// Desired receiver settlement policy.
    pub rcv_settle_mode: ReceiverSettleMode,
    /// The node this link reads from or publishes into.
    pub source: Option<Value>,
    /// The node this link writes to or is fed from.
    pub target: Option<Value>,
}

/// Chained-setter builder for attaching a [`Link`], mirroring
/// [`AttachOptions`]'s fields one for one. Terminal method is
/// [`Builder::attach`].
#[derive(Debug, Clone)]
pub struct Builder {
    options: AttachOptions,
    /// Credit to grant immediately on attach, for a receiver link.
    /// Ignored for a sender (credit flows the other way).
    initial_credit: Option<u32>,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            options: AttachOptions {
                name: String::new(),
                role: Role::Sender,
                snd_settle_mode: SenderSettleMode::default(),
                rcv_settle_mode: ReceiverSettleMode::default(),
                source: None,
                target: None,
            },
            initial_credit: None,
        }
    }
}

impl Builder {
    /// Start from an empty, unnamed sender-role set of options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link name, unique within (session, role).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.options.name = name.into();
        self
    }

    /// Attach as a sender.
    pub fn sender(mut self) -> Self {
        self.options.role = Role::Sender;
        self
    }

    /// Attach as a receiver.
    pub fn receiver(mut self) -> Self {
        self.options.role = Role::Receiver;
        self
    }

    /// Desired sender settlement policy.
    pub fn snd_settle_mode(mut self, mode: SenderSettleMode) -> Self {
        self.options.snd_settle_mode = mode;
        self
    }

    /// Desired receiver settlement policy.
    pub fn rcv_settle_mode(mut self, mode: ReceiverSettleMode) -> Self {
        self.options.rcv_settle_mode = mode;
        self
    }

    /// The node this link reads from or publishes into.
    pub fn source(mut self, source: Value) -> Self {
        self.options.source = Some(source);
        self
    }

    /// The node this link writes to or is fed from.
    pub fn target(mut self, target: Value) -> Self {
        self.options.target = Some(target);
        self
    }

    /// Credit to grant immediately on attach. Only meaningful for a
    /// receiver link; a sender grants nothing by attaching, it waits
    /// for the remote's `flow`.
    pub fn initial_credit(mut self, credit: u32) -> Self {
        self.initial_credit = Some(credit);
        self
    }

    /// Attach the link on `session`, sending `attach` immediately if the
    /// session is already mapped. If [`Builder::initial_credit`] was set
    /// on a receiver link, the granting `flow` is sent right after.
    pub fn attach(self, session: &mut crate::session::Session) -> (Handle, Vec<crate::frame::OutgoingFrame>) {
        let role = self.options.role;
        let (handle, mut frames) = session.create_link(role, self.options);
        if role == Role::Receiver {
            if let Some(credit) = self.initial_credit {
                let flow_frames = session.flow(handle, credit).expect("handle was just returned by create_link");
                frames.extend(flow_frames);
            }
        }
        (handle, frames)
    }
}

struct PendingDelivery {
    delivery_id: u32,
    on_settled: Box<dyn FnMut(DeliveryState)>,
}

struct IncomingAssembly {
    delivery_id: u32,
    buffer: BytesMut,
}

/// A handle identifying one in-flight delivery, returned by
/// [`crate::session::Session::send`] and passed to
/// [`crate::session::Session::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryHandle {
    /// The link's local handle.
    pub link_handle: Handle,
    /// The delivery-id assigned by the sending session.
    pub delivery_id: u32,
}

/// One link endpoint: half of an `attach`/`detach` pair, owned by the
/// [`crate::session::Session`] it belongs to.
pub struct Link {
    name: String,
    local_handle: Handle,
    remote_handle: Option<Handle>,
    role: Role,
    state: State,
    snd_settle_mode: SenderSettleMode,
    rcv_settle_mode: ReceiverSettleMode,
    source: Option<Value>,
    target: Option<Value>,
    delivery_count: u32,
    link_credit: u32,
    available: u32,
    drain: bool,
    next_delivery_tag: u32,
    pending: Vec<PendingDelivery>,
    incoming: Option<IncomingAssembly>,
    on_state_change: Option<Box<dyn FnMut(StateChange)>>,
    on_message: Option<Box<dyn FnMut(Message, DeliveryHandle)>>,
}

impl Link {
    /// Start a [`Builder`] for configuring a link before `attach`.
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn new(local_handle: Handle, options: AttachOptions) -> Self {
        Link {
            name: options.name,
            local_handle,
            remote_handle: None,
            role: options.role,
            state: State::Detached,
            snd_settle_mode: options.snd_settle_mode,
            rcv_settle_mode: options.rcv_settle_mode,
            source: options.source,
            target: options.target,
            delivery_count: 0,
            link_credit: 0,
            available: 0,
            drain: false,
            next_delivery_tag: 0,
            pending: Vec::new(),
            incoming: None,
            on_state_change: None,
            on_message: None,
        }
    }

    /// Register the callback fired on attach/detach.
    pub fn set_state_callback(&mut self, cb: impl FnMut(StateChange) + 'static) {
        self.on_state_change = Some(Box::new(cb));
    }

    /// Register the callback fired when a complete message has been
    /// reassembled on a receiver link.
    pub fn set_message_callback(&mut self, cb: impl FnMut(Message, DeliveryHandle) + 'static) {
        self.on_message = Some(Box::new(cb));
    }

    /// The link's name, as given to [`AttachOptions`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current FSM state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Local link handle.
    pub fn local_handle(&self) -> Handle {
        self.local_handle
    }

    /// Remote link handle, set once the attach exchange completes.
    pub fn remote_handle(&self) -> Option<Handle> {
        self.remote_handle
    }

    /// Current link-credit: for a sender, how many transfers it may
    /// still send; for a receiver, how many it has granted the sender.
    pub fn link_credit(&self) -> u32 {
        self.link_credit
    }

    pub(crate) fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn send_attach(&mut self) -> Attach {
        debug_assert!(self.state == State::Detached);
        self.state = State::HalfAttached;
        Attach {
            name: self.name.clone(),
            handle: self.local_handle,
            role: self.role,
            snd_settle_mode: self.snd_settle_mode,
            rcv_settle_mode: self.rcv_settle_mode,
            source: self.source.clone(),
            target: self.target.clone(),
            unsettled: None,
            incomplete_unsettled: false,
            initial_delivery_count: (self.role == Role::Sender).then_some(0),
            max_message_size: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }

    pub(crate) fn on_incoming_attach(&mut self, attach: Attach) -> Result<Option<Attach>, Error> {
        if attach.name != self.name {
            return Err(Error::Link {
                condition: amqp_types::definitions::LinkError::Stolen,
                description: Some("link name mismatch".into()),
            });
        }
        self.remote_handle = Some(attach.handle);
        if let Some(count) = attach.initial_delivery_count {
            if self.role == Role::Receiver {
                self.delivery_count = count;
            }
        }
        let reply = match self.state {
            State::Detached => Some(self.send_attach()),
            State::HalfAttached => None,
            _ => return Err(Error::IllegalState),
        };
        self.state = State::Attached;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Attached);
        }
        Ok(reply)
    }

    /// Grant (receiver) or update the flow-control window and build the
    /// `flow` performative to send.
    pub(crate) fn build_flow(&mut self, additional_credit: Option<u32>, echo: bool) -> Flow {
        if let Some(credit) = additional_credit {
            self.link_credit = credit;
        }
        Flow {
            next_incoming_id: None,
            incoming_window: 0,
            next_outgoing_id: 0,
            outgoing_window: 0,
            handle: Some(self.local_handle),
            delivery_count: Some(self.delivery_count),
            link_credit: Some(self.link_credit),
            available: Some(self.available),
            drain: self.drain,
            echo,
            properties: None,
        }
    }

    /// Request (or cancel requesting) that the remote sender consume all
    /// outstanding credit on this receiver link (§2.6.10). Takes effect
    /// on the next `flow` sent for this link.
    pub fn set_drain(&mut self, drain: bool) {
        self.drain = drain;
    }

    /// Apply an incoming `flow` to this link. For a sender, updates
    /// `link-credit` from the remote's accounting and, if the remote set
    /// `drain=true`, fulfills it by consuming whatever credit remains:
    /// `delivery-count` advances by the unused credit and `link-credit`
    /// drops to zero. Returns `true` when drain was just fulfilled, so
    /// the caller can echo a `flow` back even if `echo` was not set —
    /// fulfilling a drain request always requires a reply (§2.6.10).
    pub(crate) fn on_incoming_flow(&mut self, flow: &Flow) -> bool {
        if self.role == Role::Sender {
            if let (Some(remote_delivery_count), Some(remote_link_credit)) = (flow.delivery_count, flow.link_credit) {
                self.link_credit =
                    (remote_delivery_count.wrapping_add(remote_link_credit)).wrapping_sub(self.delivery_count);
            }
            if flow.drain {
                self.delivery_count = self.delivery_count.wrapping_add(self.link_credit);
                self.link_credit = 0;
                self.drain = false;
                return true;
            }
            self.drain = false;
            false
        } else {
            self.available = flow.available.unwrap_or(self.available);
            false
        }
    }

    /// Whether a sender currently has credit to send another transfer.
    pub(crate) fn has_credit(&self) -> bool {
        self.role == Role::Sender && self.link_credit > 0
    }

    /// Allocate a delivery-tag and consume one unit of link-credit,
    /// advancing `delivery-count`.
    pub(crate) fn allocate_delivery(&mut self) -> Bytes {
        let tag = self.peek_delivery_tag();
        self.next_delivery_tag = self.next_delivery_tag.wrapping_add(1);
        self.link_credit = self.link_credit.saturating_sub(1);
        self.delivery_count = self.delivery_count.wrapping_add(1);
        tag
    }

    /// The delivery-tag `allocate_delivery` would hand out next, without
    /// consuming credit or advancing `delivery-count`. Used to size
    /// transfer fragments before committing to a send.
    pub(crate) fn peek_delivery_tag(&self) -> Bytes {
        Bytes::copy_from_slice(&self.next_delivery_tag.to_be_bytes())
    }

    pub(crate) fn record_pending(&mut self, delivery_id: u32, on_settled: Box<dyn FnMut(DeliveryState)>) {
        self.pending.push(PendingDelivery { delivery_id, on_settled });
    }

    /// Fire and remove every pending delivery whose id falls in
    /// `[first, last]`.
    pub(crate) fn settle_range(&mut self, first: u32, last: u32, state: DeliveryState) {
        let mut i = 0;
        while i < self.pending.len() {
            let id = self.pending[i].delivery_id;
            if crate::serial::compare(id, first) != Some(std::cmp::Ordering::Less)
                && crate::serial::compare(id, last) != Some(std::cmp::Ordering::Greater)
            {
                let mut entry = self.pending.remove(i);
                (entry.on_settled)(state.clone());
            } else {
                i += 1;
            }
        }
    }

    /// Accumulate one transfer fragment; returns the reassembled
    /// payload once `more` is `false`.
    pub(crate) fn on_transfer_fragment(
        &mut self,
        delivery_id: Option<u32>,
        more: bool,
        payload: Bytes,
    ) -> Result<Option<(u32, Bytes)>, Error> {
        match self.incoming.as_mut() {
            None => {
                let delivery_id = delivery_id.ok_or(Error::IllegalState)?;
                let mut buffer = BytesMut::new();
                buffer.extend_from_slice(&payload);
                if more {
                    self.incoming = Some(IncomingAssembly { delivery_id, buffer });
                    Ok(None)
                } else {
                    Ok(Some((delivery_id, buffer.freeze())))
                }
            }
            Some(assembly) => {
                assembly.buffer.extend_from_slice(&payload);
                if more {
                    Ok(None)
                } else {
                    let assembly = self.incoming.take().expect("checked Some above");
                    Ok(Some((assembly.delivery_id, assembly.buffer.freeze())))
                }
            }
        }
    }

    pub(crate) fn send_detach(&mut self, error: Option<amqp_types::definitions::Error>) -> Detach {
        self.state = match self.state {
            State::Attached | State::HalfAttached => State::HalfDetached,
            other => other,
        };
        Detach { handle: self.local_handle, closed: true, error }
    }

    pub(crate) fn on_incoming_detach(&mut self, detach: Detach) -> (Option<Detach>, Vec<PendingSettlement>) {
        let released: Vec<PendingSettlement> = self
            .pending
            .drain(..)
            .map(|mut p| {
                (p.on_settled)(DeliveryState::Released);
                PendingSettlement { delivery_id: p.delivery_id }
            })
            .collect();
        let reply = match self.state {
            State::HalfDetached => None,
            _ => Some(self.send_detach(None)),
        };
        self.state = State::Detached;
        if let Some(cb) = self.on_state_change.as_mut() {
            cb(StateChange::Detached(detach.error.clone()));
        }
        (reply, released)
    }

    pub(crate) fn deliver_message(&mut self, message: Message, delivery_id: u32) {
        if let Some(cb) = self.on_message.as_mut() {
            cb(message, DeliveryHandle { link_handle: self.local_handle, delivery_id });
        }
    }
}

/// Marker returned for each pending delivery released by a detach, used
/// only so the session can log/account for them; the callback itself
/// already fired.
pub(crate) struct PendingSettlement {
    #[allow(dead_code)]
    pub delivery_id: u32,
}
