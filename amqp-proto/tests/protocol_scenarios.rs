//! End-to-end byte-exact scenarios driving `Connection`/`Session` purely
//! through their public surface: raw bytes in via `on_bytes_received`,
//! raw bytes out via `take_outbound`.

use std::cell::RefCell;
use std::rc::Rc;

use amqp_proto::connection::{Connection, OpenOptions};
use amqp_proto::frame::{encode_amqp_frame, AMQP_PROTOCOL_HEADER};
use amqp_proto::session::BeginOptions;
use amqp_proto::transport::{Transport, TransportError};
use amqp_types::definitions::{Handle, ReceiverSettleMode, Role, SenderSettleMode};
use amqp_types::messaging::{DeliveryState, Message};
use amqp_types::performatives::{Attach, Begin, Disposition, Flow, Open, Performative, Transfer};

/// An in-memory sink recording every byte `Connection::flush` writes,
/// used only where a scenario needs `last_sent_millis` to advance (the
/// keepalive timer).
#[derive(Default)]
struct MemTransport(Vec<u8>);

impl Transport for MemTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        self.0.extend_from_slice(bytes);
        Ok(bytes.len())
    }
}

fn attach_options(name: &str, role: Role) -> amqp_proto::link::AttachOptions {
    amqp_proto::link::AttachOptions {
        name: name.to_string(),
        role,
        snd_settle_mode: SenderSettleMode::Mixed,
        rcv_settle_mode: ReceiverSettleMode::First,
        source: None,
        target: None,
    }
}

/// Scenario 1: header exchange then `open`.
#[test]
fn header_exchange_then_open() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-1".into(), ..Default::default() });
    conn.open();
    let out = conn.take_outbound();
    assert_eq!(&out[..], &AMQP_PROTOCOL_HEADER);

    // feed our own header straight back, as a loopback peer would
    conn.on_bytes_received(0, &AMQP_PROTOCOL_HEADER).unwrap();

    // the header was already sent and is not repeated; only the `open`
    // frame this side emits in response follows
    let out = conn.take_outbound();
    assert!(out.len() > 8, "an open frame was emitted");

    let (value, _consumed) = amqp_codec::Value::decode(&out[8..]).unwrap();
    let fields = value.as_composite_fields(0x10).expect("open composite, descriptor ulong 0x10");
    match &fields[0] {
        amqp_codec::Value::String(s) => assert_eq!(s, "scenario-1"),
        other => panic!("expected container-id string as the first open field, got {other:?}"),
    }
}

/// Scenario 2: empty-frame keepalive at half the remote's idle-timeout.
#[test]
fn empty_frame_keepalive() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-2".into(), ..Default::default() });
    let mut transport = MemTransport::default();

    conn.open();
    conn.flush(&mut transport).unwrap();

    let mut fed = AMQP_PROTOCOL_HEADER.to_vec();
    let remote_open = Performative::Open(Open { container_id: "remote".into(), idle_time_out: Some(1000), ..Default::default() });
    fed.extend_from_slice(&encode_amqp_frame(0, &remote_open, &[], u32::MAX).unwrap());
    conn.on_bytes_received(0, &fed).unwrap();
    conn.flush(&mut transport).unwrap();

    assert_eq!(conn.state(), amqp_proto::connection::State::Opened);

    conn.on_tick(500).unwrap();
    let out = conn.take_outbound();
    assert_eq!(&out[..], &[0x00, 0x00, 0x00, 0x08, 0x02, 0x00, 0x00, 0x00]);
}

/// Scenario 3: session `begin` round-trip.
#[test]
fn session_begin_round_trip() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-3".into(), ..Default::default() });
    conn.open();
    conn.take_outbound();

    let mut fed = AMQP_PROTOCOL_HEADER.to_vec();
    let remote_open = Performative::Open(Open { container_id: "remote".into(), ..Default::default() });
    fed.extend_from_slice(&encode_amqp_frame(0, &remote_open, &[], u32::MAX).unwrap());
    conn.on_bytes_received(0, &fed).unwrap();
    conn.take_outbound();

    let handle = conn.create_session(BeginOptions { incoming_window: 100, outgoing_window: 100, ..Default::default() }).unwrap();
    let out = conn.take_outbound();

    let (value, consumed) = amqp_codec::Value::decode(&out[8..]).unwrap();
    assert_eq!(consumed, out.len() - 8, "no payload bytes follow a begin performative");
    let fields = value.as_composite_fields(0x11).expect("begin composite, descriptor ulong 0x11");
    assert_eq!(fields[1], amqp_codec::Value::UInt(0), "next-outgoing-id");
    assert_eq!(fields[2], amqp_codec::Value::UInt(100), "incoming-window");
    assert_eq!(fields[3], amqp_codec::Value::UInt(100), "outgoing-window");
    assert_eq!(&out[6..8], &0u16.to_be_bytes(), "first session begins on channel 0");

    let remote_begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 42,
        incoming_window: 50,
        outgoing_window: 50,
        handle_max: u32::MAX,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    let mut frame = Vec::new();
    frame.extend_from_slice(&encode_amqp_frame(7, &Performative::Begin(remote_begin), &[], u32::MAX).unwrap());
    conn.on_bytes_received(0, &frame).unwrap();

    let session = conn.session_mut(&handle).unwrap();
    assert_eq!(session.state(), amqp_proto::session::State::Mapped);
    assert_eq!(session.remote_incoming_window(), 50);
}

/// Scenario 4: fragmented transfer over a small remote max-frame-size.
///
/// The message is sized so its encoded body (the single `data` section,
/// header + list + binary framing included) is exactly 200 bytes, per
/// `Data::to_value`'s fixed 8 bytes of section overhead around the raw
/// payload (192 + 8 = 200).
#[test]
fn fragmented_transfer() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-4".into(), max_frame_size: 4096, ..Default::default() });
    conn.open();
    conn.take_outbound();

    let mut fed = AMQP_PROTOCOL_HEADER.to_vec();
    let remote_open = Performative::Open(Open { container_id: "remote".into(), max_frame_size: 64, ..Default::default() });
    fed.extend_from_slice(&encode_amqp_frame(0, &remote_open, &[], u32::MAX).unwrap());
    conn.on_bytes_received(0, &fed).unwrap();
    conn.take_outbound();

    let handle = conn.create_session(BeginOptions::default()).unwrap();
    conn.take_outbound();
    let remote_begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 0,
        incoming_window: 100,
        outgoing_window: 100,
        handle_max: u32::MAX,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Begin(remote_begin), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let session = conn.session_mut(&handle).unwrap();
    let (link_handle, attach_frames) = session.create_link(Role::Sender, attach_options("sender-1", Role::Sender));
    conn.send_session_frames(&handle, attach_frames);
    conn.take_outbound();

    let remote_attach = Attach {
        name: "sender-1".into(),
        handle: Handle(9),
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
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Attach(remote_attach), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(9)),
        delivery_count: Some(0),
        link_credit: Some(10),
        available: None,
        drain: false,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(flow), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let message = Message::from_data(vec![0u8; 192]);
    assert_eq!(
        message.to_values().iter().map(|v| v.encoded_size()).sum::<usize>(),
        200,
        "the message's encoded body is exactly 200 bytes"
    );

    let remote_max_frame_size = conn.remote_max_frame_size().unwrap();
    assert_eq!(remote_max_frame_size, 64);
    let session = conn.session_mut(&handle).unwrap();
    let (delivery_id, frames) = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {})).unwrap();
    assert_eq!(delivery_id, 0);

    let transfers: Vec<&Transfer> = frames
        .iter()
        .map(|f| match &f.performative {
            Performative::Transfer(t) => t,
            other => panic!("expected transfer, got {other:?}"),
        })
        .collect();

    let total_body: usize = frames.iter().map(|f| f.payload.len()).sum();
    assert_eq!(total_body, 200);
    for (i, t) in transfers.iter().enumerate() {
        assert_eq!(t.handle, Handle(0));
        let more = i + 1 != transfers.len();
        assert_eq!(t.more, more, "fragment {i} more-flag");
        if i == 0 {
            assert_eq!(t.delivery_id, Some(0));
            assert!(t.delivery_tag.is_some());
        } else {
            assert_eq!(t.delivery_id, None, "continuation fragments omit delivery-id");
            assert!(t.delivery_tag.is_none(), "continuation fragments omit delivery-tag");
        }
    }

    conn.send_session_frames(&handle, frames);
    let out = conn.take_outbound();
    let mut codec = amqp_proto::frame::FrameCodec::new(u32::MAX);
    codec.push_bytes(&out);
    let mut emitted = 0;
    while let Some(frame) = codec.try_decode_frame().unwrap() {
        match frame.body {
            amqp_proto::frame::FrameBody::Amqp { performative: Performative::Transfer(_), .. } => emitted += 1,
            other => panic!("expected a transfer frame, got {other:?}"),
        }
    }
    assert_eq!(emitted, transfers.len(), "every fragment was actually emitted, none dropped as oversized");
}

/// Scenario 5: credit exhaustion and recovery.
#[test]
fn credit_exhaustion_then_flow_unblocks() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-5".into(), ..Default::default() });
    conn.open();
    conn.take_outbound();
    conn.on_bytes_received(
        0,
        &[AMQP_PROTOCOL_HEADER.to_vec(), encode_amqp_frame(0, &Performative::Open(Open { container_id: "remote".into(), ..Default::default() }), &[], u32::MAX).unwrap().to_vec()].concat(),
    )
    .unwrap();
    conn.take_outbound();

    let handle = conn.create_session(BeginOptions::default()).unwrap();
    conn.take_outbound();
    let remote_begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 0,
        incoming_window: 100,
        outgoing_window: 100,
        handle_max: u32::MAX,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Begin(remote_begin), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let session = conn.session_mut(&handle).unwrap();
    let (link_handle, attach_frames) = session.create_link(Role::Sender, attach_options("sender-2", Role::Sender));
    conn.send_session_frames(&handle, attach_frames);
    conn.take_outbound();

    let remote_attach = Attach {
        name: "sender-2".into(),
        handle: Handle(4),
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
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Attach(remote_attach), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let initial_flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(4)),
        delivery_count: Some(0),
        link_credit: Some(2),
        available: None,
        drain: false,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(initial_flow), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let message = Message::from_data(vec![1u8; 8]);
    let remote_max_frame_size = conn.remote_max_frame_size().unwrap();

    let session = conn.session_mut(&handle).unwrap();
    let (first_id, _) = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {})).unwrap();
    assert_eq!(first_id, 0);
    let (second_id, _) = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {})).unwrap();
    assert_eq!(second_id, 1);
    let third = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {}));
    assert!(matches!(third, Err(amqp_proto::session::SendError::WouldBlock)));

    let flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(4)),
        delivery_count: Some(2),
        link_credit: Some(1),
        available: None,
        drain: false,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(flow), &[], u32::MAX).unwrap()).unwrap();

    let session = conn.session_mut(&handle).unwrap();
    let (third_id, frames) = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {})).unwrap();
    assert_eq!(third_id, 2);
    assert_eq!(frames.len(), 1);
}

/// Scenario 6: disposition settlement fires `on_settled` for both
/// deliveries, in order, and clears pending state.
#[test]
fn disposition_settles_both_deliveries_in_order() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-6".into(), ..Default::default() });
    conn.open();
    conn.take_outbound();
    conn.on_bytes_received(
        0,
        &[AMQP_PROTOCOL_HEADER.to_vec(), encode_amqp_frame(0, &Performative::Open(Open { container_id: "remote".into(), ..Default::default() }), &[], u32::MAX).unwrap().to_vec()].concat(),
    )
    .unwrap();
    conn.take_outbound();

    let handle = conn.create_session(BeginOptions::default()).unwrap();
    conn.take_outbound();
    let remote_begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 0,
        incoming_window: 100,
        outgoing_window: 100,
        handle_max: u32::MAX,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Begin(remote_begin), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let session = conn.session_mut(&handle).unwrap();
    let (link_handle, attach_frames) = session.create_link(Role::Sender, attach_options("sender-3", Role::Sender));
    conn.send_session_frames(&handle, attach_frames);
    conn.take_outbound();

    let remote_attach = Attach {
        name: "sender-3".into(),
        handle: Handle(2),
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
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Attach(remote_attach), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(2)),
        delivery_count: Some(0),
        link_credit: Some(5),
        available: None,
        drain: false,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(flow), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let settled_order: Rc<RefCell<Vec<DeliveryState>>> = Rc::new(RefCell::new(Vec::new()));
    let message = Message::from_data(vec![2u8; 4]);
    let remote_max_frame_size = conn.remote_max_frame_size().unwrap();

    for expected_id in 0u32..2 {
        let order = settled_order.clone();
        let session = conn.session_mut(&handle).unwrap();
        let (id, frames) = session
            .send(link_handle, &message, remote_max_frame_size, Box::new(move |state| order.borrow_mut().push(state)))
            .unwrap();
        assert_eq!(id, expected_id);
        conn.send_session_frames(&handle, frames);
    }
    conn.take_outbound();

    let disposition = Disposition { role: Role::Receiver, first: 0, last: Some(1), settled: true, state: Some(DeliveryState::Accepted), batchable: false };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Disposition(disposition), &[], u32::MAX).unwrap()).unwrap();

    let fired = settled_order.borrow();
    assert_eq!(fired.len(), 2, "both on_settled callbacks fired, in delivery order");
    assert!(fired.iter().all(|state| *state == DeliveryState::Accepted));
}

/// Scenario 7: drain. The remote grants credit, then asks for it back by
/// setting `drain=true` on a `flow` with no further transfers to send.
/// Our sender link must fulfill the drain by consuming the unused
/// credit (advancing `delivery-count`, zeroing `link-credit`) and echo a
/// `flow` back unconditionally, even though the remote's `flow` did not
/// set `echo`.
#[test]
fn drain_is_fulfilled_by_consuming_unused_credit() {
    let mut conn = Connection::new(OpenOptions { container_id: "scenario-7".into(), ..Default::default() });
    conn.open();
    conn.take_outbound();
    conn.on_bytes_received(
        0,
        &[AMQP_PROTOCOL_HEADER.to_vec(), encode_amqp_frame(0, &Performative::Open(Open { container_id: "remote".into(), ..Default::default() }), &[], u32::MAX).unwrap().to_vec()].concat(),
    )
    .unwrap();
    conn.take_outbound();

    let handle = conn.create_session(BeginOptions::default()).unwrap();
    conn.take_outbound();
    let remote_begin = Begin {
        remote_channel: Some(0),
        next_outgoing_id: 0,
        incoming_window: 100,
        outgoing_window: 100,
        handle_max: u32::MAX,
        offered_capabilities: None,
        desired_capabilities: None,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Begin(remote_begin), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let session = conn.session_mut(&handle).unwrap();
    let (link_handle, attach_frames) = session.create_link(Role::Sender, attach_options("sender-7", Role::Sender));
    conn.send_session_frames(&handle, attach_frames);
    conn.take_outbound();

    let remote_attach = Attach {
        name: "sender-7".into(),
        handle: Handle(5),
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
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Attach(remote_attach), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let initial_flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(5)),
        delivery_count: Some(0),
        link_credit: Some(5),
        available: None,
        drain: false,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(initial_flow), &[], u32::MAX).unwrap()).unwrap();
    conn.take_outbound();

    let message = Message::from_data(vec![3u8; 4]);
    let remote_max_frame_size = conn.remote_max_frame_size().unwrap();
    let session = conn.session_mut(&handle).unwrap();
    let (delivery_id, frames) = session.send(link_handle, &message, remote_max_frame_size, Box::new(|_| {})).unwrap();
    assert_eq!(delivery_id, 0);
    conn.send_session_frames(&handle, frames);
    conn.take_outbound();

    let session = conn.session_mut(&handle).unwrap();
    assert_eq!(session.link(link_handle).unwrap().link_credit(), 4, "one of five credits consumed by the send above");

    let draining_flow = Flow {
        next_incoming_id: Some(0),
        incoming_window: 100,
        next_outgoing_id: 0,
        outgoing_window: 100,
        handle: Some(Handle(5)),
        delivery_count: Some(1),
        link_credit: Some(4),
        available: None,
        drain: true,
        echo: false,
        properties: None,
    };
    conn.on_bytes_received(0, &encode_amqp_frame(3, &Performative::Flow(draining_flow), &[], u32::MAX).unwrap()).unwrap();

    let out = conn.take_outbound();
    let mut codec = amqp_proto::frame::FrameCodec::new(u32::MAX);
    codec.push_bytes(&out);
    let frame = codec.try_decode_frame().unwrap().expect("drain fulfillment is echoed even without echo=true");
    match frame.body {
        amqp_proto::frame::FrameBody::Amqp { performative: Performative::Flow(reply), .. } => {
            assert_eq!(reply.handle, Some(Handle(0)));
            assert_eq!(reply.delivery_count, Some(5), "delivery-count absorbed the 4 unused credits");
            assert_eq!(reply.link_credit, Some(0), "all credit consumed to fulfill drain");
            assert!(!reply.drain, "drain request is cleared once fulfilled");
        }
        other => panic!("expected a flow frame, got {other:?}"),
    }
    assert!(codec.try_decode_frame().unwrap().is_none(), "exactly one echoed flow, no transfer follows");

    let session = conn.session_mut(&handle).unwrap();
    assert_eq!(session.link(link_handle).unwrap().link_credit(), 0);
}
