//! §4.2 Frame Codec: incremental framing over a byte stream with bounded
//! intermediate buffering, and performative dispatch.

use amqp_types::performatives::{Performative, SaslFrameBody};
use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::serial;

/// Type byte of an AMQP (type-0) frame.
pub const FRAME_TYPE_AMQP: u8 = 0x00;
/// Type byte of a SASL (type-1) frame.
pub const FRAME_TYPE_SASL: u8 = 0x01;

const FRAME_HEADER_LEN: usize = 8;

/// One fully-decoded frame body, dispatched by the connection to the
/// session or link owning its channel/handle.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBody {
    /// An AMQP performative; `Transfer` payload bytes are appended
    /// separately as `payload`.
    Amqp {
        /// The decoded performative.
        performative: Performative,
        /// Trailing payload bytes, non-empty only for `transfer`.
        payload: Bytes,
    },
    /// A SASL negotiation frame, exchanged before the AMQP protocol
    /// header is sent.
    Sasl(SaslFrameBody),
    /// An empty frame, sent only to reset the remote idle timeout.
    Empty,
}

/// A decoded frame together with the channel it arrived on. The channel
/// is meaningless for SASL and empty frames and is set to `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// The AMQP channel this frame was sent on.
    pub channel: u16,
    /// The frame's body.
    pub body: FrameBody,
}

/// A performative the session or link layer wants sent, still missing
/// the channel number the connection assigns it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFrame {
    /// The performative to encode.
    pub performative: Performative,
    /// Trailing payload, non-empty only for `transfer`.
    pub payload: Bytes,
}

impl OutgoingFrame {
    /// An outgoing frame with no trailing payload.
    pub fn new(performative: Performative) -> Self {
        OutgoingFrame { performative, payload: Bytes::new() }
    }
}

impl Frame {
    /// An empty frame on channel 0, used only to reset the remote idle
    /// timeout.
    pub fn empty() -> Self {
        Frame { channel: 0, body: FrameBody::Empty }
    }
}

/// Errors raised while decoding frames off the wire.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// `size` was smaller than the minimum frame header.
    #[error("frame size {0} is smaller than the 8-byte frame header")]
    SizeTooSmall(u32),
    /// `data_offset` (in 4-byte words) does not leave room for the
    /// 8-byte header.
    #[error("data offset {0} is smaller than the minimum of 2")]
    DataOffsetTooSmall(u8),
    /// `data_offset * 4` exceeded the frame's declared `size`.
    #[error("data offset extends past the declared frame size")]
    DataOffsetExceedsSize,
    /// The declared frame size exceeds what this peer advertised it
    /// would accept.
    #[error("frame size {size} exceeds the locally negotiated max-frame-size {max}")]
    ExceedsLocalMax {
        /// The offending frame's declared size.
        size: u32,
        /// The locally negotiated max-frame-size.
        max: u32,
    },
    /// An unrecognized frame type byte.
    #[error("unknown frame type byte {0:#04x}")]
    UnknownFrameType(u8),
    /// The performative failed to decode as a composite value.
    #[error(transparent)]
    Composite(#[from] amqp_types::CompositeError),
    /// The performative's wire bytes failed to decode.
    #[error(transparent)]
    Decode(#[from] amqp_codec::DecodeError),
}

/// Raised by [`FrameCodec::encode`] when a frame cannot be emitted
/// without exceeding the remote's negotiated max-frame-size; the caller
/// (session or link layer) is responsible for fragmenting.
#[derive(Debug, thiserror::Error)]
#[error("encoded frame of {encoded} bytes would exceed the remote max-frame-size of {max}")]
pub struct WouldExceedMaxFrame {
    /// The size the frame would have encoded to.
    pub encoded: usize,
    /// The remote's negotiated max-frame-size.
    pub max: u32,
}

#[derive(Debug)]
enum DecodeState {
    AwaitingHeader,
    AwaitingBody { size: u32, doff: u8, ftype: u8, channel: u16 },
}

/// Incremental frame decoder: buffers partial frames across
/// `push_bytes` calls until a complete frame is available from
/// `try_decode_frame`.
#[derive(Debug)]
pub struct FrameCodec {
    buf: BytesMut,
    state: DecodeState,
    local_max_frame_size: u32,
}

impl FrameCodec {
    /// Create a codec that rejects any frame whose declared `size`
    /// exceeds `local_max_frame_size`.
    pub fn new(local_max_frame_size: u32) -> Self {
        FrameCodec { buf: BytesMut::new(), state: DecodeState::AwaitingHeader, local_max_frame_size }
    }

    /// Feed newly-received bytes into the decode buffer.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Attempt to decode one complete frame from the buffered bytes.
    /// Returns `Ok(None)` when more bytes are needed; does not advance
    /// the buffer on a malformed frame (the caller should close the
    /// connection instead of retrying).
    pub fn try_decode_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        loop {
            match self.state {
                DecodeState::AwaitingHeader => {
                    if self.buf.len() < FRAME_HEADER_LEN {
                        return Ok(None);
                    }
                    let size = (&self.buf[0..4]).get_u32();
                    let doff = self.buf[4];
                    let ftype = self.buf[5];
                    let channel = (&self.buf[6..8]).get_u16();

                    if size < FRAME_HEADER_LEN as u32 {
                        return Err(FrameError::SizeTooSmall(size));
                    }
                    if doff < 2 {
                        return Err(FrameError::DataOffsetTooSmall(doff));
                    }
                    if (doff as u32) * 4 > size {
                        return Err(FrameError::DataOffsetExceedsSize);
                    }
                    if size > self.local_max_frame_size {
                        return Err(FrameError::ExceedsLocalMax { size, max: self.local_max_frame_size });
                    }

                    self.buf.advance(FRAME_HEADER_LEN);
                    self.state = DecodeState::AwaitingBody { size, doff, ftype, channel };
                }
                DecodeState::AwaitingBody { size, doff, ftype, channel } => {
                    let remaining_needed = size as usize - FRAME_HEADER_LEN;
                    if self.buf.len() < remaining_needed {
                        return Ok(None);
                    }
                    let extended_header_len = doff as usize * 4 - FRAME_HEADER_LEN;
                    let mut body = self.buf.split_to(remaining_needed);
                    body.advance(extended_header_len);
                    self.state = DecodeState::AwaitingHeader;

                    let frame = decode_frame_body(channel, ftype, body.freeze())?;
                    return Ok(Some(frame));
                }
            }
        }
    }
}

fn decode_frame_body(channel: u16, ftype: u8, body: Bytes) -> Result<Frame, FrameError> {
    if body.is_empty() {
        return Ok(Frame { channel, body: FrameBody::Empty });
    }
    match ftype {
        FRAME_TYPE_AMQP => {
            let (value, consumed) = amqp_codec::Value::decode(&body)?;
            let performative = Performative::from_value(&value)?;
            let payload = body.slice(consumed..);
            Ok(Frame { channel, body: FrameBody::Amqp { performative, payload } })
        }
        FRAME_TYPE_SASL => {
            let (value, _) = amqp_codec::Value::decode(&body)?;
            let sasl_body = SaslFrameBody::from_value(&value)?;
            Ok(Frame { channel: 0, body: FrameBody::Sasl(sasl_body) })
        }
        other => Err(FrameError::UnknownFrameType(other)),
    }
}

/// Encode a performative (plus, for `transfer`, payload bytes) as an
/// AMQP (type-0) frame, respecting `remote_max_frame_size`.
pub fn encode_amqp_frame(
    channel: u16,
    performative: &Performative,
    payload: &[u8],
    remote_max_frame_size: u32,
) -> Result<BytesMut, WouldExceedMaxFrame> {
    let mut body = BytesMut::new();
    performative.to_value().encode(&mut body);
    let total = FRAME_HEADER_LEN + body.len() + payload.len();
    if total as u32 > remote_max_frame_size {
        return Err(WouldExceedMaxFrame { encoded: total, max: remote_max_frame_size });
    }
    let mut out = BytesMut::with_capacity(total);
    out.put_u32(total as u32);
    out.put_u8(2); // doff: no extended header
    out.put_u8(FRAME_TYPE_AMQP);
    out.put_u16(channel);
    out.extend_from_slice(&body);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode an empty frame (keepalive), always exactly 8 bytes.
pub fn encode_empty_frame() -> BytesMut {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN);
    out.put_u32(FRAME_HEADER_LEN as u32);
    out.put_u8(2);
    out.put_u8(FRAME_TYPE_AMQP);
    out.put_u16(0);
    out
}

/// Encode a SASL (type-1) frame. SASL frames never exceed the
/// negotiation-time default max-frame-size in practice, so this does
/// not fragment.
pub fn encode_sasl_frame(body: &SaslFrameBody) -> BytesMut {
    let mut value_bytes = BytesMut::new();
    body.to_value().encode(&mut value_bytes);
    let total = FRAME_HEADER_LEN + value_bytes.len();
    let mut out = BytesMut::with_capacity(total);
    out.put_u32(total as u32);
    out.put_u8(2);
    out.put_u8(FRAME_TYPE_SASL);
    out.put_u16(0);
    out.extend_from_slice(&value_bytes);
    out
}

/// The 8-byte AMQP protocol header: `"AMQP"` followed by protocol id,
/// major, minor, revision (§6: literal `41 4D 51 50 00 01 00 00`).
pub const AMQP_PROTOCOL_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0x00, 1, 0, 0];
/// The 8-byte SASL protocol header, sent instead of
/// [`AMQP_PROTOCOL_HEADER`] when SASL negotiation precedes the AMQP
/// handshake.
pub const SASL_PROTOCOL_HEADER: [u8; 8] = [b'A', b'M', b'Q', b'P', 0x03, 1, 0, 0];

/// Whether `delivery_id_a` was assigned strictly before
/// `delivery_id_b`, per RFC 1982 serial-number ordering (§4.4).
pub fn delivery_precedes(delivery_id_a: u32, delivery_id_b: u32) -> bool {
    serial::precedes(delivery_id_a, delivery_id_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_types::performatives::Open;

    #[test]
    fn roundtrip_open_frame() {
        let open = Open { container_id: "test".into(), ..Default::default() };
        let performative = Performative::Open(open.clone());
        let encoded = encode_amqp_frame(0, &performative, &[], u32::MAX).unwrap();

        let mut codec = FrameCodec::new(u32::MAX);
        codec.push_bytes(&encoded);
        let frame = codec.try_decode_frame().unwrap().unwrap();
        match frame.body {
            FrameBody::Amqp { performative: Performative::Open(decoded), payload } => {
                assert_eq!(decoded.container_id, open.container_id);
                assert!(payload.is_empty());
            }
            other => panic!("unexpected frame body: {other:?}"),
        }
    }

    #[test]
    fn incremental_feed_yields_frame_once_complete() {
        let open = Open { container_id: "x".into(), ..Default::default() };
        let encoded = encode_amqp_frame(0, &Performative::Open(open), &[], u32::MAX).unwrap();

        let mut codec = FrameCodec::new(u32::MAX);
        codec.push_bytes(&encoded[..4]);
        assert!(codec.try_decode_frame().unwrap().is_none());
        codec.push_bytes(&encoded[4..]);
        assert!(codec.try_decode_frame().unwrap().is_some());
    }

    #[test]
    fn empty_frame_round_trips() {
        let encoded = encode_empty_frame();
        assert_eq!(&encoded[..], &[0, 0, 0, 8, 2, 0, 0, 0]);
        let mut codec = FrameCodec::new(u32::MAX);
        codec.push_bytes(&encoded);
        let frame = codec.try_decode_frame().unwrap().unwrap();
        assert_eq!(frame.body, FrameBody::Empty);
    }

    #[test]
    fn rejects_frame_over_local_max() {
        let open = Open { container_id: "x".into(), ..Default::default() };
        let encoded = encode_amqp_frame(0, &Performative::Open(open), &[], u32::MAX).unwrap();
        let mut codec = FrameCodec::new(8);
        codec.push_bytes(&encoded);
        assert!(matches!(codec.try_decode_frame(), Err(FrameError::ExceedsLocalMax { .. })));
    }

    #[test]
    fn transfer_oversized_payload_rejected_by_encoder() {
        use amqp_types::performatives::Transfer;
        use amqp_types::definitions::Handle;

        let transfer = Transfer {
            handle: Handle(0),
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
        let payload = vec![0u8; 100];
        let result = encode_amqp_frame(0, &Performative::Transfer(transfer), &payload, 64);
        assert!(result.is_err());
    }
}
