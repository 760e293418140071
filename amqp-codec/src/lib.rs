//! Encoding and decoding of the AMQP 1.0 self-describing type system (§3,
//! §4.1): the [`Value`] enum, its wire format, and the primitive newtypes
//! built on top of it.
//!
//! This crate has no notion of frames, performatives, or connections — it
//! only knows how to turn bytes into [`Value`]s and back.

#![warn(missing_docs)]

mod described;
mod error;
mod format_code;
mod map;
mod primitives;
mod value;

pub use described::Described;
pub use error::{AccessError, DecodeError, InvalidArgument};
pub use format_code::FormatCode;
pub use map::AmqpMap;
pub use primitives::Symbol;
pub use value::{Array, Value};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, Bytes, BytesMut};
    use ordered_float::OrderedFloat;

    fn roundtrip(v: Value) {
        let mut buf = BytesMut::new();
        v.encode(&mut buf);
        let (decoded, consumed) = Value::decode(&buf).expect("decode should succeed");
        assert_eq!(consumed, buf.len(), "decode should consume the whole encoding");
        assert_eq!(decoded, v, "decode(encode(v)) == v");
    }

    #[test]
    fn roundtrip_null_and_bool() {
        roundtrip(Value::Null);
        roundtrip(Value::Bool(true));
        roundtrip(Value::Bool(false));
    }

    #[test]
    fn roundtrip_unsigned_short_forms() {
        roundtrip(Value::UInt(0));
        roundtrip(Value::UInt(42));
        roundtrip(Value::UInt(1000));
        roundtrip(Value::ULong(0));
        roundtrip(Value::ULong(255));
        roundtrip(Value::ULong(u64::MAX));
    }

    #[test]
    fn roundtrip_signed_short_forms() {
        roundtrip(Value::Int(0));
        roundtrip(Value::Int(-1));
        roundtrip(Value::Int(i32::MIN));
        roundtrip(Value::Long(127));
        roundtrip(Value::Long(128));
        roundtrip(Value::Long(i64::MIN));
    }

    #[test]
    fn small_uint_uses_one_byte_body() {
        let mut buf = BytesMut::new();
        Value::UInt(5).encode(&mut buf);
        assert_eq!(buf.len(), 2, "smalluint constructor + 1 byte body");
        assert_eq!(buf[0], FormatCode::SmallUint.into());
    }

    #[test]
    fn uint_zero_is_a_bare_constructor() {
        let mut buf = BytesMut::new();
        Value::UInt(0).encode(&mut buf);
        assert_eq!(buf.len(), 1);
        assert_eq!(buf[0], FormatCode::Uint0.into());
    }

    #[test]
    fn roundtrip_float_double() {
        roundtrip(Value::Float(OrderedFloat(1.5)));
        roundtrip(Value::Double(OrderedFloat(-0.0)));
    }

    #[test]
    fn roundtrip_char_timestamp_uuid() {
        roundtrip(Value::Char('λ'));
        roundtrip(Value::Timestamp(-1));
        roundtrip(Value::Uuid(uuid::Uuid::nil()));
    }

    #[test]
    fn roundtrip_binary_string_symbol() {
        roundtrip(Value::Binary(Bytes::from_static(b"hello")));
        roundtrip(Value::String("unicode \u{1F980}".to_string()));
        roundtrip(Value::from(Symbol::new("amqp:accepted:list").unwrap()));
    }

    #[test]
    fn long_string_uses_32_bit_form() {
        let big = "x".repeat(300);
        let mut buf = BytesMut::new();
        Value::String(big.clone()).encode(&mut buf);
        assert_eq!(buf[0], FormatCode::Str32.into());
        roundtrip(Value::String(big));
    }

    #[test]
    fn roundtrip_empty_and_nested_list() {
        roundtrip(Value::List(Vec::new()));
        roundtrip(Value::List(vec![
            Value::UInt(1),
            Value::String("two".into()),
            Value::List(vec![Value::Bool(true)]),
        ]));
    }

    #[test]
    fn roundtrip_map() {
        let mut map = AmqpMap::new();
        map.insert(Value::from("key"), Value::UInt(1));
        map.insert(Value::from("other"), Value::Null);
        roundtrip(Value::Map(map));
    }

    #[test]
    fn decode_rejects_duplicate_map_key() {
        let mut body = BytesMut::new();
        Value::from("k").encode(&mut body);
        Value::UInt(1).encode(&mut body);
        Value::from("k").encode(&mut body);
        Value::UInt(2).encode(&mut body);

        let mut buf = BytesMut::new();
        buf.put_u8(FormatCode::Map32.into());
        let size = (body.len() + 4) as u32;
        buf.extend_from_slice(&size.to_be_bytes());
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(&body);

        let err = Value::decode(&buf).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateMapKey));
    }

    #[test]
    fn roundtrip_homogeneous_array() {
        roundtrip(Value::Array(Array(vec![
            Value::UInt(1),
            Value::UInt(2),
            Value::UInt(3),
        ])));
    }

    #[test]
    fn roundtrip_empty_array() {
        roundtrip(Value::Array(Array(Vec::new())));
    }

    #[test]
    fn roundtrip_composite() {
        let composite = Value::composite(
            0x0000_0000_0000_0010,
            vec![Value::UInt(128), Value::Bool(false)],
        );
        roundtrip(composite.clone());
        let fields = composite.as_composite_fields(0x10).unwrap();
        assert_eq!(fields[0], Value::UInt(128));
        assert_eq!(Value::get_composite_item(fields, 5), &Value::Null);
    }

    #[test]
    fn decode_truncated_input_reports_need() {
        let err = Value::decode(&[FormatCode::UInt.into(), 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn decode_unknown_format_code() {
        let err = Value::decode(&[0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownFormatCode(0xff)));
    }

    #[test]
    fn symbol_rejects_non_ascii() {
        assert!(Symbol::new("caf\u{e9}").is_err());
    }

    #[test]
    fn encoded_size_matches_encode_len() {
        let v = Value::List(vec![Value::UInt(1), Value::String("hi".into())]);
        let mut buf = BytesMut::new();
        v.encode(&mut buf);
        assert_eq!(v.encoded_size(), buf.len());
    }
}
