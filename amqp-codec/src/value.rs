//! The [`Value`] type: a tagged variant over the full AMQP 1.0 type system,
//! and its wire encoding (§3, §4.1).

use bytes::{BufMut, Bytes, BytesMut};
use ordered_float::OrderedFloat;
use uuid::Uuid;

use crate::{
    described::Described,
    error::{AccessError, DecodeError, InvalidArgument},
    format_code::FormatCode,
    map::AmqpMap,
    primitives::Symbol,
};

/// A homogeneous sequence of [`Value`]s, encoded on the wire with a single
/// shared element constructor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Array(pub Vec<Value>);

/// A self-describing AMQP value.
///
/// Every `Value` round-trips through [`Value::encode`]/[`Value::decode`] to
/// the exact bit pattern it was decoded from, modulo the equivalence class
/// of same-value different-width representations (e.g. `uint`/`smalluint`/
/// `uint0` all decode to the same `Value::UInt`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// The null value.
    Null,
    /// `true`/`false`.
    Bool(bool),
    /// 8-bit unsigned integer.
    UByte(u8),
    /// 16-bit unsigned integer.
    UShort(u16),
    /// 32-bit unsigned integer.
    UInt(u32),
    /// 64-bit unsigned integer.
    ULong(u64),
    /// 8-bit two's-complement integer.
    Byte(i8),
    /// 16-bit two's-complement integer.
    Short(i16),
    /// 32-bit two's-complement integer.
    Int(i32),
    /// 64-bit two's-complement integer.
    Long(i64),
    /// IEEE-754 binary32.
    Float(OrderedFloat<f32>),
    /// IEEE-754 binary64.
    Double(OrderedFloat<f64>),
    /// A 4-byte Unicode code point.
    Char(char),
    /// Milliseconds since the Unix epoch, signed.
    Timestamp(i64),
    /// A 16-byte UUID.
    Uuid(Uuid),
    /// An opaque byte sequence.
    Binary(Bytes),
    /// A UTF-8 string.
    String(String),
    /// An ASCII string, conventionally used for well-known names.
    Symbol(Symbol),
    /// An ordered sequence of values.
    List(Vec<Value>),
    /// An ordered key -> value map with unique keys.
    Map(AmqpMap),
    /// A homogeneous sequence of values.
    Array(Array),
    /// A described type: `{descriptor, value}`. A composite type (the
    /// payload of a performative) is a `Described` whose `value` is a
    /// `Value::List`.
    Described(Box<Described>),
}

// --------------------------------------------------------------------
// Typed constructors
// --------------------------------------------------------------------

impl Value {
    /// Build a `Value::Symbol`, rejecting non-ASCII input.
    pub fn symbol(value: impl Into<String>) -> Result<Self, InvalidArgument> {
        Ok(Value::Symbol(Symbol::new(value)?))
    }

    /// Build a composite value: a described list whose descriptor is the
    /// 64-bit performative/type code. Trailing `Null` fields (absent
    /// optional members at the end of the field list) are dropped before
    /// encoding, matching how every other AMQP implementation omits them
    /// from the wire rather than spending bytes on an explicit null;
    /// [`Value::get_composite_item`] treats a missing trailing index as a
    /// logical null on decode, so this never changes what a reader sees.
    pub fn composite(code: u64, mut fields: Vec<Value>) -> Self {
        while matches!(fields.last(), Some(Value::Null)) {
            fields.pop();
        }
        Value::Described(Box::new(Described::new(Value::ULong(code), Value::List(fields))))
    }

    /// If this value is a composite (described list) with the given
    /// descriptor code, return its field list.
    pub fn as_composite_fields(&self, code: u64) -> Option<&[Value]> {
        match self {
            Value::Described(d) if d.descriptor == Value::ULong(code) => match &d.value {
                Value::List(items) => Some(items),
                _ => None,
            },
            _ => None,
        }
    }

    /// Access a composite's field by index. An index past the end of the
    /// decoded list is a logical null (forward-compatible decoding of
    /// types that gained trailing fields), not an error.
    pub fn get_composite_item(fields: &[Value], index: usize) -> &Value {
        fields.get(index).unwrap_or(&Value::Null)
    }

    /// A human-readable name of the stored variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::UByte(_) => "ubyte",
            Value::UShort(_) => "ushort",
            Value::UInt(_) => "uint",
            Value::ULong(_) => "ulong",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Char(_) => "char",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::Binary(_) => "binary",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Array(_) => "array",
            Value::Described(_) => "described",
        }
    }

    /// True if the value is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// --------------------------------------------------------------------
// Typed accessors
// --------------------------------------------------------------------

macro_rules! accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        /// Typed accessor; fails with `WrongType` if the stored variant
        /// does not match.
        pub fn $name(&self) -> Result<$ty, AccessError> {
            match self {
                Value::$variant(v) => Ok(*v),
                other => Err(AccessError::WrongType {
                    expected: stringify!($variant),
                    found: other.type_name(),
                }),
            }
        }
    };
}

impl Value {
    accessor!(as_bool, Bool, bool);
    accessor!(as_ubyte, UByte, u8);
    accessor!(as_ushort, UShort, u16);
    accessor!(as_uint, UInt, u32);
    accessor!(as_ulong, ULong, u64);
    accessor!(as_byte, Byte, i8);
    accessor!(as_short, Short, i16);
    accessor!(as_int, Int, i32);
    accessor!(as_long, Long, i64);
    accessor!(as_char, Char, char);
    accessor!(as_timestamp, Timestamp, i64);

    /// Borrow as a string; fails with `WrongType` otherwise.
    pub fn as_str(&self) -> Result<&str, AccessError> {
        match self {
            Value::String(s) => Ok(s.as_str()),
            other => Err(AccessError::WrongType {
                expected: "string",
                found: other.type_name(),
            }),
        }
    }

    /// Borrow as a symbol; fails with `WrongType` otherwise.
    pub fn as_symbol(&self) -> Result<&Symbol, AccessError> {
        match self {
            Value::Symbol(s) => Ok(s),
            other => Err(AccessError::WrongType {
                expected: "symbol",
                found: other.type_name(),
            }),
        }
    }

    /// Borrow as binary; fails with `WrongType` otherwise.
    pub fn as_binary(&self) -> Result<&Bytes, AccessError> {
        match self {
            Value::Binary(b) => Ok(b),
            other => Err(AccessError::WrongType {
                expected: "binary",
                found: other.type_name(),
            }),
        }
    }

    /// Borrow as a list; fails with `WrongType` otherwise.
    pub fn as_list(&self) -> Result<&[Value], AccessError> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(AccessError::WrongType {
                expected: "list",
                found: other.type_name(),
            }),
        }
    }

    /// Borrow as a map; fails with `WrongType` otherwise.
    pub fn as_map(&self) -> Result<&AmqpMap, AccessError> {
        match self {
            Value::Map(m) => Ok(m),
            other => Err(AccessError::WrongType {
                expected: "map",
                found: other.type_name(),
            }),
        }
    }

    /// Narrow a `UInt` down to `u8`, failing with `Overflow` if it does
    /// not fit.
    pub fn as_uint_narrow_u8(&self) -> Result<u8, AccessError> {
        let v = self.as_uint()?;
        u8::try_from(v).map_err(|_| AccessError::Overflow)
    }
}

// --------------------------------------------------------------------
// From impls for ergonomic construction
// --------------------------------------------------------------------

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UByte(v)
    }
}
impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UShort(v)
    }
}
impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::ULong(v)
    }
}
impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}
impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
impl From<Symbol> for Value {
    fn from(v: Symbol) -> Self {
        Value::Symbol(v)
    }
}
impl From<Bytes> for Value {
    fn from(v: Bytes) -> Self {
        Value::Binary(v)
    }
}
impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

// --------------------------------------------------------------------
// Encoding
// --------------------------------------------------------------------

/// Threshold below which the 8-bit framed form (`*8`) of a variable-width
/// or compound constructor is used in place of the 32-bit form.
const SHORT_FORM_LIMIT: usize = 256;

impl Value {
    /// Encode the canonical byte form of this value into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Value::Null => buf.put_u8(FormatCode::Null.into()),
            Value::Bool(true) => buf.put_u8(FormatCode::BooleanTrue.into()),
            Value::Bool(false) => buf.put_u8(FormatCode::BooleanFalse.into()),
            Value::UByte(v) => {
                buf.put_u8(FormatCode::UByte.into());
                buf.put_u8(*v);
            }
            Value::UShort(v) => {
                buf.put_u8(FormatCode::UShort.into());
                buf.put_u16(*v);
            }
            Value::UInt(0) => buf.put_u8(FormatCode::Uint0.into()),
            Value::UInt(v) if *v < 256 => {
                buf.put_u8(FormatCode::SmallUint.into());
                buf.put_u8(*v as u8);
            }
            Value::UInt(v) => {
                buf.put_u8(FormatCode::UInt.into());
                buf.put_u32(*v);
            }
            Value::ULong(0) => buf.put_u8(FormatCode::Ulong0.into()),
            Value::ULong(v) if *v < 256 => {
                buf.put_u8(FormatCode::SmallUlong.into());
                buf.put_u8(*v as u8);
            }
            Value::ULong(v) => {
                buf.put_u8(FormatCode::ULong.into());
                buf.put_u64(*v);
            }
            Value::Byte(v) => {
                buf.put_u8(FormatCode::Byte.into());
                buf.put_i8(*v);
            }
            Value::Short(v) => {
                buf.put_u8(FormatCode::Short.into());
                buf.put_i16(*v);
            }
            Value::Int(v) if (-128..=127).contains(v) => {
                buf.put_u8(FormatCode::SmallInt.into());
                buf.put_i8(*v as i8);
            }
            Value::Int(v) => {
                buf.put_u8(FormatCode::Int.into());
                buf.put_i32(*v);
            }
            Value::Long(v) if (-128..=127).contains(v) => {
                buf.put_u8(FormatCode::SmallLong.into());
                buf.put_i8(*v as i8);
            }
            Value::Long(v) => {
                buf.put_u8(FormatCode::Long.into());
                buf.put_i64(*v);
            }
            Value::Float(v) => {
                buf.put_u8(FormatCode::Float.into());
                buf.put_f32(v.into_inner());
            }
            Value::Double(v) => {
                buf.put_u8(FormatCode::Double.into());
                buf.put_f64(v.into_inner());
            }
            Value::Char(c) => {
                buf.put_u8(FormatCode::Char.into());
                buf.put_u32(*c as u32);
            }
            Value::Timestamp(ms) => {
                buf.put_u8(FormatCode::Timestamp.into());
                buf.put_i64(*ms);
            }
            Value::Uuid(u) => {
                buf.put_u8(FormatCode::Uuid.into());
                buf.put_slice(u.as_bytes());
            }
            Value::Binary(bytes) => {
                encode_len_prefixed(buf, FormatCode::VBin8, FormatCode::VBin32, bytes);
            }
            Value::String(s) => {
                encode_len_prefixed(buf, FormatCode::Str8, FormatCode::Str32, s.as_bytes());
            }
            Value::Symbol(s) => {
                encode_len_prefixed(buf, FormatCode::Sym8, FormatCode::Sym32, s.as_str().as_bytes());
            }
            Value::List(items) => encode_list(buf, items),
            Value::Map(map) => encode_map(buf, map),
            Value::Array(array) => encode_array(buf, array),
            Value::Described(described) => {
                buf.put_u8(FormatCode::DescribedType.into());
                described.descriptor.encode(buf);
                described.value.encode(buf);
            }
        }
    }

    /// Report the byte length `encode` would produce, without exposing
    /// those bytes to the caller. Shares the recursive size computation
    /// in [`Value::body_len`] with `encode` itself, rather than encoding
    /// into a scratch buffer just to measure it.
    pub fn encoded_size(&self) -> usize {
        self.body_len()
    }

    /// The exact number of bytes `encode` writes for this value. List,
    /// map, and array constructors need this up front to choose between
    /// the 8-bit and 32-bit framed forms and to fill in the length
    /// prefix before the body is written.
    fn body_len(&self) -> usize {
        match self {
            Value::Null | Value::Bool(_) => 1,
            Value::UByte(_) => 2,
            Value::UShort(_) => 3,
            Value::UInt(0) => 1,
            Value::UInt(v) if *v < 256 => 2,
            Value::UInt(_) => 5,
            Value::ULong(0) => 1,
            Value::ULong(v) if *v < 256 => 2,
            Value::ULong(_) => 9,
            Value::Byte(_) => 2,
            Value::Short(_) => 3,
            Value::Int(v) if (-128..=127).contains(v) => 2,
            Value::Int(_) => 5,
            Value::Long(v) if (-128..=127).contains(v) => 2,
            Value::Long(_) => 9,
            Value::Float(_) => 5,
            Value::Double(_) => 9,
            Value::Char(_) => 5,
            Value::Timestamp(_) => 9,
            Value::Uuid(_) => 17,
            Value::Binary(b) => 1 + len_prefixed_size(b.len()),
            Value::String(s) => 1 + len_prefixed_size(s.len()),
            Value::Symbol(s) => 1 + len_prefixed_size(s.as_str().len()),
            Value::List(items) => list_total_len(items),
            Value::Map(map) => map_total_len(map),
            Value::Array(array) => array_total_len(array),
            Value::Described(d) => 1 + d.descriptor.body_len() + d.value.body_len(),
        }
    }

    /// Decode one value from the front of `bytes`, returning the value and
    /// the number of bytes consumed. No error variant advances past the
    /// start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
        let code_byte = *bytes.first().ok_or(DecodeError::Truncated {
            needed: 1,
            have: 0,
        })?;
        let code = FormatCode::try_from(code_byte)?;
        let rest = &bytes[1..];

        let (value, body_consumed) = match code {
            FormatCode::Null => (Value::Null, 0),
            FormatCode::BooleanTrue => (Value::Bool(true), 0),
            FormatCode::BooleanFalse => (Value::Bool(false), 0),
            FormatCode::Boolean => {
                let b = need(rest, 1)?[0];
                (Value::Bool(b != 0), 1)
            }
            FormatCode::UByte => (Value::UByte(need(rest, 1)?[0]), 1),
            FormatCode::UShort => (Value::UShort(read_u16(rest)?), 2),
            FormatCode::Uint0 => (Value::UInt(0), 0),
            FormatCode::SmallUint => (Value::UInt(need(rest, 1)?[0] as u32), 1),
            FormatCode::UInt => (Value::UInt(read_u32(rest)?), 4),
            FormatCode::Ulong0 => (Value::ULong(0), 0),
            FormatCode::SmallUlong => (Value::ULong(need(rest, 1)?[0] as u64), 1),
            FormatCode::ULong => (Value::ULong(read_u64(rest)?), 8),
            FormatCode::Byte => (Value::Byte(need(rest, 1)?[0] as i8), 1),
            FormatCode::Short => (Value::Short(read_u16(rest)? as i16), 2),
            FormatCode::SmallInt => (Value::Int(need(rest, 1)?[0] as i8 as i32), 1),
            FormatCode::Int => (Value::Int(read_u32(rest)? as i32), 4),
            FormatCode::SmallLong => (Value::Long(need(rest, 1)?[0] as i8 as i64), 1),
            FormatCode::Long => (Value::Long(read_u64(rest)? as i64), 8),
            FormatCode::Float => (Value::Float(OrderedFloat(f32::from_bits(read_u32(rest)?))), 4),
            FormatCode::Double => (Value::Double(OrderedFloat(f64::from_bits(read_u64(rest)?))), 8),
            FormatCode::Char => {
                let cp = read_u32(rest)?;
                let c = char::from_u32(cp).ok_or(DecodeError::SizeMismatch {
                    declared: cp as usize,
                    available: 0,
                })?;
                (Value::Char(c), 4)
            }
            FormatCode::Timestamp => (Value::Timestamp(read_u64(rest)? as i64), 8),
            FormatCode::Uuid => {
                let b = need(rest, 16)?;
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&b[..16]);
                (Value::Uuid(Uuid::from_bytes(arr)), 16)
            }
            FormatCode::VBin8 => {
                let (data, n) = decode_len_prefixed(rest, 1)?;
                (Value::Binary(Bytes::copy_from_slice(data)), n)
            }
            FormatCode::VBin32 => {
                let (data, n) = decode_len_prefixed(rest, 4)?;
                (Value::Binary(Bytes::copy_from_slice(data)), n)
            }
            FormatCode::Str8 => {
                let (data, n) = decode_len_prefixed(rest, 1)?;
                (Value::String(to_utf8(data)?), n)
            }
            FormatCode::Str32 => {
                let (data, n) = decode_len_prefixed(rest, 4)?;
                (Value::String(to_utf8(data)?), n)
            }
            FormatCode::Sym8 => {
                let (data, n) = decode_len_prefixed(rest, 1)?;
                (Value::Symbol(to_symbol(data)?), n)
            }
            FormatCode::Sym32 => {
                let (data, n) = decode_len_prefixed(rest, 4)?;
                (Value::Symbol(to_symbol(data)?), n)
            }
            FormatCode::List0 => (Value::List(Vec::new()), 0),
            FormatCode::List8 => decode_list(rest, 1)?,
            FormatCode::List32 => decode_list(rest, 4)?,
            FormatCode::Map8 => decode_map(rest, 1)?,
            FormatCode::Map32 => decode_map(rest, 4)?,
            FormatCode::Array8 => decode_array(rest, 1)?,
            FormatCode::Array32 => decode_array(rest, 4)?,
            FormatCode::DescribedType => {
                if rest.is_empty() {
                    return Err(DecodeError::DescriptorMissing);
                }
                let (descriptor, n1) = Value::decode(rest)?;
                let after_descriptor = &rest[n1..];
                let (value, n2) = Value::decode(after_descriptor)?;
                (
                    Value::Described(Box::new(Described::new(descriptor, value))),
                    n1 + n2,
                )
            }
        };

        Ok((value, 1 + body_consumed))
    }
}

fn need(bytes: &[u8], n: usize) -> Result<&[u8], DecodeError> {
    if bytes.len() < n {
        Err(DecodeError::Truncated {
            needed: n,
            have: bytes.len(),
        })
    } else {
        Ok(&bytes[..n])
    }
}

fn read_u16(bytes: &[u8]) -> Result<u16, DecodeError> {
    Ok(u16::from_be_bytes(need(bytes, 2)?.try_into().unwrap()))
}

fn read_u32(bytes: &[u8]) -> Result<u32, DecodeError> {
    Ok(u32::from_be_bytes(need(bytes, 4)?.try_into().unwrap()))
}

fn read_u64(bytes: &[u8]) -> Result<u64, DecodeError> {
    Ok(u64::from_be_bytes(need(bytes, 8)?.try_into().unwrap()))
}

fn to_utf8(bytes: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::UtfError)
}

fn to_symbol(bytes: &[u8]) -> Result<Symbol, DecodeError> {
    let s = to_utf8(bytes)?;
    Symbol::new(s).map_err(|_| DecodeError::NotAscii)
}

fn encode_len_prefixed(buf: &mut BytesMut, short: FormatCode, long: FormatCode, data: &[u8]) {
    if data.len() < SHORT_FORM_LIMIT {
        buf.put_u8(short.into());
        buf.put_u8(data.len() as u8);
    } else {
        buf.put_u8(long.into());
        buf.put_u32(data.len() as u32);
    }
    buf.put_slice(data);
}

/// The number of bytes `encode_len_prefixed` writes for a value whose
/// content is `len` bytes long, not counting the leading format-code byte.
fn len_prefixed_size(len: usize) -> usize {
    if len < SHORT_FORM_LIMIT {
        1 + len
    } else {
        4 + len
    }
}

/// Whether a compound constructor (list/map/array) with `count` elements
/// and `body_len` bytes of encoded body fits the 8-bit framed form.
fn compound_uses_short_form(count: usize, body_len: usize) -> bool {
    count < SHORT_FORM_LIMIT && body_len + 1 < SHORT_FORM_LIMIT
}

/// Total encoded length (format code + size + count + body) of a
/// non-empty compound value, given its element count and body length.
fn compound_total_len(count: usize, body_len: usize) -> usize {
    if compound_uses_short_form(count, body_len) {
        body_len + 3
    } else {
        body_len + 9
    }
}

fn list_total_len(items: &[Value]) -> usize {
    if items.is_empty() {
        return 1;
    }
    let body_len: usize = items.iter().map(Value::body_len).sum();
    compound_total_len(items.len(), body_len)
}

fn map_total_len(map: &AmqpMap) -> usize {
    let body_len: usize = map.iter().map(|(k, v)| k.body_len() + v.body_len()).sum();
    compound_total_len(map.len() * 2, body_len)
}

fn array_total_len(array: &Array) -> usize {
    let code = array
        .0
        .first()
        .map(array_element_code)
        .transpose()
        .ok()
        .flatten()
        .unwrap_or(FormatCode::Null);
    let body_len: usize = 1 + array.0.iter().map(|item| array_element_body_len(code, item)).sum::<usize>();
    compound_total_len(array.0.len(), body_len)
}

/// The number of bytes `encode_array_element_body` writes for `value`
/// under the shared element code `code`, not counting the code byte
/// itself (written once per array, not once per element).
fn array_element_body_len(code: FormatCode, value: &Value) -> usize {
    match (code, value) {
        (FormatCode::Null, _) => 0,
        (FormatCode::Boolean, _) => 1,
        (FormatCode::UByte, _) => 1,
        (FormatCode::UShort, _) => 2,
        (FormatCode::UInt, _) => 4,
        (FormatCode::ULong, _) => 8,
        (FormatCode::Byte, _) => 1,
        (FormatCode::Short, _) => 2,
        (FormatCode::Int, _) => 4,
        (FormatCode::Long, _) => 8,
        (FormatCode::Float, _) => 4,
        (FormatCode::Double, _) => 8,
        (FormatCode::Char, _) => 4,
        (FormatCode::Timestamp, _) => 8,
        (FormatCode::Uuid, _) => 16,
        (FormatCode::VBin32, Value::Binary(b)) => 4 + b.len(),
        (FormatCode::Str32, Value::String(s)) => 4 + s.len(),
        (FormatCode::Sym32, Value::Symbol(s)) => 4 + s.as_str().len(),
        (FormatCode::List32, Value::List(items)) => {
            8 + items.iter().map(Value::body_len).sum::<usize>()
        }
        (FormatCode::Map32, Value::Map(map)) => {
            8 + map.iter().map(|(k, v)| k.body_len() + v.body_len()).sum::<usize>()
        }
        _ => unreachable!("array element code must match encode_array's sample-derived code"),
    }
}

/// Read a `count`-byte-wide length prefix followed by that many bytes of
/// content. `count` is 1 or 4. Returns the content slice and the number
/// of bytes consumed (prefix + content).
fn decode_len_prefixed(bytes: &[u8], width: usize) -> Result<(&[u8], usize), DecodeError> {
    let len = match width {
        1 => need(bytes, 1)?[0] as usize,
        4 => read_u32(bytes)? as usize,
        _ => unreachable!(),
    };
    let content = need(&bytes[width..], len)?;
    Ok((content, width + len))
}

fn encode_list(buf: &mut BytesMut, items: &[Value]) {
    if items.is_empty() {
        buf.put_u8(FormatCode::List0.into());
        return;
    }
    let body_len: usize = items.iter().map(Value::body_len).sum();
    if compound_uses_short_form(items.len(), body_len) {
        buf.put_u8(FormatCode::List8.into());
        buf.put_u8((body_len + 1) as u8);
        buf.put_u8(items.len() as u8);
    } else {
        buf.put_u8(FormatCode::List32.into());
        buf.put_u32((body_len + 4) as u32);
        buf.put_u32(items.len() as u32);
    }
    for item in items {
        item.encode(buf);
    }
}

fn decode_list(bytes: &[u8], width: usize) -> Result<(Value, usize), DecodeError> {
    let (size, count) = match width {
        1 => (need(bytes, 1)?[0] as usize, need(&bytes[1..], 1)?[0] as usize),
        4 => (read_u32(bytes)? as usize, read_u32(&bytes[4..])? as usize),
        _ => unreachable!(),
    };
    if size < width {
        return Err(DecodeError::SizeMismatch {
            declared: size,
            available: 0,
        });
    }
    let body_len = size - width;
    let body = need(&bytes[width * 2..], body_len)?;

    let mut items = Vec::with_capacity(count);
    let mut offset = 0;
    for _ in 0..count {
        let (item, consumed) = Value::decode(&body[offset..])?;
        items.push(item);
        offset += consumed;
    }
    if offset != body_len {
        return Err(DecodeError::SizeMismatch {
            declared: body_len,
            available: offset,
        });
    }
    Ok((Value::List(items), width * 2 + body_len))
}

fn encode_map(buf: &mut BytesMut, map: &AmqpMap) {
    let body_len: usize = map.iter().map(|(k, v)| k.body_len() + v.body_len()).sum();
    let count = map.len() * 2;
    if compound_uses_short_form(count, body_len) {
        buf.put_u8(FormatCode::Map8.into());
        buf.put_u8((body_len + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(FormatCode::Map32.into());
        buf.put_u32((body_len + 4) as u32);
        buf.put_u32(count as u32);
    }
    for (k, v) in map.iter() {
        k.encode(buf);
        v.encode(buf);
    }
}

fn decode_map(bytes: &[u8], width: usize) -> Result<(Value, usize), DecodeError> {
    let (size, count) = match width {
        1 => (need(bytes, 1)?[0] as usize, need(&bytes[1..], 1)?[0] as usize),
        4 => (read_u32(bytes)? as usize, read_u32(&bytes[4..])? as usize),
        _ => unreachable!(),
    };
    if count % 2 != 0 {
        return Err(DecodeError::SizeMismatch {
            declared: count,
            available: count,
        });
    }
    if size < width {
        return Err(DecodeError::SizeMismatch {
            declared: size,
            available: 0,
        });
    }
    let body_len = size - width;
    let body = need(&bytes[width * 2..], body_len)?;

    let mut map = AmqpMap::new();
    let mut offset = 0;
    for _ in 0..(count / 2) {
        let (key, n1) = Value::decode(&body[offset..])?;
        offset += n1;
        let (value, n2) = Value::decode(&body[offset..])?;
        offset += n2;
        if map.insert(key, value).is_some() {
            return Err(DecodeError::DuplicateMapKey);
        }
    }
    if offset != body_len {
        return Err(DecodeError::SizeMismatch {
            declared: body_len,
            available: offset,
        });
    }
    Ok((Value::Map(map), width * 2 + body_len))
}

/// The single shared element constructor used to encode an [`Array`]. Only
/// the "canonical" (non-short) form is used per variant so the same code
/// can represent every element regardless of its individual magnitude.
fn array_element_code(sample: &Value) -> Result<FormatCode, DecodeError> {
    Ok(match sample {
        Value::Null => FormatCode::Null,
        Value::Bool(_) => FormatCode::Boolean,
        Value::UByte(_) => FormatCode::UByte,
        Value::UShort(_) => FormatCode::UShort,
        Value::UInt(_) => FormatCode::UInt,
        Value::ULong(_) => FormatCode::ULong,
        Value::Byte(_) => FormatCode::Byte,
        Value::Short(_) => FormatCode::Short,
        Value::Int(_) => FormatCode::Int,
        Value::Long(_) => FormatCode::Long,
        Value::Float(_) => FormatCode::Float,
        Value::Double(_) => FormatCode::Double,
        Value::Char(_) => FormatCode::Char,
        Value::Timestamp(_) => FormatCode::Timestamp,
        Value::Uuid(_) => FormatCode::Uuid,
        Value::Binary(_) => FormatCode::VBin32,
        Value::String(_) => FormatCode::Str32,
        Value::Symbol(_) => FormatCode::Sym32,
        Value::List(_) => FormatCode::List32,
        Value::Map(_) => FormatCode::Map32,
        Value::Array(_) | Value::Described(_) => return Err(DecodeError::InvalidArrayElements),
    })
}

fn encode_array_element_body(buf: &mut BytesMut, code: FormatCode, value: &Value) {
    match (code, value) {
        (FormatCode::Null, _) => {}
        (FormatCode::Boolean, Value::Bool(b)) => buf.put_u8(*b as u8),
        (FormatCode::UByte, Value::UByte(v)) => buf.put_u8(*v),
        (FormatCode::UShort, Value::UShort(v)) => buf.put_u16(*v),
        (FormatCode::UInt, Value::UInt(v)) => buf.put_u32(*v),
        (FormatCode::ULong, Value::ULong(v)) => buf.put_u64(*v),
        (FormatCode::Byte, Value::Byte(v)) => buf.put_i8(*v),
        (FormatCode::Short, Value::Short(v)) => buf.put_i16(*v),
        (FormatCode::Int, Value::Int(v)) => buf.put_i32(*v),
        (FormatCode::Long, Value::Long(v)) => buf.put_i64(*v),
        (FormatCode::Float, Value::Float(v)) => buf.put_f32(v.into_inner()),
        (FormatCode::Double, Value::Double(v)) => buf.put_f64(v.into_inner()),
        (FormatCode::Char, Value::Char(c)) => buf.put_u32(*c as u32),
        (FormatCode::Timestamp, Value::Timestamp(ms)) => buf.put_i64(*ms),
        (FormatCode::Uuid, Value::Uuid(u)) => buf.put_slice(u.as_bytes()),
        (FormatCode::VBin32, Value::Binary(b)) => {
            buf.put_u32(b.len() as u32);
            buf.put_slice(b);
        }
        (FormatCode::Str32, Value::String(s)) => {
            buf.put_u32(s.len() as u32);
            buf.put_slice(s.as_bytes());
        }
        (FormatCode::Sym32, Value::Symbol(s)) => {
            buf.put_u32(s.as_str().len() as u32);
            buf.put_slice(s.as_str().as_bytes());
        }
        (FormatCode::List32, Value::List(items)) => {
            let body_len: usize = items.iter().map(Value::body_len).sum();
            buf.put_u32((body_len + 4) as u32);
            buf.put_u32(items.len() as u32);
            for item in items {
                item.encode(buf);
            }
        }
        (FormatCode::Map32, Value::Map(map)) => {
            let body_len: usize = map.iter().map(|(k, v)| k.body_len() + v.body_len()).sum();
            buf.put_u32((body_len + 4) as u32);
            buf.put_u32((map.len() * 2) as u32);
            for (k, v) in map.iter() {
                k.encode(buf);
                v.encode(buf);
            }
        }
        _ => unreachable!("array element code must match encode_array's sample-derived code"),
    }
}

fn decode_array_element_body(code: FormatCode, bytes: &[u8]) -> Result<(Value, usize), DecodeError> {
    Ok(match code {
        FormatCode::Null => (Value::Null, 0),
        FormatCode::Boolean => (Value::Bool(need(bytes, 1)?[0] != 0), 1),
        FormatCode::UByte => (Value::UByte(need(bytes, 1)?[0]), 1),
        FormatCode::UShort => (Value::UShort(read_u16(bytes)?), 2),
        FormatCode::UInt => (Value::UInt(read_u32(bytes)?), 4),
        FormatCode::ULong => (Value::ULong(read_u64(bytes)?), 8),
        FormatCode::Byte => (Value::Byte(need(bytes, 1)?[0] as i8), 1),
        FormatCode::Short => (Value::Short(read_u16(bytes)? as i16), 2),
        FormatCode::Int => (Value::Int(read_u32(bytes)? as i32), 4),
        FormatCode::Long => (Value::Long(read_u64(bytes)? as i64), 8),
        FormatCode::Float => (Value::Float(OrderedFloat(f32::from_bits(read_u32(bytes)?))), 4),
        FormatCode::Double => (Value::Double(OrderedFloat(f64::from_bits(read_u64(bytes)?))), 8),
        FormatCode::Char => {
            let cp = read_u32(bytes)?;
            let c = char::from_u32(cp).ok_or(DecodeError::InvalidArrayElements)?;
            (Value::Char(c), 4)
        }
        FormatCode::Timestamp => (Value::Timestamp(read_u64(bytes)? as i64), 8),
        FormatCode::Uuid => {
            let b = need(bytes, 16)?;
            let mut arr = [0u8; 16];
            arr.copy_from_slice(&b[..16]);
            (Value::Uuid(Uuid::from_bytes(arr)), 16)
        }
        FormatCode::VBin32 => {
            let (data, n) = decode_len_prefixed(bytes, 4)?;
            (Value::Binary(Bytes::copy_from_slice(data)), n)
        }
        FormatCode::Str32 => {
            let (data, n) = decode_len_prefixed(bytes, 4)?;
            (Value::String(to_utf8(data)?), n)
        }
        FormatCode::Sym32 => {
            let (data, n) = decode_len_prefixed(bytes, 4)?;
            (Value::Symbol(to_symbol(data)?), n)
        }
        FormatCode::List32 => decode_list(bytes, 4)?,
        FormatCode::Map32 => decode_map(bytes, 4)?,
        _ => return Err(DecodeError::InvalidArrayElements),
    })
}

fn encode_array(buf: &mut BytesMut, array: &Array) {
    let code = array
        .0
        .first()
        .map(array_element_code)
        .transpose()
        .ok()
        .flatten()
        .unwrap_or(FormatCode::Null);

    let body_len: usize =
        1 + array.0.iter().map(|item| array_element_body_len(code, item)).sum::<usize>();
    let count = array.0.len();
    if compound_uses_short_form(count, body_len) {
        buf.put_u8(FormatCode::Array8.into());
        buf.put_u8((body_len + 1) as u8);
        buf.put_u8(count as u8);
    } else {
        buf.put_u8(FormatCode::Array32.into());
        buf.put_u32((body_len + 4) as u32);
        buf.put_u32(count as u32);
    }
    buf.put_u8(code.into());
    for item in &array.0 {
        encode_array_element_body(buf, code, item);
    }
}

fn decode_array(bytes: &[u8], width: usize) -> Result<(Value, usize), DecodeError> {
    let (size, count) = match width {
        1 => (need(bytes, 1)?[0] as usize, need(&bytes[1..], 1)?[0] as usize),
        4 => (read_u32(bytes)? as usize, read_u32(&bytes[4..])? as usize),
        _ => unreachable!(),
    };
    if size < width {
        return Err(DecodeError::SizeMismatch {
            declared: size,
            available: 0,
        });
    }
    let body_len = size - width;
    let body = need(&bytes[width * 2..], body_len)?;

    let code_byte = *body.first().ok_or(DecodeError::Truncated {
        needed: 1,
        have: 0,
    })?;
    let code = FormatCode::try_from(code_byte)?;
    let mut offset = 1;
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        let (item, consumed) = decode_array_element_body(code, &body[offset..])?;
        items.push(item);
        offset += consumed;
    }
    if offset != body_len {
        return Err(DecodeError::SizeMismatch {
            declared: body_len,
            available: offset,
        });
    }
    Ok((Value::Array(Array(items)), width * 2 + body_len))
}
