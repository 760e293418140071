//! Scalar aliases and small newtypes that carry the wire width of the
//! fields they stand in for (2.8.4 - 2.8.13).

use amqp_codec::{AmqpMap, Symbol, Value};

/// 2.8.4 Handle: a link endpoint name, local to one end of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(pub u32);

impl Default for Handle {
    /// The AMQP spec has no reserved "unset" handle; this codebase uses
    /// `u32::MAX` as a local sentinel for "not yet assigned".
    fn default() -> Self {
        Handle(u32::MAX)
    }
}

impl From<u32> for Handle {
    fn from(v: u32) -> Self {
        Handle(v)
    }
}

impl From<Handle> for u32 {
    fn from(v: Handle) -> Self {
        v.0
    }
}

impl From<Handle> for Value {
    fn from(v: Handle) -> Self {
        Value::UInt(v.0)
    }
}

/// 2.8.5 Seconds.
pub type Seconds = u32;
/// 2.8.6 Milliseconds.
pub type Milliseconds = u32;
/// 2.8.7 Delivery tag: up to 32 octets of opaque binary data.
pub type DeliveryTag = bytes::Bytes;
/// 2.8.8 Delivery number.
pub type DeliveryNumber = SequenceNo;
/// 2.8.9 Transfer number.
pub type TransferNumber = SequenceNo;
/// 2.8.10 Sequence number: a 32-bit RFC-1982 serial number.
pub type SequenceNo = u32;
/// 2.8.11 Message format.
pub type MessageFormat = u32;
/// 2.8.12 IETF language tag.
pub type IetfLanguageTag = Symbol;

/// 2.8.13 Fields: a map keyed by symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fields(AmqpMap);

impl Fields {
    /// An empty field map.
    pub fn new() -> Self {
        Self(AmqpMap::new())
    }

    /// Insert a value under a symbol key.
    pub fn insert(&mut self, key: Symbol, value: Value) -> Option<Value> {
        self.0.insert(Value::Symbol(key), value)
    }

    /// Look up a value by symbol key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| matches!(k, Value::Symbol(s) if s.as_str() == key)).map(|(_, v)| v)
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Fields> for Value {
    fn from(fields: Fields) -> Self {
        Value::Map(fields.0)
    }
}

impl TryFrom<Value> for Fields {
    type Error = amqp_codec::AccessError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Ok(Fields(value.as_map()?.clone()))
    }
}
