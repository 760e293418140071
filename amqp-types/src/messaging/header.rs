use amqp_codec::Value;

use crate::definitions::Milliseconds;
use crate::error::CompositeError;
use crate::util::{bool_default_false, opt_u32};

mod code {
    pub const HEADER: u64 = 0x70;
}

/// 3.2.1 Header: transport headers for a message, set by the sender and
/// consumed at each hop (durability, priority, TTL, first-acquirer).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    /// Whether the message survives an intermediary restart.
    pub durable: bool,
    /// Relative message priority; higher values are more urgent.
    pub priority: u8,
    /// Time-to-live, in milliseconds, after which an unconsumed message
    /// may be discarded.
    pub ttl: Option<Milliseconds>,
    /// `true` only for the first recipient of a message distributed to
    /// multiple links.
    pub first_acquirer: bool,
    /// The number of prior unsuccessful delivery attempts.
    pub delivery_count: u32,
}

impl Header {
    /// Start building a `Header`.
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::composite(
            code::HEADER,
            vec![
                Value::Bool(self.durable),
                Value::UByte(self.priority),
                self.ttl.map(Value::UInt).unwrap_or(Value::Null),
                Value::Bool(self.first_acquirer),
                Value::UInt(self.delivery_count),
            ],
        )
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::HEADER)
            .ok_or(CompositeError::WrongDescriptor { expected: "header" })?;
        Ok(Header {
            durable: bool_default_false(fields, 0, "durable")?,
            priority: match Value::get_composite_item(fields, 1) {
                Value::Null => 4,
                other => other.as_ubyte().map_err(|source| CompositeError::WrongFieldType {
                    field: "priority",
                    source,
                })?,
            },
            ttl: opt_u32(fields, 2, "ttl")?,
            first_acquirer: bool_default_false(fields, 3, "first-acquirer")?,
            delivery_count: opt_u32(fields, 4, "delivery-count")?.unwrap_or(0),
        })
    }
}

/// Builder for [`Header`].
#[derive(Debug, Clone, Default)]
pub struct Builder {
    inner: Header,
}

impl Builder {
    /// Set `durable`.
    pub fn durable(mut self, value: bool) -> Self {
        self.inner.durable = value;
        self
    }

    /// Set `priority`.
    pub fn priority(mut self, value: u8) -> Self {
        self.inner.priority = value;
        self
    }

    /// Set `ttl`.
    pub fn ttl(mut self, value: Milliseconds) -> Self {
        self.inner.ttl = Some(value);
        self
    }

    /// Set `first_acquirer`.
    pub fn first_acquirer(mut self, value: bool) -> Self {
        self.inner.first_acquirer = value;
        self
    }

    /// Set `delivery_count`.
    pub fn delivery_count(mut self, value: u32) -> Self {
        self.inner.delivery_count = value;
        self
    }

    /// Build the `Header`.
    pub fn build(self) -> Header {
        self.inner
    }
}
