use amqp_codec::{AmqpMap, Value};
use bytes::Bytes;

use crate::error::CompositeError;

mod code {
    pub const APPLICATION_PROPERTIES: u64 = 0x74;
    pub const DATA: u64 = 0x75;
    pub const AMQP_SEQUENCE: u64 = 0x76;
    pub const AMQP_VALUE: u64 = 0x77;
}

/// 3.2.5 Application Properties: a map of application-defined
/// properties, for use by the application rather than transport layers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationProperties(pub AmqpMap);

impl ApplicationProperties {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::APPLICATION_PROPERTIES, vec![Value::Map(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::APPLICATION_PROPERTIES)
            .ok_or(CompositeError::WrongDescriptor { expected: "application-properties" })?;
        let map = match Value::get_composite_item(fields, 0) {
            Value::Null => AmqpMap::new(),
            Value::Map(m) => m.clone(),
            other => {
                return Err(CompositeError::WrongFieldType {
                    field: "application-properties",
                    source: amqp_codec::AccessError::WrongType { expected: "map", found: other.type_name() },
                })
            }
        };
        Ok(ApplicationProperties(map))
    }
}

/// 3.2.6 Data: an opaque, binary body section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data(pub Bytes);

impl Data {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::DATA, vec![Value::Binary(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields =
            value.as_composite_fields(code::DATA).ok_or(CompositeError::WrongDescriptor { expected: "data" })?;
        match Value::get_composite_item(fields, 0) {
            Value::Binary(b) => Ok(Data(b.clone())),
            Value::Null => Ok(Data(Bytes::new())),
            other => Err(CompositeError::WrongFieldType {
                field: "data",
                source: amqp_codec::AccessError::WrongType { expected: "binary", found: other.type_name() },
            }),
        }
    }
}

/// 3.2.7 AMQP Sequence: a body section holding a list of values.
#[derive(Debug, Clone, PartialEq)]
pub struct AmqpSequence(pub Vec<Value>);

impl AmqpSequence {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::AMQP_SEQUENCE, vec![Value::List(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::AMQP_SEQUENCE)
            .ok_or(CompositeError::WrongDescriptor { expected: "amqp-sequence" })?;
        match Value::get_composite_item(fields, 0) {
            Value::List(items) => Ok(AmqpSequence(items.clone())),
            Value::Null => Ok(AmqpSequence(Vec::new())),
            other => Err(CompositeError::WrongFieldType {
                field: "amqp-sequence",
                source: amqp_codec::AccessError::WrongType { expected: "list", found: other.type_name() },
            }),
        }
    }
}

/// 3.2.8 AMQP Value: a body section holding a single arbitrary value.
#[derive(Debug, Clone, PartialEq)]
pub struct AmqpValue(pub Value);

impl AmqpValue {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::AMQP_VALUE, vec![self.0.clone()])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::AMQP_VALUE)
            .ok_or(CompositeError::WrongDescriptor { expected: "amqp-value" })?;
        Ok(AmqpValue(Value::get_composite_item(fields, 0).clone()))
    }
}

/// 3.2.6-3.2.8 Body: the message body, exactly one of a single `data`
/// section, a single `amqp-value` section, or one or more `amqp-sequence`
/// sections (§3.2, first paragraph).
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    /// One binary `data` section.
    Data(Data),
    /// One or more `amqp-sequence` sections, concatenated in order.
    Sequence(Vec<AmqpSequence>),
    /// A single `amqp-value` section.
    Value(AmqpValue),
    /// No body sections at all.
    Empty,
}

impl Body {
    pub(crate) fn to_values(&self) -> Vec<Value> {
        match self {
            Body::Data(d) => vec![d.to_value()],
            Body::Sequence(seqs) => seqs.iter().map(AmqpSequence::to_value).collect(),
            Body::Value(v) => vec![v.to_value()],
            Body::Empty => vec![],
        }
    }

    pub(crate) fn from_values(values: &[Value]) -> Result<Self, CompositeError> {
        if values.is_empty() {
            return Ok(Body::Empty);
        }
        if values[0].as_composite_fields(code::DATA).is_some() {
            return Ok(Body::Data(Data::from_value(&values[0])?));
        }
        if values[0].as_composite_fields(code::AMQP_VALUE).is_some() {
            return Ok(Body::Value(AmqpValue::from_value(&values[0])?));
        }
        if values[0].as_composite_fields(code::AMQP_SEQUENCE).is_some() {
            return Ok(Body::Sequence(values.iter().map(AmqpSequence::from_value).collect::<Result<_, _>>()?));
        }
        Err(CompositeError::WrongDescriptor { expected: "message body section" })
    }
}
