use amqp_codec::Value;
use bytes::Bytes;
use uuid::Uuid;

/// 3.2.11-3.2.14 Message ID / Correlation ID: an application-supplied
/// identifier for a message, in one of four wire representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageId {
    /// 3.2.11
    ULong(u64),
    /// 3.2.12
    Uuid(Uuid),
    /// 3.2.13
    Binary(Bytes),
    /// 3.2.14
    String(String),
}

impl From<MessageId> for Value {
    fn from(id: MessageId) -> Self {
        match id {
            MessageId::ULong(v) => Value::ULong(v),
            MessageId::Uuid(v) => Value::Uuid(v),
            MessageId::Binary(v) => Value::Binary(v),
            MessageId::String(v) => Value::String(v),
        }
    }
}

impl TryFrom<&Value> for MessageId {
    type Error = amqp_codec::AccessError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::ULong(v) => Ok(MessageId::ULong(*v)),
            Value::Uuid(v) => Ok(MessageId::Uuid(*v)),
            Value::Binary(v) => Ok(MessageId::Binary(v.clone())),
            Value::String(v) => Ok(MessageId::String(v.clone())),
            other => Err(amqp_codec::AccessError::WrongType { expected: "message-id", found: other.type_name() }),
        }
    }
}

/// 3.2.15 Address: a node's address. Only the string form is defined.
pub type Address = String;
