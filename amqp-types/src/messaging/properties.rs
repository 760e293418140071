use amqp_codec::{Symbol, Value};

use crate::definitions::SequenceNo;
use crate::error::CompositeError;
use crate::messaging::message_id::{Address, MessageId};
use crate::util::{opt_message_id, opt_string, opt_symbol, opt_timestamp, opt_u32};

mod code {
    pub const PROPERTIES: u64 = 0x73;
}

/// 3.2.4 Properties: the immutable properties of a message, carried
/// unchanged end to end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Properties {
    /// Application-supplied message identifier.
    pub message_id: Option<MessageId>,
    /// Identity of the user responsible for producing the message.
    pub user_id: Option<bytes::Bytes>,
    /// The node the message is addressed to.
    pub to: Option<Address>,
    /// A common field for summary information about the message.
    pub subject: Option<String>,
    /// The node to send replies to.
    pub reply_to: Option<Address>,
    /// Identifier for a message to which this one is a reply.
    pub correlation_id: Option<MessageId>,
    /// MIME type of `data` sections in the body, for descriptor-less data.
    pub content_type: Option<Symbol>,
    /// MIME content-encoding, mirroring the HTTP header of the same name.
    pub content_encoding: Option<Symbol>,
    /// The time past which the message is considered expired.
    pub absolute_expiry_time: Option<i64>,
    /// The time the message was created.
    pub creation_time: Option<i64>,
    /// Identifies the group the message belongs to.
    pub group_id: Option<String>,
    /// The relative position of this message within its group.
    pub group_sequence: Option<SequenceNo>,
    /// Group the reply message belongs to.
    pub reply_to_group_id: Option<String>,
}

impl Properties {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(
            code::PROPERTIES,
            vec![
                self.message_id.clone().map(Value::from).unwrap_or(Value::Null),
                self.user_id.clone().map(Value::Binary).unwrap_or(Value::Null),
                self.to.clone().map(Value::String).unwrap_or(Value::Null),
                self.subject.clone().map(Value::String).unwrap_or(Value::Null),
                self.reply_to.clone().map(Value::String).unwrap_or(Value::Null),
                self.correlation_id.clone().map(Value::from).unwrap_or(Value::Null),
                self.content_type.clone().map(Value::Symbol).unwrap_or(Value::Null),
                self.content_encoding.clone().map(Value::Symbol).unwrap_or(Value::Null),
                self.absolute_expiry_time.map(Value::Timestamp).unwrap_or(Value::Null),
                self.creation_time.map(Value::Timestamp).unwrap_or(Value::Null),
                self.group_id.clone().map(Value::String).unwrap_or(Value::Null),
                self.group_sequence.map(Value::UInt).unwrap_or(Value::Null),
                self.reply_to_group_id.clone().map(Value::String).unwrap_or(Value::Null),
            ],
        )
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::PROPERTIES)
            .ok_or(CompositeError::WrongDescriptor { expected: "properties" })?;
        Ok(Properties {
            message_id: opt_message_id(fields, 0, "message-id")?,
            user_id: match Value::get_composite_item(fields, 1) {
                Value::Null => None,
                Value::Binary(b) => Some(b.clone()),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "user-id",
                        source: amqp_codec::AccessError::WrongType { expected: "binary", found: other.type_name() },
                    })
                }
            },
            to: opt_string(fields, 2, "to")?,
            subject: opt_string(fields, 3, "subject")?,
            reply_to: opt_string(fields, 4, "reply-to")?,
            correlation_id: opt_message_id(fields, 5, "correlation-id")?,
            content_type: opt_symbol(fields, 6, "content-type")?,
            content_encoding: opt_symbol(fields, 7, "content-encoding")?,
            absolute_expiry_time: opt_timestamp(fields, 8, "absolute-expiry-time")?,
            creation_time: opt_timestamp(fields, 9, "creation-time")?,
            group_id: opt_string(fields, 10, "group-id")?,
            group_sequence: opt_u32(fields, 11, "group-sequence")?,
            reply_to_group_id: opt_string(fields, 12, "reply-to-group-id")?,
        })
    }
}
