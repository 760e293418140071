use amqp_codec::Value;

use crate::definitions::{performative_code, DeliveryNumber, DeliveryTag, Handle, MessageFormat, ReceiverSettleMode};
use crate::error::CompositeError;
use crate::messaging::DeliveryState;
use crate::util::{bool_default_false, opt_u32};

/// 2.7.5 Transfer: transfer a message, or a fragment of one.
///
/// `<descriptor name="amqp:transfer:list" code="0x00000000:0x00000014"/>`
///
/// Per the open question this implementation resolves explicitly:
/// `delivery_id` and `delivery_tag` are mandatory on the first transfer of
/// a delivery and MUST be omitted on continuation transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    /// The link this transfer belongs to.
    pub handle: Handle,
    /// Set on the first transfer of a delivery, omitted on continuations.
    pub delivery_id: Option<DeliveryNumber>,
    /// Set on the first transfer of a delivery, omitted on continuations.
    pub delivery_tag: Option<DeliveryTag>,
    /// Set on the first transfer of a delivery, omitted on continuations.
    pub message_format: Option<MessageFormat>,
    /// Whether the delivery is already settled at the sender.
    pub settled: Option<bool>,
    /// `true` on every fragment but the last of a multi-frame delivery.
    pub more: bool,
    /// Overrides the link's negotiated receiver settlement mode for this
    /// delivery.
    pub rcv_settle_mode: Option<ReceiverSettleMode>,
    /// The delivery's state at the sender at the point this frame was
    /// sent, used when resuming a suspended link.
    pub state: Option<DeliveryState>,
    /// Reassociates this transfer with an unsettled delivery from a
    /// dissociated link. Resumption is not implemented; this field is
    /// round-tripped but never set to `true` by this implementation.
    pub resume: bool,
    /// If `true`, the payload in this frame MUST be discarded.
    pub aborted: bool,
    /// Hints that the issuer does not need prompt disposition feedback.
    pub batchable: bool,
}

impl Transfer {
    /// Encode as the `transfer` composite value (without payload; the
    /// frame codec appends payload bytes after this performative).
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::TRANSFER,
            vec![
                self.handle.into(),
                self.delivery_id.map(Value::UInt).unwrap_or(Value::Null),
                self.delivery_tag.clone().map(Value::Binary).unwrap_or(Value::Null),
                self.message_format.map(Value::UInt).unwrap_or(Value::Null),
                self.settled.map(Value::Bool).unwrap_or(Value::Null),
                Value::Bool(self.more),
                self.rcv_settle_mode.map(Value::from).unwrap_or(Value::Null),
                self.state.clone().map(|s| s.to_value()).unwrap_or(Value::Null),
                Value::Bool(self.resume),
                Value::Bool(self.aborted),
                Value::Bool(self.batchable),
            ],
        )
    }

    /// Decode from a `transfer` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::TRANSFER)
            .ok_or(CompositeError::WrongDescriptor { expected: "transfer" })?;
        let handle = crate::util::req_u32(fields, 0, "handle")?;
        Ok(Transfer {
            handle: Handle::from(handle),
            delivery_id: opt_u32(fields, 1, "delivery-id")?,
            delivery_tag: match Value::get_composite_item(fields, 2) {
                Value::Null => None,
                Value::Binary(b) => Some(b.clone()),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "delivery-tag",
                        source: amqp_codec::AccessError::WrongType {
                            expected: "binary",
                            found: other.type_name(),
                        },
                    })
                }
            },
            message_format: opt_u32(fields, 3, "message-format")?,
            settled: match Value::get_composite_item(fields, 4) {
                Value::Null => None,
                other => Some(other.as_bool().map_err(|source| CompositeError::WrongFieldType {
                    field: "settled",
                    source,
                })?),
            },
            more: bool_default_false(fields, 5, "more")?,
            rcv_settle_mode: match Value::get_composite_item(fields, 6) {
                Value::Null => None,
                other => Some(
                    ReceiverSettleMode::try_from(other)
                        .map_err(|source| CompositeError::WrongFieldType { field: "rcv-settle-mode", source })?,
                ),
            },
            state: match Value::get_composite_item(fields, 7) {
                Value::Null => None,
                other => Some(DeliveryState::from_value(other)?),
            },
            resume: bool_default_false(fields, 8, "resume")?,
            aborted: bool_default_false(fields, 9, "aborted")?,
            batchable: bool_default_false(fields, 10, "batchable")?,
        })
    }
}
