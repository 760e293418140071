//! Part 3.4 Delivery State: the terminal and non-terminal states a
//! delivery can be reported in via `transfer.state` or `disposition.state`.

use amqp_codec::Value;

use crate::definitions::Error;
use crate::definitions::Fields;
use crate::error::CompositeError;
use crate::util::{opt_bool, req_u32};

mod code {
    pub const RECEIVED: u64 = 0x23;
    pub const ACCEPTED: u64 = 0x24;
    pub const REJECTED: u64 = 0x25;
    pub const RELEASED: u64 = 0x26;
    pub const MODIFIED: u64 = 0x27;
}

/// 3.4.1 Received: reports how much of a delivery has arrived, used only
/// when resuming a suspended link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    /// Index of the first section not yet fully received.
    pub section_number: u32,
    /// Byte offset within that section.
    pub section_offset: u64,
}

/// 3.4.3 Rejected: the receiver could not process the delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejected {
    /// The reason the delivery was rejected.
    pub error: Option<Error>,
}

/// 3.4.5 Modified: the delivery is being returned with possible
/// annotation changes and should not simply be redelivered unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct Modified {
    /// The work that produced the delivery cannot be completed.
    pub delivery_failed: Option<bool>,
    /// This receiver cannot accept the delivery; another might.
    pub undeliverable_here: Option<bool>,
    /// Annotations to merge into the delivery's `message-annotations`
    /// before it is redelivered.
    pub message_annotations: Option<Fields>,
}

/// 3.4 Delivery state: the state of a delivery at one end of a link.
#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryState {
    /// 3.4.1, non-terminal.
    Received(Received),
    /// 3.4.2 Accepted, terminal.
    Accepted,
    /// 3.4.3 Rejected, terminal.
    Rejected(Rejected),
    /// 3.4.4 Released, terminal.
    Released,
    /// 3.4.5 Modified, terminal.
    Modified(Modified),
}

impl DeliveryState {
    /// Whether the state is terminal (no further disposition is
    /// possible for the delivery).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DeliveryState::Received(_))
    }

    pub(crate) fn to_value(&self) -> Value {
        match self {
            DeliveryState::Received(r) => Value::composite(
                code::RECEIVED,
                vec![Value::UInt(r.section_number), Value::ULong(r.section_offset)],
            ),
            DeliveryState::Accepted => Value::composite(code::ACCEPTED, vec![]),
            DeliveryState::Rejected(r) => {
                Value::composite(code::REJECTED, vec![r.error.as_ref().map(Error::to_value).unwrap_or(Value::Null)])
            }
            DeliveryState::Released => Value::composite(code::RELEASED, vec![]),
            DeliveryState::Modified(m) => Value::composite(
                code::MODIFIED,
                vec![
                    m.delivery_failed.map(Value::Bool).unwrap_or(Value::Null),
                    m.undeliverable_here.map(Value::Bool).unwrap_or(Value::Null),
                    m.message_annotations.clone().map(Value::from).unwrap_or(Value::Null),
                ],
            ),
        }
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        if let Some(fields) = value.as_composite_fields(code::RECEIVED) {
            return Ok(DeliveryState::Received(Received {
                section_number: req_u32(fields, 0, "section-number")?,
                section_offset: Value::get_composite_item(fields, 1)
                    .as_ulong()
                    .map_err(|source| CompositeError::WrongFieldType { field: "section-offset", source })?,
            }));
        }
        if value.as_composite_fields(code::ACCEPTED).is_some() {
            return Ok(DeliveryState::Accepted);
        }
        if let Some(fields) = value.as_composite_fields(code::REJECTED) {
            return Ok(DeliveryState::Rejected(Rejected {
                error: match Value::get_composite_item(fields, 0) {
                    Value::Null => None,
                    other => Some(Error::from_value(other)?),
                },
            }));
        }
        if value.as_composite_fields(code::RELEASED).is_some() {
            return Ok(DeliveryState::Released);
        }
        if let Some(fields) = value.as_composite_fields(code::MODIFIED) {
            return Ok(DeliveryState::Modified(Modified {
                delivery_failed: opt_bool(fields, 0, "delivery-failed")?,
                undeliverable_here: opt_bool(fields, 1, "undeliverable-here")?,
                message_annotations: match Value::get_composite_item(fields, 2) {
                    Value::Null => None,
                    _ => Some(
                        Fields::try_from(Value::get_composite_item(fields, 2).clone()).map_err(|source| {
                            CompositeError::WrongFieldType { field: "message-annotations", source }
                        })?,
                    ),
                },
            }));
        }
        Err(CompositeError::WrongDescriptor { expected: "delivery-state" })
    }
}

/// 3.4 The subset of delivery states that are also valid outcomes
/// (terminal states a `disposition` settles a delivery with).
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 3.4.2
    Accepted,
    /// 3.4.3
    Rejected(Rejected),
    /// 3.4.4
    Released,
    /// 3.4.5
    Modified(Modified),
}

impl From<Outcome> for DeliveryState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted => DeliveryState::Accepted,
            Outcome::Rejected(r) => DeliveryState::Rejected(r),
            Outcome::Released => DeliveryState::Released,
            Outcome::Modified(m) => DeliveryState::Modified(m),
        }
    }
}

impl TryFrom<DeliveryState> for Outcome {
    type Error = DeliveryState;

    fn try_from(state: DeliveryState) -> Result<Self, Self::Error> {
        match state {
            DeliveryState::Accepted => Ok(Outcome::Accepted),
            DeliveryState::Rejected(r) => Ok(Outcome::Rejected(r)),
            DeliveryState::Released => Ok(Outcome::Released),
            DeliveryState::Modified(m) => Ok(Outcome::Modified(m)),
            other => Err(other),
        }
    }
}
