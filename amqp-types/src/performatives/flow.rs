use amqp_codec::Value;

use crate::definitions::{performative_code, Fields, Handle, SequenceNo};
use crate::error::CompositeError;
use crate::util::{bool_default_false, opt_u32, req_u32};

/// 2.7.4 Flow: update session and link flow-control state.
///
/// `<descriptor name="amqp:flow:list" code="0x00000000:0x00000013"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Flow {
    /// Identifies the expected value for `next-incoming-id` at the
    /// sender, unset until the sender has received a `begin`.
    pub next_incoming_id: Option<SequenceNo>,
    /// Defines the maximum number of incoming transfers the sender can
    /// currently receive.
    pub incoming_window: u32,
    /// The transfer-id of the next transfer this session will send.
    pub next_outgoing_id: SequenceNo,
    /// Defines the maximum number of outgoing transfers the sender can
    /// currently send.
    pub outgoing_window: u32,
    /// The local handle of the link this flow pertains to, or `None` for
    /// a session-only flow.
    pub handle: Option<Handle>,
    /// The sender's current `delivery-count`, required whenever `handle`
    /// is set and role is sender.
    pub delivery_count: Option<SequenceNo>,
    /// The amount of link-credit granted to the sender, required
    /// whenever `handle` is set.
    pub link_credit: Option<u32>,
    /// The sender's estimate of pending messages for this link.
    pub available: Option<u32>,
    /// Whether the sender is requested (receiver sets this) or confirms
    /// (sender echoes this) that it is draining the granted credit.
    pub drain: bool,
    /// Indicates the flow was provoked by an echo request.
    pub echo: bool,
    /// Flow-state properties.
    pub properties: Option<Fields>,
}

impl Default for Flow {
    fn default() -> Self {
        Flow {
            next_incoming_id: None,
            incoming_window: 0,
            next_outgoing_id: 0,
            outgoing_window: 0,
            handle: None,
            delivery_count: None,
            link_credit: None,
            available: None,
            drain: false,
            echo: false,
            properties: None,
        }
    }
}

impl Flow {
    /// Encode as the `flow` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::FLOW,
            vec![
                self.next_incoming_id.map(Value::UInt).unwrap_or(Value::Null),
                Value::UInt(self.incoming_window),
                Value::UInt(self.next_outgoing_id),
                Value::UInt(self.outgoing_window),
                self.handle.map(Value::from).unwrap_or(Value::Null),
                self.delivery_count.map(Value::UInt).unwrap_or(Value::Null),
                self.link_credit.map(Value::UInt).unwrap_or(Value::Null),
                self.available.map(Value::UInt).unwrap_or(Value::Null),
                Value::Bool(self.drain),
                Value::Bool(self.echo),
                self.properties.clone().map(Value::from).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from a `flow` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::FLOW)
            .ok_or(CompositeError::WrongDescriptor { expected: "flow" })?;
        Ok(Flow {
            next_incoming_id: opt_u32(fields, 0, "next-incoming-id")?,
            incoming_window: req_u32(fields, 1, "incoming-window")?,
            next_outgoing_id: req_u32(fields, 2, "next-outgoing-id")?,
            outgoing_window: req_u32(fields, 3, "outgoing-window")?,
            handle: opt_u32(fields, 4, "handle")?.map(Handle::from),
            delivery_count: opt_u32(fields, 5, "delivery-count")?,
            link_credit: opt_u32(fields, 6, "link-credit")?,
            available: opt_u32(fields, 7, "available")?,
            drain: bool_default_false(fields, 8, "drain")?,
            echo: bool_default_false(fields, 9, "echo")?,
            properties: match Value::get_composite_item(fields, 10) {
                Value::Null => None,
                _ => Some(
                    Fields::try_from(Value::get_composite_item(fields, 10).clone())
                        .map_err(|source| CompositeError::WrongFieldType { field: "properties", source })?,
                ),
            },
        })
    }
}
