use amqp_codec::{Symbol, Value};

use crate::definitions::{performative_code, Fields};
use crate::util::{opt_symbol_list, opt_u16, opt_u32, req_u32, symbol_list_to_value};
use crate::error::CompositeError;

/// 2.7.2 Begin: begin a session on a channel.
///
/// `<descriptor name="amqp:begin:list" code="0x00000000:0x00000011"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// The channel on which the remote peer is mapping the session being
    /// begun, set only when replying to a peer-initiated `begin`.
    pub remote_channel: Option<u16>,
    /// The transfer-id of the first transfer the sender will send.
    pub next_outgoing_id: u32,
    /// The initial incoming-window.
    pub incoming_window: u32,
    /// The initial outgoing-window.
    pub outgoing_window: u32,
    /// The highest handle value this endpoint will accept.
    pub handle_max: u32,
    /// Extension capabilities the sender supports.
    pub offered_capabilities: Option<Vec<Symbol>>,
    /// Extension capabilities the sender can use if offered.
    pub desired_capabilities: Option<Vec<Symbol>>,
    /// Session properties.
    pub properties: Option<Fields>,
}

impl Begin {
    /// Encode as the `begin` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::BEGIN,
            vec![
                self.remote_channel.map(Value::UShort).unwrap_or(Value::Null),
                Value::UInt(self.next_outgoing_id),
                Value::UInt(self.incoming_window),
                Value::UInt(self.outgoing_window),
                Value::UInt(self.handle_max),
                symbol_list_to_value(&self.offered_capabilities),
                symbol_list_to_value(&self.desired_capabilities),
                self.properties.clone().map(Value::from).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from a `begin` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::BEGIN)
            .ok_or(CompositeError::WrongDescriptor { expected: "begin" })?;
        Ok(Begin {
            remote_channel: opt_u16(fields, 0, "remote-channel")?,
            next_outgoing_id: req_u32(fields, 1, "next-outgoing-id")?,
            incoming_window: req_u32(fields, 2, "incoming-window")?,
            outgoing_window: req_u32(fields, 3, "outgoing-window")?,
            handle_max: crate::util::opt_u32(fields, 4, "handle-max")?.unwrap_or(u32::MAX),
            offered_capabilities: opt_symbol_list(fields, 5, "offered-capabilities")?,
            desired_capabilities: opt_symbol_list(fields, 6, "desired-capabilities")?,
            properties: match Value::get_composite_item(fields, 7) {
                Value::Null => None,
                _ => Some(
                    Fields::try_from(Value::get_composite_item(fields, 7).clone())
                        .map_err(|source| CompositeError::WrongFieldType { field: "properties", source })?,
                ),
            },
        })
    }
}
