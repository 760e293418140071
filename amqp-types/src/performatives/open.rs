use amqp_codec::{Symbol, Value};

use crate::definitions::{performative_code, Fields, IetfLanguageTag};
use crate::error::CompositeError;
use crate::util::{opt_string, opt_symbol_list, opt_u16, opt_u32, symbol_list_to_value};

/// 2.7.1 Open: negotiate connection parameters.
///
/// `<descriptor name="amqp:open:list" code="0x00000000:0x00000010"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    /// The id of the source container.
    pub container_id: String,
    /// The name of the target host.
    pub hostname: Option<String>,
    /// The largest frame size this peer is prepared to handle.
    pub max_frame_size: u32,
    /// The highest channel number this peer is willing to use.
    pub channel_max: u16,
    /// Idle timeout, in milliseconds.
    pub idle_time_out: Option<u32>,
    /// Locales available for outgoing text.
    pub outgoing_locales: Option<Vec<IetfLanguageTag>>,
    /// Desired locales for incoming text in decreasing preference.
    pub incoming_locales: Option<Vec<IetfLanguageTag>>,
    /// Extension capabilities the sender supports.
    pub offered_capabilities: Option<Vec<Symbol>>,
    /// Extension capabilities the sender can use if offered.
    pub desired_capabilities: Option<Vec<Symbol>>,
    /// Connection properties.
    pub properties: Option<Fields>,
}

impl Default for Open {
    fn default() -> Self {
        Open {
            container_id: String::new(),
            hostname: None,
            max_frame_size: u32::MAX,
            channel_max: u16::MAX,
            idle_time_out: None,
            outgoing_locales: None,
            incoming_locales: None,
            offered_capabilities: None,
            desired_capabilities: None,
            properties: None,
        }
    }
}

impl Open {
    /// Encode as the `open` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::OPEN,
            vec![
                Value::String(self.container_id.clone()),
                self.hostname.clone().map(Value::String).unwrap_or(Value::Null),
                Value::UInt(self.max_frame_size),
                Value::UShort(self.channel_max),
                self.idle_time_out.map(Value::UInt).unwrap_or(Value::Null),
                symbol_list_to_value(&self.outgoing_locales),
                symbol_list_to_value(&self.incoming_locales),
                symbol_list_to_value(&self.offered_capabilities),
                symbol_list_to_value(&self.desired_capabilities),
                self.properties.clone().map(Value::from).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from an `open` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::OPEN)
            .ok_or(CompositeError::WrongDescriptor { expected: "open" })?;
        Ok(Open {
            container_id: match Value::get_composite_item(fields, 0) {
                Value::String(s) => s.clone(),
                Value::Null => return Err(CompositeError::MissingField("container-id")),
                _ => return Err(CompositeError::MissingField("container-id")),
            },
            hostname: opt_string(fields, 1, "hostname")?,
            max_frame_size: opt_u32(fields, 2, "max-frame-size")?.unwrap_or(u32::MAX),
            channel_max: opt_u16(fields, 3, "channel-max")?.unwrap_or(u16::MAX),
            idle_time_out: opt_u32(fields, 4, "idle-time-out")?,
            outgoing_locales: opt_symbol_list(fields, 5, "outgoing-locales")?,
            incoming_locales: opt_symbol_list(fields, 6, "incoming-locales")?,
            offered_capabilities: opt_symbol_list(fields, 7, "offered-capabilities")?,
            desired_capabilities: opt_symbol_list(fields, 8, "desired-capabilities")?,
            properties: match Value::get_composite_item(fields, 9) {
                Value::Null => None,
                _ => Some(
                    Fields::try_from(Value::get_composite_item(fields, 9).clone())
                        .map_err(|source| CompositeError::WrongFieldType { field: "properties", source })?,
                ),
            },
        })
    }
}
