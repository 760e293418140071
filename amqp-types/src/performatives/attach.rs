use amqp_codec::{Symbol, Value};

use crate::definitions::{performative_code, Fields, Handle, ReceiverSettleMode, Role, SenderSettleMode, SequenceNo};
use crate::error::CompositeError;
use crate::util::{bool_default_false, opt_string, opt_symbol_list, symbol_list_to_value};

/// 2.7.3 Attach: attach a link to a session.
///
/// `<descriptor name="amqp:attach:list" code="0x00000000:0x00000012"/>`
///
/// `source` and `target` are kept as opaque composite [`Value`]s rather
/// than parsed node descriptors: this implementation does not interpret
/// dynamic-node policy, so the node address is forwarded to the
/// application unparsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Attach {
    /// Link name, unique within session direction.
    pub name: String,
    /// Local handle for the link endpoint.
    pub handle: Handle,
    /// Whether this end is the sender or the receiver.
    pub role: Role,
    /// Sender settlement policy.
    pub snd_settle_mode: SenderSettleMode,
    /// Receiver settlement policy.
    pub rcv_settle_mode: ReceiverSettleMode,
    /// The node this link reads from (sender) or publishes into
    /// (receiver), or `None` if the link has no source.
    pub source: Option<Value>,
    /// The node this link writes to (sender) or is fed from (receiver),
    /// or `None` if the link has no target.
    pub target: Option<Value>,
    /// Unsettled delivery-tag -> delivery-state map, carried only when
    /// resuming a suspended link. Kept opaque; resumption is not
    /// implemented.
    pub unsettled: Option<Value>,
    /// Whether `unsettled` is a partial snapshot.
    pub incomplete_unsettled: bool,
    /// The sender's starting `delivery-count`; mandatory when `role` is
    /// sender.
    pub initial_delivery_count: Option<SequenceNo>,
    /// Largest message this link endpoint can handle, `0` for unbounded.
    pub max_message_size: Option<u64>,
    /// Extension capabilities the sender supports.
    pub offered_capabilities: Option<Vec<Symbol>>,
    /// Extension capabilities the sender can use if offered.
    pub desired_capabilities: Option<Vec<Symbol>>,
    /// Link properties.
    pub properties: Option<Fields>,
}

impl Attach {
    /// Encode as the `attach` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::ATTACH,
            vec![
                Value::String(self.name.clone()),
                self.handle.into(),
                self.role.into(),
                self.snd_settle_mode.into(),
                self.rcv_settle_mode.into(),
                self.source.clone().unwrap_or(Value::Null),
                self.target.clone().unwrap_or(Value::Null),
                self.unsettled.clone().unwrap_or(Value::Null),
                Value::Bool(self.incomplete_unsettled),
                self.initial_delivery_count.map(Value::UInt).unwrap_or(Value::Null),
                self.max_message_size.map(Value::ULong).unwrap_or(Value::Null),
                symbol_list_to_value(&self.offered_capabilities),
                symbol_list_to_value(&self.desired_capabilities),
                self.properties.clone().map(Value::from).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from an `attach` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::ATTACH)
            .ok_or(CompositeError::WrongDescriptor { expected: "attach" })?;
        let handle = crate::util::req_u32(fields, 1, "handle")?;
        let role = Role::try_from(Value::get_composite_item(fields, 2))
            .map_err(|source| CompositeError::WrongFieldType { field: "role", source })?;
        Ok(Attach {
            name: opt_string(fields, 0, "name")?.ok_or(CompositeError::MissingField("name"))?,
            handle: Handle::from(handle),
            role,
            snd_settle_mode: match Value::get_composite_item(fields, 3) {
                Value::Null => SenderSettleMode::default(),
                other => SenderSettleMode::try_from(other)
                    .map_err(|source| CompositeError::WrongFieldType { field: "snd-settle-mode", source })?,
            },
            rcv_settle_mode: match Value::get_composite_item(fields, 4) {
                Value::Null => ReceiverSettleMode::default(),
                other => ReceiverSettleMode::try_from(other)
                    .map_err(|source| CompositeError::WrongFieldType { field: "rcv-settle-mode", source })?,
            },
            source: none_if_null(Value::get_composite_item(fields, 5)),
            target: none_if_null(Value::get_composite_item(fields, 6)),
            unsettled: none_if_null(Value::get_composite_item(fields, 7)),
            incomplete_unsettled: bool_default_false(fields, 8, "incomplete-unsettled")?,
            initial_delivery_count: crate::util::opt_u32(fields, 9, "initial-delivery-count")?,
            max_message_size: match Value::get_composite_item(fields, 10) {
                Value::Null => None,
                other => Some(other.as_ulong().map_err(|source| CompositeError::WrongFieldType {
                    field: "max-message-size",
                    source,
                })?),
            },
            offered_capabilities: opt_symbol_list(fields, 11, "offered-capabilities")?,
            desired_capabilities: opt_symbol_list(fields, 12, "desired-capabilities")?,
            properties: match Value::get_composite_item(fields, 13) {
                Value::Null => None,
                _ => Some(
                    Fields::try_from(Value::get_composite_item(fields, 13).clone())
                        .map_err(|source| CompositeError::WrongFieldType { field: "properties", source })?,
                ),
            },
        })
    }
}

fn none_if_null(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}
