use amqp_codec::Value;

use crate::definitions::{performative_code, DeliveryNumber};
use crate::error::CompositeError;
use crate::messaging::DeliveryState;
use crate::util::{bool_default_false, opt_u32, req_u32};

/// 2.7.6 Disposition: inform a peer of delivery state changes for one or
/// more deliveries. Carries no handle; it applies across every link on
/// the session whose deliveries fall in `[first, last]`.
///
/// `<descriptor name="amqp:disposition:list" code="0x00000000:0x00000015"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Disposition {
    /// The direction this disposition refers to: deliveries sent
    /// (`Role::Sender`) or received (`Role::Receiver`) by the issuer.
    pub role: crate::definitions::Role,
    /// Lower bound of the affected delivery-id range.
    pub first: DeliveryNumber,
    /// Upper bound of the affected delivery-id range; equal to `first`
    /// when only one delivery is referenced.
    pub last: Option<DeliveryNumber>,
    /// Whether the referenced deliveries are now settled.
    pub settled: bool,
    /// The new delivery state for the referenced deliveries.
    pub state: Option<DeliveryState>,
    /// Hints that the issuer will not re-send disposition updates for
    /// the referenced deliveries more than once.
    pub batchable: bool,
}

impl Disposition {
    /// Encode as the `disposition` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::DISPOSITION,
            vec![
                self.role.into(),
                Value::UInt(self.first),
                self.last.map(Value::UInt).unwrap_or(Value::Null),
                Value::Bool(self.settled),
                self.state.clone().map(|s| s.to_value()).unwrap_or(Value::Null),
                Value::Bool(self.batchable),
            ],
        )
    }

    /// Decode from a `disposition` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::DISPOSITION)
            .ok_or(CompositeError::WrongDescriptor { expected: "disposition" })?;
        let role = crate::definitions::Role::try_from(Value::get_composite_item(fields, 0))
            .map_err(|source| CompositeError::WrongFieldType { field: "role", source })?;
        Ok(Disposition {
            role,
            first: req_u32(fields, 1, "first")?,
            last: opt_u32(fields, 2, "last")?,
            settled: bool_default_false(fields, 3, "settled")?,
            state: match Value::get_composite_item(fields, 4) {
                Value::Null => None,
                other => Some(DeliveryState::from_value(other)?),
            },
            batchable: bool_default_false(fields, 5, "batchable")?,
        })
    }
}
