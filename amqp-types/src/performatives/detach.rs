use amqp_codec::Value;

use crate::definitions::{performative_code, Error, Handle};
use crate::error::CompositeError;
use crate::util::bool_default_false;

/// 2.7.7 Detach: detach the link endpoint from the session.
///
/// `<descriptor name="amqp:detach:list" code="0x00000000:0x00000016"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct Detach {
    /// The local handle of the link being detached.
    pub handle: Handle,
    /// Whether the link endpoint is being permanently closed (`true`) or
    /// merely suspended for a future resume (`false`).
    pub closed: bool,
    /// Set when the link is being detached due to an error.
    pub error: Option<Error>,
}

impl Detach {
    /// Encode as the `detach` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::DETACH,
            vec![
                self.handle.into(),
                Value::Bool(self.closed),
                self.error.as_ref().map(Error::to_value).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from a `detach` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::DETACH)
            .ok_or(CompositeError::WrongDescriptor { expected: "detach" })?;
        Ok(Detach {
            handle: Handle::from(crate::util::req_u32(fields, 0, "handle")?),
            closed: bool_default_false(fields, 1, "closed")?,
            error: match Value::get_composite_item(fields, 2) {
                Value::Null => None,
                other => Some(Error::from_value(other)?),
            },
        })
    }
}
