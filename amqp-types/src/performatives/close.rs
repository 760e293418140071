use amqp_codec::Value;

use crate::definitions::{performative_code, Error};
use crate::error::CompositeError;

/// 2.7.9 Close: signal that the connection is ending.
///
/// `<descriptor name="amqp:close:list" code="0x00000000:0x00000018"/>`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Close {
    /// Set when the connection is closing due to an error.
    pub error: Option<Error>,
}

impl Close {
    /// Encode as the `close` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::CLOSE,
            vec![self.error.as_ref().map(Error::to_value).unwrap_or(Value::Null)],
        )
    }

    /// Decode from a `close` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::CLOSE)
            .ok_or(CompositeError::WrongDescriptor { expected: "close" })?;
        Ok(Close {
            error: match Value::get_composite_item(fields, 0) {
                Value::Null => None,
                other => Some(Error::from_value(other)?),
            },
        })
    }
}
