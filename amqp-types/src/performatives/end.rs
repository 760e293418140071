use amqp_codec::Value;

use crate::definitions::{performative_code, Error};
use crate::error::CompositeError;

/// 2.7.8 End: end a session.
///
/// `<descriptor name="amqp:end:list" code="0x00000000:0x00000017"/>`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct End {
    /// Set when the session is ending due to an error.
    pub error: Option<Error>,
}

impl End {
    /// Encode as the `end` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            performative_code::END,
            vec![self.error.as_ref().map(Error::to_value).unwrap_or(Value::Null)],
        )
    }

    /// Decode from an `end` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::END)
            .ok_or(CompositeError::WrongDescriptor { expected: "end" })?;
        Ok(End {
            error: match Value::get_composite_item(fields, 0) {
                Value::Null => None,
                other => Some(Error::from_value(other)?),
            },
        })
    }
}
