use amqp_codec::Value;

use crate::definitions::Fields;
use crate::error::CompositeError;

mod code {
    pub const DELIVERY_ANNOTATIONS: u64 = 0x71;
    pub const MESSAGE_ANNOTATIONS: u64 = 0x72;
    pub const FOOTER: u64 = 0x78;
}

/// 3.2.10 Annotations: a symbol-keyed map, used by delivery annotations,
/// message annotations, and the footer.
pub type Annotations = Fields;

/// 3.2.2 Delivery Annotations: annotations added by an intermediary for
/// its own or a downstream node's use; not part of the bare message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeliveryAnnotations(pub Annotations);

impl DeliveryAnnotations {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::DELIVERY_ANNOTATIONS, vec![Value::from(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::DELIVERY_ANNOTATIONS)
            .ok_or(CompositeError::WrongDescriptor { expected: "delivery-annotations" })?;
        Ok(DeliveryAnnotations(map_field(fields, "delivery-annotations")?))
    }
}

/// 3.2.3 Message Annotations: annotations for the message as a whole,
/// which travel with it end to end.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageAnnotations(pub Annotations);

impl MessageAnnotations {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::MESSAGE_ANNOTATIONS, vec![Value::from(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(code::MESSAGE_ANNOTATIONS)
            .ok_or(CompositeError::WrongDescriptor { expected: "message-annotations" })?;
        Ok(MessageAnnotations(map_field(fields, "message-annotations")?))
    }
}

/// 3.2.9 Footer: transport footers for a message.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Footer(pub Annotations);

impl Footer {
    pub(crate) fn to_value(&self) -> Value {
        Value::composite(code::FOOTER, vec![Value::from(self.0.clone())])
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields =
            value.as_composite_fields(code::FOOTER).ok_or(CompositeError::WrongDescriptor { expected: "footer" })?;
        Ok(Footer(map_field(fields, "footer")?))
    }
}

fn map_field(fields: &[Value], name: &'static str) -> Result<Fields, CompositeError> {
    match Value::get_composite_item(fields, 0) {
        Value::Null => Ok(Fields::new()),
        other => Fields::try_from(other.clone()).map_err(|source| CompositeError::WrongFieldType { field: name, source }),
    }
}
