use amqp_codec::Value;

use crate::error::CompositeError;
use crate::messaging::{
    ApplicationProperties, Body, DeliveryAnnotations, Footer, Header, MessageAnnotations, Properties,
};

/// 3.2 Message Format: the bare message together with the section
/// wrappers an implementation is allowed to add. Sections not present
/// encode to nothing; the wire form is the concatenation of whichever
/// of `header`, `delivery_annotations`, `message_annotations`,
/// `properties`, `application_properties`, the body sections, and
/// `footer` are `Some`/non-empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    /// Transport headers (3.2.1).
    pub header: Option<Header>,
    /// Delivery-specific annotations (3.2.2), stripped by the first
    /// receiving intermediary.
    pub delivery_annotations: Option<DeliveryAnnotations>,
    /// Annotations meant to travel with the message end to end (3.2.3).
    pub message_annotations: Option<MessageAnnotations>,
    /// Immutable, standard message properties (3.2.4).
    pub properties: Option<Properties>,
    /// Application-defined structured properties (3.2.5).
    pub application_properties: Option<ApplicationProperties>,
    /// The message body (3.2.6-3.2.8).
    pub body: Body,
    /// Transport footers, set once the message is fully formed (3.2.9).
    pub footer: Option<Footer>,
}

impl Default for Body {
    fn default() -> Self {
        Body::Empty
    }
}

impl Message {
    /// Build a message carrying a single opaque binary body and nothing
    /// else.
    pub fn from_data(data: impl Into<bytes::Bytes>) -> Self {
        Message { body: Body::Data(crate::messaging::Data(data.into())), ..Default::default() }
    }

    /// Build a message carrying a single `amqp-value` body section.
    pub fn from_value(value: Value) -> Self {
        Message { body: Body::Value(crate::messaging::AmqpValue(value)), ..Default::default() }
    }

    /// Encode the section list in wire order, omitting absent sections.
    pub fn to_values(&self) -> Vec<Value> {
        let mut out = Vec::new();
        if let Some(h) = &self.header {
            out.push(h.to_value());
        }
        if let Some(da) = &self.delivery_annotations {
            out.push(da.to_value());
        }
        if let Some(ma) = &self.message_annotations {
            out.push(ma.to_value());
        }
        if let Some(p) = &self.properties {
            out.push(p.to_value());
        }
        if let Some(ap) = &self.application_properties {
            out.push(ap.to_value());
        }
        out.extend(self.body.to_values());
        if let Some(f) = &self.footer {
            out.push(f.to_value());
        }
        out
    }

    /// Decode a message from its concatenated section values, matching
    /// each by its descriptor code rather than by fixed position (a
    /// message need not carry every optional section).
    pub fn from_values(values: &[Value]) -> Result<Self, CompositeError> {
        let mut message = Message::default();
        let mut body_start = None;
        for (idx, value) in values.iter().enumerate() {
            if let Some(h) = try_section(value, Header::from_value) {
                message.header = Some(h?);
            } else if let Some(da) = try_section(value, DeliveryAnnotations::from_value) {
                message.delivery_annotations = Some(da?);
            } else if let Some(ma) = try_section(value, MessageAnnotations::from_value) {
                message.message_annotations = Some(ma?);
            } else if let Some(p) = try_section(value, Properties::from_value) {
                message.properties = Some(p?);
            } else if let Some(ap) = try_section(value, ApplicationProperties::from_value) {
                message.application_properties = Some(ap?);
            } else if let Some(f) = try_section(value, Footer::from_value) {
                message.footer = Some(f?);
            } else {
                body_start.get_or_insert(idx);
            }
        }
        message.body = match body_start {
            Some(start) => Body::from_values(&values[start..values.len() - message.footer.is_some() as usize])?,
            None => Body::Empty,
        };
        Ok(message)
    }
}

fn try_section<T>(
    value: &Value,
    parse: impl FnOnce(&Value) -> Result<T, CompositeError>,
) -> Option<Result<T, CompositeError>> {
    match parse(value) {
        Ok(parsed) => Some(Ok(parsed)),
        Err(CompositeError::WrongDescriptor { .. }) => None,
        Err(other) => Some(Err(other)),
    }
}
