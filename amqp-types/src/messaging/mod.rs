//! AMQP 1.0 Part 3.2-3.4: the message format and its section types, and
//! the delivery-state/outcome types exchanged via `transfer` and
//! `disposition`.

mod annotations;
mod body;
mod delivery_state;
mod header;
mod message;
mod message_id;
mod properties;

pub use annotations::{Annotations, DeliveryAnnotations, Footer, MessageAnnotations};
pub use body::{AmqpSequence, AmqpValue, ApplicationProperties, Body, Data};
pub use delivery_state::{DeliveryState, Modified, Outcome, Received, Rejected};
pub use header::{Builder as HeaderBuilder, Header};
pub use message::Message;
pub use message_id::{Address, MessageId};
pub use properties::Properties;
