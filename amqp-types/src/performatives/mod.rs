//! AMQP 1.0 Part 2.7: the composite types carried as frame bodies.

mod attach;
mod begin;
mod close;
mod detach;
mod disposition;
mod end;
mod flow;
mod open;
mod sasl;
mod transfer;

pub use attach::Attach;
pub use begin::Begin;
pub use close::Close;
pub use detach::Detach;
pub use disposition::Disposition;
pub use end::End;
pub use flow::Flow;
pub use open::Open;
pub use sasl::{SaslChallenge, SaslCode, SaslFrameBody, SaslInit, SaslMechanisms, SaslOutcome, SaslResponse};
pub use transfer::Transfer;

use amqp_codec::Value;

use crate::definitions::performative_code;
use crate::error::CompositeError;

/// The body of a type-0 (AMQP) frame: one of the nine performatives
/// (§2.3, §2.7). The frame codec decodes this much of a frame; `transfer`
/// is the only performative for which trailing payload bytes follow.
#[derive(Debug, Clone, PartialEq)]
pub enum Performative {
    /// 2.7.1
    Open(Open),
    /// 2.7.2
    Begin(Begin),
    /// 2.7.3
    Attach(Attach),
    /// 2.7.4
    Flow(Flow),
    /// 2.7.5
    Transfer(Transfer),
    /// 2.7.6
    Disposition(Disposition),
    /// 2.7.7
    Detach(Detach),
    /// 2.7.8
    End(End),
    /// 2.7.9
    Close(Close),
}

impl Performative {
    /// Encode to its wire `Value`.
    pub fn to_value(&self) -> Value {
        match self {
            Performative::Open(p) => p.to_value(),
            Performative::Begin(p) => p.to_value(),
            Performative::Attach(p) => p.to_value(),
            Performative::Flow(p) => p.to_value(),
            Performative::Transfer(p) => p.to_value(),
            Performative::Disposition(p) => p.to_value(),
            Performative::Detach(p) => p.to_value(),
            Performative::End(p) => p.to_value(),
            Performative::Close(p) => p.to_value(),
        }
    }

    /// Decode from a described composite `Value`, dispatching on the
    /// descriptor code.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        if value.as_composite_fields(performative_code::OPEN).is_some() {
            return Ok(Performative::Open(Open::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::BEGIN).is_some() {
            return Ok(Performative::Begin(Begin::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::ATTACH).is_some() {
            return Ok(Performative::Attach(Attach::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::FLOW).is_some() {
            return Ok(Performative::Flow(Flow::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::TRANSFER).is_some() {
            return Ok(Performative::Transfer(Transfer::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::DISPOSITION).is_some() {
            return Ok(Performative::Disposition(Disposition::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::DETACH).is_some() {
            return Ok(Performative::Detach(Detach::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::END).is_some() {
            return Ok(Performative::End(End::from_value(value)?));
        }
        if value.as_composite_fields(performative_code::CLOSE).is_some() {
            return Ok(Performative::Close(Close::from_value(value)?));
        }
        Err(CompositeError::WrongDescriptor { expected: "amqp performative" })
    }
}
