use amqp_codec::{Symbol, Value};

use crate::definitions::sasl_code;
use crate::error::CompositeError;
use crate::util::{opt_string, opt_symbol_list, req_symbol};

/// 5.3.3.1 sasl-mechanisms: advertise the mechanisms the server supports.
///
/// `<descriptor name="amqp:sasl-mechanisms:list" code="0x00000000:0x00000040"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct SaslMechanisms {
    /// The mechanisms the server is willing to negotiate, in no
    /// particular order.
    pub sasl_server_mechanisms: Vec<Symbol>,
}

impl SaslMechanisms {
    /// Encode as the `sasl-mechanisms` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            sasl_code::MECHANISMS,
            vec![crate::util::symbol_list_to_value(&Some(self.sasl_server_mechanisms.clone()))],
        )
    }

    /// Decode from a `sasl-mechanisms` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(sasl_code::MECHANISMS)
            .ok_or(CompositeError::WrongDescriptor { expected: "sasl-mechanisms" })?;
        Ok(SaslMechanisms {
            sasl_server_mechanisms: opt_symbol_list(fields, 0, "sasl-server-mechanisms")?.unwrap_or_default(),
        })
    }
}

/// 5.3.3.2 sasl-init: select a mechanism and send the initial response.
///
/// `<descriptor name="amqp:sasl-init:list" code="0x00000000:0x00000041"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct SaslInit {
    /// The chosen mechanism, from the server's advertised list.
    pub mechanism: Symbol,
    /// The mechanism-specific initial response, if any.
    pub initial_response: Option<bytes::Bytes>,
    /// The DNS name of the host the client is connecting to, for
    /// virtual-hosting servers.
    pub hostname: Option<String>,
}

impl SaslInit {
    /// Encode as the `sasl-init` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            sasl_code::INIT,
            vec![
                Value::Symbol(self.mechanism.clone()),
                self.initial_response.clone().map(Value::Binary).unwrap_or(Value::Null),
                self.hostname.clone().map(Value::String).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from a `sasl-init` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(sasl_code::INIT)
            .ok_or(CompositeError::WrongDescriptor { expected: "sasl-init" })?;
        Ok(SaslInit {
            mechanism: req_symbol(fields, 0, "mechanism")?,
            initial_response: match Value::get_composite_item(fields, 1) {
                Value::Null => None,
                Value::Binary(b) => Some(b.clone()),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "initial-response",
                        source: amqp_codec::AccessError::WrongType {
                            expected: "binary",
                            found: other.type_name(),
                        },
                    })
                }
            },
            hostname: opt_string(fields, 2, "hostname")?,
        })
    }
}

/// 5.3.3.3 sasl-challenge: request additional exchange data from the
/// client.
///
/// `<descriptor name="amqp:sasl-challenge:list" code="0x00000000:0x00000042"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct SaslChallenge {
    /// Mechanism-specific challenge data.
    pub challenge: bytes::Bytes,
}

impl SaslChallenge {
    /// Encode as the `sasl-challenge` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(sasl_code::CHALLENGE, vec![Value::Binary(self.challenge.clone())])
    }

    /// Decode from a `sasl-challenge` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(sasl_code::CHALLENGE)
            .ok_or(CompositeError::WrongDescriptor { expected: "sasl-challenge" })?;
        Ok(SaslChallenge {
            challenge: match Value::get_composite_item(fields, 0) {
                Value::Binary(b) => b.clone(),
                Value::Null => bytes::Bytes::new(),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "challenge",
                        source: amqp_codec::AccessError::WrongType {
                            expected: "binary",
                            found: other.type_name(),
                        },
                    })
                }
            },
        })
    }
}

/// 5.3.3.4 sasl-response: send response data to the server.
///
/// `<descriptor name="amqp:sasl-response:list" code="0x00000000:0x00000043"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct SaslResponse {
    /// Mechanism-specific response data.
    pub response: bytes::Bytes,
}

impl SaslResponse {
    /// Encode as the `sasl-response` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(sasl_code::RESPONSE, vec![Value::Binary(self.response.clone())])
    }

    /// Decode from a `sasl-response` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(sasl_code::RESPONSE)
            .ok_or(CompositeError::WrongDescriptor { expected: "sasl-response" })?;
        Ok(SaslResponse {
            response: match Value::get_composite_item(fields, 0) {
                Value::Binary(b) => b.clone(),
                Value::Null => bytes::Bytes::new(),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "response",
                        source: amqp_codec::AccessError::WrongType {
                            expected: "binary",
                            found: other.type_name(),
                        },
                    })
                }
            },
        })
    }
}

/// The outcome code of a SASL exchange (5.3.3.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslCode {
    /// Authentication succeeded.
    Ok,
    /// Authentication failed due to bad credentials.
    Auth,
    /// Authentication failed for a system reason.
    Sys,
    /// Authentication failed for a system reason that is unlikely to be
    /// corrected by a retry.
    SysPerm,
    /// Authentication failed for a transient system reason; a retry is
    /// likely to succeed.
    SysTemp,
}

impl From<SaslCode> for u8 {
    fn from(code: SaslCode) -> Self {
        match code {
            SaslCode::Ok => 0,
            SaslCode::Auth => 1,
            SaslCode::Sys => 2,
            SaslCode::SysPerm => 3,
            SaslCode::SysTemp => 4,
        }
    }
}

impl TryFrom<u8> for SaslCode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SaslCode::Ok),
            1 => Ok(SaslCode::Auth),
            2 => Ok(SaslCode::Sys),
            3 => Ok(SaslCode::SysPerm),
            4 => Ok(SaslCode::SysTemp),
            other => Err(other),
        }
    }
}

/// 5.3.3.5 sasl-outcome: signal the outcome of the SASL exchange.
///
/// `<descriptor name="amqp:sasl-outcome:list" code="0x00000000:0x00000044"/>`
#[derive(Debug, Clone, PartialEq)]
pub struct SaslOutcome {
    /// The outcome of the exchange.
    pub code: SaslCode,
    /// Additional data provided by the authentication exchange, for
    /// mechanisms that need to send data with the final outcome.
    pub additional_data: Option<bytes::Bytes>,
}

impl SaslOutcome {
    /// Encode as the `sasl-outcome` composite value.
    pub fn to_value(&self) -> Value {
        Value::composite(
            sasl_code::OUTCOME,
            vec![
                Value::UByte(self.code.into()),
                self.additional_data.clone().map(Value::Binary).unwrap_or(Value::Null),
            ],
        )
    }

    /// Decode from a `sasl-outcome` composite value.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(sasl_code::OUTCOME)
            .ok_or(CompositeError::WrongDescriptor { expected: "sasl-outcome" })?;
        let raw = Value::get_composite_item(fields, 0)
            .as_ubyte()
            .map_err(|source| CompositeError::WrongFieldType { field: "code", source })?;
        Ok(SaslOutcome {
            code: SaslCode::try_from(raw).map_err(|_| CompositeError::UnknownSymbol(raw.to_string(), "sasl-code"))?,
            additional_data: match Value::get_composite_item(fields, 1) {
                Value::Null => None,
                Value::Binary(b) => Some(b.clone()),
                other => {
                    return Err(CompositeError::WrongFieldType {
                        field: "additional-data",
                        source: amqp_codec::AccessError::WrongType {
                            expected: "binary",
                            found: other.type_name(),
                        },
                    })
                }
            },
        })
    }
}

/// The body of a type-1 (SASL) frame (§2.3, §5.3).
#[derive(Debug, Clone, PartialEq)]
pub enum SaslFrameBody {
    /// Server -> client.
    Mechanisms(SaslMechanisms),
    /// Client -> server.
    Init(SaslInit),
    /// Server -> client.
    Challenge(SaslChallenge),
    /// Client -> server.
    Response(SaslResponse),
    /// Server -> client, terminal.
    Outcome(SaslOutcome),
}

impl SaslFrameBody {
    /// Encode to its wire `Value`.
    pub fn to_value(&self) -> Value {
        match self {
            SaslFrameBody::Mechanisms(m) => m.to_value(),
            SaslFrameBody::Init(i) => i.to_value(),
            SaslFrameBody::Challenge(c) => c.to_value(),
            SaslFrameBody::Response(r) => r.to_value(),
            SaslFrameBody::Outcome(o) => o.to_value(),
        }
    }

    /// Decode from a described composite `Value`, dispatching on the
    /// descriptor code.
    pub fn from_value(value: &Value) -> Result<Self, CompositeError> {
        if value.as_composite_fields(sasl_code::MECHANISMS).is_some() {
            return Ok(SaslFrameBody::Mechanisms(SaslMechanisms::from_value(value)?));
        }
        if value.as_composite_fields(sasl_code::INIT).is_some() {
            return Ok(SaslFrameBody::Init(SaslInit::from_value(value)?));
        }
        if value.as_composite_fields(sasl_code::CHALLENGE).is_some() {
            return Ok(SaslFrameBody::Challenge(SaslChallenge::from_value(value)?));
        }
        if value.as_composite_fields(sasl_code::RESPONSE).is_some() {
            return Ok(SaslFrameBody::Response(SaslResponse::from_value(value)?));
        }
        if value.as_composite_fields(sasl_code::OUTCOME).is_some() {
            return Ok(SaslFrameBody::Outcome(SaslOutcome::from_value(value)?));
        }
        Err(CompositeError::WrongDescriptor { expected: "sasl frame body" })
    }
}
