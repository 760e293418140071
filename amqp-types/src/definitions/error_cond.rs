use amqp_codec::{Symbol, Value};

use crate::definitions::{performative_code, Fields};
use crate::error::CompositeError;

/// 2.8.15 Shared error conditions, used whenever a protocol violation is
/// not specific to connection, session, or link scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmqpError {
    /// An internal error occurred; operator intervention may be needed.
    InternalError,
    /// A peer referenced a remote entity that does not exist.
    NotFound,
    /// A peer referenced a remote entity it has no access to.
    UnauthorizedAccess,
    /// Data could not be decoded.
    DecodeError,
    /// A peer exceeded its resource allocation.
    ResourceLimitExceeded,
    /// A frame was used in a way inconsistent with the specification.
    NotAllowed,
    /// A field in a frame was invalid.
    InvalidField,
    /// A peer requested functionality its partner does not implement.
    NotImplemented,
    /// Another client is working with the referenced entity.
    ResourceLocked,
    /// A precondition failed.
    PreconditionFailed,
    /// The referenced entity has been deleted.
    ResourceDeleted,
    /// A frame was not permitted in the current state.
    IllegalState,
    /// The smallest encoding of a performative would still exceed the
    /// agreed maximum frame size.
    FrameSizeTooSmall,
}

impl AmqpError {
    fn as_str(&self) -> &'static str {
        match self {
            AmqpError::InternalError => "amqp:internal-error",
            AmqpError::NotFound => "amqp:not-found",
            AmqpError::UnauthorizedAccess => "amqp:unauthorized-access",
            AmqpError::DecodeError => "amqp:decode-error",
            AmqpError::ResourceLimitExceeded => "amqp:resource-limit-exceeded",
            AmqpError::NotAllowed => "amqp:not-allowed",
            AmqpError::InvalidField => "amqp:invalid-field",
            AmqpError::NotImplemented => "amqp:not-implemented",
            AmqpError::ResourceLocked => "amqp:resource-locked",
            AmqpError::PreconditionFailed => "amqp:precondition-failed",
            AmqpError::ResourceDeleted => "amqp:resource-deleted",
            AmqpError::IllegalState => "amqp:illegal-state",
            AmqpError::FrameSizeTooSmall => "amqp:frame-size-too-small",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "amqp:internal-error" => AmqpError::InternalError,
            "amqp:not-found" => AmqpError::NotFound,
            "amqp:unauthorized-access" => AmqpError::UnauthorizedAccess,
            "amqp:decode-error" => AmqpError::DecodeError,
            "amqp:resource-limit-exceeded" => AmqpError::ResourceLimitExceeded,
            "amqp:not-allowed" => AmqpError::NotAllowed,
            "amqp:invalid-field" => AmqpError::InvalidField,
            "amqp:not-implemented" => AmqpError::NotImplemented,
            "amqp:resource-locked" => AmqpError::ResourceLocked,
            "amqp:precondition-failed" => AmqpError::PreconditionFailed,
            "amqp:resource-deleted" => AmqpError::ResourceDeleted,
            "amqp:illegal-state" => AmqpError::IllegalState,
            "amqp:frame-size-too-small" => AmqpError::FrameSizeTooSmall,
            _ => return None,
        })
    }
}

impl std::fmt::Display for AmqpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
impl std::error::Error for AmqpError {}

/// 2.8.16 Connection error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionError {
    /// An operator forced the connection closed.
    ConnectionForced,
    /// A valid frame header could not be formed from the byte stream.
    FramingError,
    /// The container has moved and the peer should reconnect elsewhere.
    Redirect,
}

impl ConnectionError {
    fn as_str(&self) -> &'static str {
        match self {
            ConnectionError::ConnectionForced => "amqp:connection:forced",
            ConnectionError::FramingError => "amqp:connection:framing-error",
            ConnectionError::Redirect => "amqp:connection:redirect",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "amqp:connection:forced" => ConnectionError::ConnectionForced,
            "amqp:connection:framing-error" => ConnectionError::FramingError,
            "amqp:connection:redirect" => ConnectionError::Redirect,
            _ => return None,
        })
    }
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
impl std::error::Error for ConnectionError {}

/// 2.8.17 Session error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// The peer violated the incoming/outgoing window it advertised.
    WindowViolation,
    /// The peer attempted to use a link in a way that is inconsistent
    /// with its state.
    ErrantLink,
    /// The peer tried to attach a handle that is already in use.
    HandleInUse,
    /// The peer referenced a handle that has not been attached.
    UnattachedHandle,
}

impl SessionError {
    fn as_str(&self) -> &'static str {
        match self {
            SessionError::WindowViolation => "amqp:session:window-violation",
            SessionError::ErrantLink => "amqp:session:errant-link",
            SessionError::HandleInUse => "amqp:session:handle-in-use",
            SessionError::UnattachedHandle => "amqp:session:unattached-handle",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "amqp:session:window-violation" => SessionError::WindowViolation,
            "amqp:session:errant-link" => SessionError::ErrantLink,
            "amqp:session:handle-in-use" => SessionError::HandleInUse,
            "amqp:session:unattached-handle" => SessionError::UnattachedHandle,
            _ => return None,
        })
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
impl std::error::Error for SessionError {}

/// 2.8.18 Link error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// The peer forced the link closed.
    DetachForced,
    /// The peer sent more transfers than the granted link-credit allowed.
    TransferLimitExceeded,
    /// The message exceeded the link's maximum message size.
    MessageSizeExceeded,
    /// The link has moved and the peer should reattach elsewhere.
    Redirect,
    /// A second attach with the same name has taken over the link.
    Stolen,
}

impl LinkError {
    fn as_str(&self) -> &'static str {
        match self {
            LinkError::DetachForced => "amqp:link:detach-forced",
            LinkError::TransferLimitExceeded => "amqp:link:transfer-limit-exceeded",
            LinkError::MessageSizeExceeded => "amqp:link:message-size-exceeded",
            LinkError::Redirect => "amqp:link:redirect",
            LinkError::Stolen => "amqp:link:stolen",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "amqp:link:detach-forced" => LinkError::DetachForced,
            "amqp:link:transfer-limit-exceeded" => LinkError::TransferLimitExceeded,
            "amqp:link:message-size-exceeded" => LinkError::MessageSizeExceeded,
            "amqp:link:redirect" => LinkError::Redirect,
            "amqp:link:stolen" => LinkError::Stolen,
            _ => return None,
        })
    }
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
impl std::error::Error for LinkError {}

/// 2.8.14 The condition symbol carried by an `error` record: one of the
/// four well-known error namespaces, or an application-defined symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCondition {
    /// §2.8.15
    Amqp(AmqpError),
    /// §2.8.16
    Connection(ConnectionError),
    /// §2.8.17
    Session(SessionError),
    /// §2.8.18
    Link(LinkError),
    /// Any symbol outside the four well-known namespaces.
    Custom(Symbol),
}

impl ErrorCondition {
    fn symbol(&self) -> Symbol {
        let s = match self {
            ErrorCondition::Amqp(e) => e.as_str(),
            ErrorCondition::Connection(e) => e.as_str(),
            ErrorCondition::Session(e) => e.as_str(),
            ErrorCondition::Link(e) => e.as_str(),
            ErrorCondition::Custom(s) => return s.clone(),
        };
        Symbol::from_static(s)
    }

    fn from_symbol(symbol: &Symbol) -> Self {
        let s = symbol.as_str();
        if let Some(e) = AmqpError::from_str(s) {
            return ErrorCondition::Amqp(e);
        }
        if let Some(e) = ConnectionError::from_str(s) {
            return ErrorCondition::Connection(e);
        }
        if let Some(e) = SessionError::from_str(s) {
            return ErrorCondition::Session(e);
        }
        if let Some(e) = LinkError::from_str(s) {
            return ErrorCondition::Link(e);
        }
        ErrorCondition::Custom(symbol.clone())
    }
}

impl From<AmqpError> for ErrorCondition {
    fn from(e: AmqpError) -> Self {
        ErrorCondition::Amqp(e)
    }
}
impl From<ConnectionError> for ErrorCondition {
    fn from(e: ConnectionError) -> Self {
        ErrorCondition::Connection(e)
    }
}
impl From<SessionError> for ErrorCondition {
    fn from(e: SessionError) -> Self {
        ErrorCondition::Session(e)
    }
}
impl From<LinkError> for ErrorCondition {
    fn from(e: LinkError) -> Self {
        ErrorCondition::Link(e)
    }
}

/// 2.8.14 Error: the `{condition, description, info}` record carried by
/// `close`, `detach`, and `end` when a scope is closed abnormally.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// The machine-readable condition symbol.
    pub condition: ErrorCondition,
    /// An optional human-readable description.
    pub description: Option<String>,
    /// Optional condition-specific auxiliary information.
    pub info: Option<Fields>,
}

impl Error {
    /// Build an error carrying only a condition.
    pub fn new(condition: impl Into<ErrorCondition>, description: Option<String>, info: Option<Fields>) -> Self {
        Self {
            condition: condition.into(),
            description,
            info,
        }
    }

    pub(crate) fn to_value(&self) -> Value {
        Value::composite(
            performative_code::ERROR,
            vec![
                Value::Symbol(self.condition.symbol()),
                self.description
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null),
                self.info.clone().map(Value::from).unwrap_or(Value::Null),
            ],
        )
    }

    pub(crate) fn from_value(value: &Value) -> Result<Self, CompositeError> {
        let fields = value
            .as_composite_fields(performative_code::ERROR)
            .ok_or(CompositeError::WrongDescriptor { expected: "error" })?;
        let condition = match Value::get_composite_item(fields, 0) {
            Value::Symbol(s) => ErrorCondition::from_symbol(s),
            Value::Null => return Err(CompositeError::MissingField("condition")),
            other => {
                return Err(CompositeError::WrongFieldType {
                    field: "condition",
                    source: amqp_codec::AccessError::WrongType {
                        expected: "symbol",
                        found: other.type_name(),
                    },
                })
            }
        };
        let description = match Value::get_composite_item(fields, 1) {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => {
                return Err(CompositeError::WrongFieldType {
                    field: "description",
                    source: amqp_codec::AccessError::WrongType {
                        expected: "string",
                        found: other.type_name(),
                    },
                })
            }
        };
        let info = match Value::get_composite_item(fields, 2) {
            Value::Null => None,
            Value::Map(_) => Some(Fields::try_from(Value::get_composite_item(fields, 2).clone()).map_err(
                |source| CompositeError::WrongFieldType { field: "info", source },
            )?),
            other => {
                return Err(CompositeError::WrongFieldType {
                    field: "info",
                    source: amqp_codec::AccessError::WrongType {
                        expected: "map",
                        found: other.type_name(),
                    },
                })
            }
        };
        Ok(Error {
            condition,
            description,
            info,
        })
    }
}
