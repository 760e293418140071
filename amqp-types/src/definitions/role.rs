use amqp_codec::{AccessError, Value};

/// 2.8.1 Role: which end of a link a peer is playing.
///
/// `<type name="role" class="restricted" source="boolean">`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// `false`
    Sender,
    /// `true`
    Receiver,
}

impl From<Role> for bool {
    fn from(role: Role) -> Self {
        matches!(role, Role::Receiver)
    }
}

impl From<bool> for Role {
    fn from(b: bool) -> Self {
        if b {
            Role::Receiver
        } else {
            Role::Sender
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::Bool(role.into())
    }
}

impl TryFrom<&Value> for Role {
    type Error = AccessError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Ok(Role::from(value.as_bool()?))
    }
}
