//! Newtypes for AMQP primitives that carry extra invariants beyond their
//! native Rust representation.

use crate::error::InvalidArgument;

/// An ASCII string, interned by convention on the wire (constructor-level
/// symbols are not actually deduplicated by this codec; "interned" here
/// just means the type carries the ASCII invariant).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(String);

impl Symbol {
    /// Build a `Symbol`, rejecting any non-ASCII byte.
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidArgument> {
        let value = value.into();
        if !value.is_ascii() {
            return Err(InvalidArgument(format!(
                "symbol {value:?} contains a non-ASCII byte"
            )));
        }
        Ok(Self(value))
    }

    /// Construct a `Symbol` from a `&'static str` known to be ASCII at
    /// compile time, for performative/well-known-type names.
    pub fn from_static(value: &'static str) -> Self {
        debug_assert!(value.is_ascii(), "static symbol must be ASCII: {value}");
        Self(value.to_string())
    }

    /// Borrow the underlying string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner `String`.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Symbol {
    type Error = InvalidArgument;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = InvalidArgument;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Symbol::new(value)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
