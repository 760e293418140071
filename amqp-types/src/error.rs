//! Errors raised while interpreting a decoded [`amqp_codec::Value`] as a
//! performative or messaging type.

use amqp_codec::{AccessError, DecodeError};

/// A value failed to decode into one of the composite types defined in
/// this crate.
#[derive(Debug, thiserror::Error)]
pub enum CompositeError {
    /// The value was not a described list, or its descriptor did not
    /// match the type being decoded.
    #[error("value is not a {expected} composite")]
    WrongDescriptor {
        /// The composite name the caller expected.
        expected: &'static str,
    },

    /// A mandatory field was null or absent.
    #[error("missing mandatory field {0}")]
    MissingField(&'static str),

    /// A field's stored variant does not match what the composite
    /// requires.
    #[error("field {field}: {source}")]
    WrongFieldType {
        /// The composite field name.
        field: &'static str,
        /// The underlying type mismatch.
        #[source]
        source: AccessError,
    },

    /// The field bytes themselves could not be decoded off the wire.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A symbol field did not match any known enumerator.
    #[error("unrecognized symbol {0:?} for {1}")]
    UnknownSymbol(String, &'static str),
}
