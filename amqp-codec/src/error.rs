//! Errors raised by the value codec.

/// Errors that can occur while decoding a byte sequence into a [`crate::Value`].
///
/// None of these errors advance the caller's cursor; the input slice is left
/// untouched so the caller can retry once more bytes are available (for
/// `Truncated`) or report the malformed input (everything else).
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The leading format-code byte does not correspond to any AMQP
    /// constructor.
    #[error("unknown format code 0x{0:02x}")]
    UnknownFormatCode(u8),

    /// Fewer bytes were supplied than the declared encoding requires.
    #[error("truncated input: need {needed} bytes, have {have}")]
    Truncated {
        /// Bytes required to make progress.
        needed: usize,
        /// Bytes actually available.
        have: usize,
    },

    /// A declared size (list/map/binary/string length) disagrees with the
    /// bytes that actually follow it.
    #[error("declared size {declared} does not match available content {available}")]
    SizeMismatch {
        /// Size recorded in the wire encoding.
        declared: usize,
        /// Size that was actually present / consistent.
        available: usize,
    },

    /// A `string` constructor did not contain valid UTF-8.
    #[error("invalid UTF-8 in string/symbol encoding")]
    UtfError,

    /// A `symbol` constructor contained a non-ASCII byte.
    #[error("symbol contains a non-ASCII byte")]
    NotAscii,

    /// Format code 0x00 (described type) was not followed by a descriptor.
    #[error("described-type constructor with no following descriptor")]
    DescriptorMissing,

    /// The same key appeared twice while decoding a `map`.
    #[error("duplicate key while decoding map")]
    DuplicateMapKey,

    /// An `array` declared a count that does not match the number of
    /// elements actually decoded, or mixed element types.
    #[error("array element/count mismatch")]
    InvalidArrayElements,
}

/// Errors raised by typed constructors (e.g. building a [`crate::Symbol`]
/// from a `&str` that contains non-ASCII bytes).
#[derive(Debug, thiserror::Error)]
#[error("invalid argument: {0}")]
pub struct InvalidArgument(pub String);

/// Errors raised by typed accessors on a decoded [`crate::Value`].
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The accessor does not match the value's actual variant.
    #[error("wrong type: expected {expected}, found {found}")]
    WrongType {
        /// The type the caller asked for.
        expected: &'static str,
        /// The type that was actually stored.
        found: &'static str,
    },

    /// A narrowing accessor (e.g. `as_u8` on a stored `uint`) could not
    /// represent the stored value.
    #[error("value does not fit in the requested width")]
    Overflow,
}
