//! Small helpers shared by the composite (de)serialization code in
//! `performatives` and `messaging`. These exist only to keep the
//! mechanical field-by-field decoding in this crate from repeating
//! itself; they carry no protocol logic of their own.

use amqp_codec::{AccessError, Symbol, Value};

use crate::error::CompositeError;

/// Read field `idx` as an optional `u32`-shaped value (`uint`), treating
/// `Null` as absent.
pub(crate) fn opt_u32(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<u32>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        other => Ok(Some(other.as_uint().map_err(|source| CompositeError::WrongFieldType {
            field: name,
            source,
        })?)),
    }
}

/// Read field `idx` as a mandatory `u32`-shaped value.
pub(crate) fn req_u32(fields: &[Value], idx: usize, name: &'static str) -> Result<u32, CompositeError> {
    opt_u32(fields, idx, name)?.ok_or(CompositeError::MissingField(name))
}

/// Read field `idx` as an optional `u16`-shaped value (`ushort`).
pub(crate) fn opt_u16(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<u16>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        other => Ok(Some(other.as_ushort().map_err(|source| CompositeError::WrongFieldType {
            field: name,
            source,
        })?)),
    }
}

/// Read field `idx` as an optional boolean, defaulting to `false` when
/// absent (AMQP's usual default for flag fields).
pub(crate) fn bool_default_false(fields: &[Value], idx: usize, name: &'static str) -> Result<bool, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(false),
        other => Ok(other.as_bool().map_err(|source| CompositeError::WrongFieldType {
            field: name,
            source,
        })?),
    }
}

/// Read field `idx` as an optional boolean with no default.
pub(crate) fn opt_bool(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<bool>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        other => Ok(Some(other.as_bool().map_err(|source| CompositeError::WrongFieldType {
            field: name,
            source,
        })?)),
    }
}

/// Read field `idx` as an optional UTF-8 string.
pub(crate) fn opt_string(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<String>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        other => Err(CompositeError::WrongFieldType {
            field: name,
            source: AccessError::WrongType {
                expected: "string",
                found: other.type_name(),
            },
        }),
    }
}

/// Read field `idx` as an optional symbol.
pub(crate) fn opt_symbol(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<Symbol>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        Value::Symbol(s) => Ok(Some(s.clone())),
        other => Err(CompositeError::WrongFieldType {
            field: name,
            source: AccessError::WrongType {
                expected: "symbol",
                found: other.type_name(),
            },
        }),
    }
}

/// Read field `idx` as a mandatory symbol.
pub(crate) fn req_symbol(fields: &[Value], idx: usize, name: &'static str) -> Result<Symbol, CompositeError> {
    opt_symbol(fields, idx, name)?.ok_or(CompositeError::MissingField(name))
}

/// Read field `idx` as an optional list of symbols (used for locales and
/// capabilities, which are encoded either as a single symbol or as an
/// array/list of symbols).
pub(crate) fn opt_symbol_list(
    fields: &[Value],
    idx: usize,
    name: &'static str,
) -> Result<Option<Vec<Symbol>>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        Value::Symbol(s) => Ok(Some(vec![s.clone()])),
        Value::List(items) => Ok(Some(symbols_from_values(items, name)?)),
        Value::Array(array) => Ok(Some(symbols_from_values(&array.0, name)?)),
        other => Err(CompositeError::WrongFieldType {
            field: name,
            source: AccessError::WrongType {
                expected: "symbol or array of symbol",
                found: other.type_name(),
            },
        }),
    }
}

fn symbols_from_values(items: &[Value], name: &'static str) -> Result<Vec<Symbol>, CompositeError> {
    items
        .iter()
        .map(|v| match v {
            Value::Symbol(s) => Ok(s.clone()),
            other => Err(CompositeError::WrongFieldType {
                field: name,
                source: AccessError::WrongType {
                    expected: "symbol",
                    found: other.type_name(),
                },
            }),
        })
        .collect()
}

/// Encode a list of symbols back as an `Array` of symbols, or `Null` if
/// empty/absent.
pub(crate) fn symbol_list_to_value(symbols: &Option<Vec<Symbol>>) -> Value {
    match symbols {
        None => Value::Null,
        Some(list) if list.is_empty() => Value::Null,
        Some(list) => Value::Array(amqp_codec::Array(list.iter().cloned().map(Value::Symbol).collect())),
    }
}

/// Read field `idx` as an optional `i64`-shaped timestamp.
pub(crate) fn opt_timestamp(fields: &[Value], idx: usize, name: &'static str) -> Result<Option<i64>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        other => Ok(Some(other.as_timestamp().map_err(|source| CompositeError::WrongFieldType {
            field: name,
            source,
        })?)),
    }
}

/// Read field `idx` as an optional message-id (ulong/uuid/binary/string).
pub(crate) fn opt_message_id(
    fields: &[Value],
    idx: usize,
    name: &'static str,
) -> Result<Option<crate::messaging::MessageId>, CompositeError> {
    match Value::get_composite_item(fields, idx) {
        Value::Null => Ok(None),
        other => Ok(Some(crate::messaging::MessageId::try_from(other).map_err(|source| {
            CompositeError::WrongFieldType { field: name, source }
        })?)),
    }
}
