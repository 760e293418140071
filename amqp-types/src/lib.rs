//! Typed AMQP 1.0 performatives, definitions, and message sections
//! (Parts 2.7, 2.8, 3) built on top of the wire-level `amqp-codec`
//! crate's self-describing `Value` type.
//!
//! Every composite type here provides `to_value`/`from_value` pair that
//! converts to and from the codec's untyped `Value`; the surrounding
//! `amqp-proto` crate is the only place these get fed to or read from
//! the actual byte stream.

#![warn(missing_docs)]

pub mod definitions;
pub mod error;
pub mod messaging;
pub mod performatives;
mod util;

pub use error::CompositeError;
