//! Types defined in AMQP 1.0 Part 2.8: Definitions.

mod error_cond;
mod handle;
mod role;
mod settle_mode;

pub use error_cond::{AmqpError, ConnectionError, Error, ErrorCondition, LinkError, SessionError};
pub use handle::{
    DeliveryNumber, DeliveryTag, Fields, Handle, IetfLanguageTag, MessageFormat, Milliseconds,
    Seconds, SequenceNo, TransferNumber,
};
pub use role::Role;
pub use settle_mode::{ReceiverSettleMode, SenderSettleMode};

/// Major protocol version.
pub const MAJOR: u8 = 1;
/// Minor protocol version.
pub const MINOR: u8 = 0;
/// Protocol revision.
pub const REVISION: u8 = 0;

/// The IANA-assigned port number for plain AMQP.
pub const PORT: u16 = 5672;
/// The IANA-assigned port number for AMQP over TLS.
pub const SECURE_PORT: u16 = 5671;

/// Lower bound for the agreed maximum frame size, in bytes.
pub const MIN_MAX_FRAME_SIZE: u32 = 512;

/// Descriptor codes for the AMQP performatives (§6, §2.7).
pub mod performative_code {
    /// `open` (2.7.1)
    pub const OPEN: u64 = 0x10;
    /// `begin` (2.7.2)
    pub const BEGIN: u64 = 0x11;
    /// `attach` (2.7.3)
    pub const ATTACH: u64 = 0x12;
    /// `flow` (2.7.4)
    pub const FLOW: u64 = 0x13;
    /// `transfer` (2.7.5)
    pub const TRANSFER: u64 = 0x14;
    /// `disposition` (2.7.6)
    pub const DISPOSITION: u64 = 0x15;
    /// `detach` (2.7.7)
    pub const DETACH: u64 = 0x16;
    /// `end` (2.7.8)
    pub const END: u64 = 0x17;
    /// `close` (2.7.9)
    pub const CLOSE: u64 = 0x18;
    /// `error` (2.8.14)
    pub const ERROR: u64 = 0x1d;
}

/// Descriptor codes for the SASL frame bodies (§5.3, §5.4).
pub mod sasl_code {
    /// `sasl-mechanisms`
    pub const MECHANISMS: u64 = 0x40;
    /// `sasl-init`
    pub const INIT: u64 = 0x41;
    /// `sasl-challenge`
    pub const CHALLENGE: u64 = 0x42;
    /// `sasl-response`
    pub const RESPONSE: u64 = 0x43;
    /// `sasl-outcome`
    pub const OUTCOME: u64 = 0x44;
}
