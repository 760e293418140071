//! Errors raised while driving the connection state machine (§4.3, §7).

use amqp_types::definitions::Error as AmqpError;

use super::State;

/// A fatal connection-level error. Every variant ends the connection; the
/// caller should treat the `Connection` as unusable afterwards and rely
/// on the `on_connection_state` callback having already fired.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The byte transport reported a failure.
    #[error(transparent)]
    Transport(#[from] crate::transport::TransportError),
    /// A frame could not be decoded off the wire.
    #[error(transparent)]
    Frame(#[from] crate::frame::FrameError),
    /// A performative or raw byte arrived in a state that does not
    /// accept it.
    #[error("connection state {0:?} does not accept this event")]
    IllegalState(State),
    /// The remote's 8-byte protocol header did not match ours.
    #[error("protocol header mismatch")]
    ProtocolHeaderMismatch,
    /// The remote idle timeout elapsed with nothing received.
    #[error("idle timeout elapsed")]
    IdleTimeout,
    /// A frame referenced a channel with no mapped session.
    #[error("frame on unknown channel {0}")]
    UnknownChannel(u16),
    /// `create_session` was called with every local channel already in
    /// use.
    #[error("local channel-max reached")]
    ChannelMaxReached,
    /// The remote sent `close`, optionally carrying an error record.
    #[error("remote closed connection{}", .0.as_ref().map(|e| format!(": {e:?}")).unwrap_or_default())]
    RemoteClosed(Option<AmqpError>),
}

/// Returned by API calls that may be refused without being fatal to the
/// connection (§7 resource-exhaustion class).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// A fatal connection error occurred while attempting to send.
    #[error(transparent)]
    Fatal(#[from] Error),
    /// The outbound buffer is at capacity; retry after it drains.
    #[error("would block: outbound buffer is full")]
    WouldBlock,
}
