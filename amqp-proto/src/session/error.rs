//! Errors raised while driving one session (§4.4, §7).

use amqp_types::definitions::SessionError as SessionErrorCondition;

/// A fatal session-level error. The session this occurred on is ended;
/// other sessions on the connection are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A performative arrived in a state that does not accept it.
    #[error("session state does not accept this event")]
    IllegalState,
    /// A non-`attach` frame referenced a handle with no attached link.
    #[error("unattached handle")]
    UnattachedHandle,
    /// An `attach` was received reusing a handle already in use.
    #[error("handle already in use")]
    HandleInUse,
    /// A protocol-level session violation (window/handle accounting).
    #[error("session error: {0:?}")]
    Session(SessionErrorCondition),
}

/// Returned when [`crate::session::Session::send`] cannot proceed
/// right now without violating flow control.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The link has no link-credit, or the session has no
    /// `remote_incoming_window` left.
    #[error("would block: no credit or window available")]
    WouldBlock,
    /// The referenced link is unknown or not attached.
    #[error(transparent)]
    Link(#[from] crate::link::Error),
}
