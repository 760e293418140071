//! Errors raised while driving one link endpoint (§4.5, §7).

use amqp_types::definitions::{AmqpError, LinkError as LinkErrorCondition};

/// A fatal link-level error. The link this occurred on is detached;
/// other links on the session are unaffected.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A performative arrived in a state that does not accept it.
    #[error("link state does not accept this event")]
    IllegalState,
    /// A remote `attach` echoed a different link name than was sent.
    #[error("AMQP error: {condition:?}: {description:?}")]
    Amqp {
        /// The machine-readable error condition.
        condition: AmqpError,
        /// Human-readable detail.
        description: Option<String>,
    },
    /// A link-scoped protocol violation.
    #[error("link error: {condition:?}: {description:?}")]
    Link {
        /// The machine-readable error condition.
        condition: LinkErrorCondition,
        /// Human-readable detail.
        description: Option<String>,
    },
}

/// Returned when [`crate::link::Link::send`] cannot proceed right now.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The link has no link-credit left.
    #[error("would block: no link-credit available")]
    WouldBlock,
    /// The link is not in the `Attached` state.
    #[error("link is not attached")]
    NotAttached,
}
