//! The host-supplied byte sink (§6 External Interfaces). Sockets, TLS,
//! and the event loop live outside this crate; this trait is the entire
//! surface the core needs from them.

/// A non-blocking byte sink the core writes frames to.
pub trait Transport {
    /// Write as many of `bytes` as possible without blocking. Partial
    /// writes are permitted; the core does not assume the whole slice
    /// was accepted.
    fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError>;
}

/// Failure reported by the host's [`Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The underlying transport is closed or broken; the connection
    /// must be torn down.
    #[error("transport closed")]
    Closed,
    /// Some other host-specific I/O failure.
    #[error("transport error: {0}")]
    Other(String),
}
