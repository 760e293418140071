//! §5.3 SASL negotiation, run before the AMQP protocol header exchange
//! on connections that require it. Mechanism selection and frame
//! sequencing live here; the actual credential material is supplied by
//! the host through a [`SaslProfile`].

use amqp_codec::Symbol;
use bytes::{BufMut, Bytes, BytesMut};

use amqp_types::performatives::{SaslChallenge, SaslCode, SaslFrameBody, SaslInit, SaslOutcome, SaslResponse};

use crate::frame::{encode_sasl_frame, FrameBody, FrameCodec, SASL_PROTOCOL_HEADER};

const ANONYMOUS: &str = "ANONYMOUS";
const PLAIN: &str = "PLAIN";

/// What the host supplies to authenticate; mirrors the two mechanisms
/// most brokers accept over a secured transport.
#[derive(Debug, Clone)]
pub enum SaslProfile {
    /// No credentials.
    Anonymous,
    /// A SASL PLAIN username/password pair, sent as one initial response.
    Plain {
        /// Authentication identity.
        username: String,
        /// Authentication secret.
        password: String,
    },
}

impl SaslProfile {
    fn mechanism(&self) -> Symbol {
        Symbol::from_static(match self {
            SaslProfile::Anonymous => ANONYMOUS,
            SaslProfile::Plain { .. } => PLAIN,
        })
    }

    fn initial_response(&self) -> Option<Bytes> {
        match self {
            SaslProfile::Anonymous => None,
            SaslProfile::Plain { username, password } => {
                let mut buf = BytesMut::with_capacity(username.len() + password.len() + 2);
                buf.put_u8(0);
                buf.put_slice(username.as_bytes());
                buf.put_u8(0);
                buf.put_slice(password.as_bytes());
                Some(buf.freeze())
            }
        }
    }

    /// Mechanism-specific response to a server challenge. Neither
    /// ANONYMOUS nor PLAIN challenge, so this is never called by the
    /// built-in profiles; kept so a custom mechanism can implement the
    /// trait object form below.
    fn response(&self, _challenge: &[u8]) -> Bytes {
        Bytes::new()
    }
}

/// Outcome of a completed SASL exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The server accepted the credentials; proceed to the AMQP header.
    Authenticated,
    /// The server rejected the exchange.
    Rejected(SaslCode),
}

/// State of the handshake driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    HeaderSent,
    InitSent,
    Done,
}

/// Errors raised while driving the SASL handshake.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A frame arrived that is not valid in the current state.
    #[error("unexpected SASL frame in current state")]
    UnexpectedFrame,
    /// The server's protocol header did not match the SASL header.
    #[error("protocol header mismatch")]
    ProtocolHeaderMismatch,
    /// The chosen profile's mechanism was not in the server's list.
    #[error("server does not support mechanism {0}")]
    MechanismNotSupported(String),
    /// A frame failed to decode.
    #[error(transparent)]
    Frame(#[from] crate::frame::FrameError),
}

/// Drives the client side of a SASL handshake: send the SASL protocol
/// header, pick a mechanism from the server's `sasl-mechanisms`, send
/// `sasl-init`, and wait for `sasl-outcome`. Runs before any AMQP bytes
/// are exchanged on the same stream.
pub struct SaslHandshake {
    profile: SaslProfile,
    hostname: Option<String>,
    state: State,
    header_seen: bool,
    codec: FrameCodec,
    outbound: BytesMut,
    outcome: Option<Outcome>,
}

impl SaslHandshake {
    /// Begin a handshake for the given profile. Call
    /// [`SaslHandshake::start`] to send the protocol header.
    pub fn new(profile: SaslProfile, hostname: Option<String>) -> Self {
        SaslHandshake {
            profile,
            hostname,
            state: State::Start,
            header_seen: false,
            codec: FrameCodec::new(u32::MAX),
            outbound: BytesMut::new(),
            outcome: None,
        }
    }

    /// Send the SASL protocol header.
    pub fn start(&mut self) {
        if self.state != State::Start {
            return;
        }
        self.outbound.extend_from_slice(&SASL_PROTOCOL_HEADER);
        self.state = State::HeaderSent;
    }

    /// The negotiated outcome, once the exchange has finished.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Whether the handshake has reached a terminal state and the host
    /// may now proceed to the AMQP protocol header.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feed bytes received from the transport.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let mut bytes = bytes;
        if !self.header_seen {
            if bytes.len() < 8 {
                return Ok(());
            }
            if bytes[..8] != SASL_PROTOCOL_HEADER {
                return Err(Error::ProtocolHeaderMismatch);
            }
            self.header_seen = true;
            bytes = &bytes[8..];
        }
        self.codec.push_bytes(bytes);
        while let Some(frame) = self.codec.try_decode_frame()? {
            let FrameBody::Sasl(body) = frame.body else {
                return Err(Error::UnexpectedFrame);
            };
            self.on_frame(body)?;
        }
        Ok(())
    }

    fn on_frame(&mut self, body: SaslFrameBody) -> Result<(), Error> {
        match body {
            SaslFrameBody::Mechanisms(mechanisms) => {
                let wanted = self.profile.mechanism();
                if !mechanisms.sasl_server_mechanisms.contains(&wanted) {
                    return Err(Error::MechanismNotSupported(wanted.as_str().to_string()));
                }
                let init = SaslInit {
                    mechanism: wanted,
                    initial_response: self.profile.initial_response(),
                    hostname: self.hostname.clone(),
                };
                self.outbound.extend_from_slice(&encode_sasl_frame(&SaslFrameBody::Init(init)));
                self.state = State::InitSent;
                Ok(())
            }
            SaslFrameBody::Challenge(SaslChallenge { challenge }) => {
                let response = SaslResponse { response: self.profile.response(&challenge) };
                self.outbound.extend_from_slice(&encode_sasl_frame(&SaslFrameBody::Response(response)));
                Ok(())
            }
            SaslFrameBody::Outcome(SaslOutcome { code, .. }) => {
                self.outcome = Some(match code {
                    SaslCode::Ok => Outcome::Authenticated,
                    other => Outcome::Rejected(other),
                });
                self.state = State::Done;
                Ok(())
            }
            SaslFrameBody::Init(_) | SaslFrameBody::Response(_) => Err(Error::UnexpectedFrame),
        }
    }

    /// Drain bytes to write to the transport.
    pub fn take_outbound(&mut self) -> BytesMut {
        std::mem::take(&mut self.outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amqp_types::performatives::SaslMechanisms;

    #[test]
    fn anonymous_round_trip() {
        let mut h = SaslHandshake::new(SaslProfile::Anonymous, None);
        h.start();
        let out = h.take_outbound();
        assert_eq!(&out[..8], &SASL_PROTOCOL_HEADER);

        let mechanisms = SaslFrameBody::Mechanisms(SaslMechanisms { sasl_server_mechanisms: vec![Symbol::from_static(ANONYMOUS)] });
        let mut frame = SASL_PROTOCOL_HEADER.to_vec();
        frame.extend_from_slice(&encode_sasl_frame(&mechanisms));
        h.on_bytes_received(&frame).unwrap();
        assert!(!h.take_outbound().is_empty());

        let outcome = SaslFrameBody::Outcome(SaslOutcome { code: SaslCode::Ok, additional_data: None });
        h.on_bytes_received(&encode_sasl_frame(&outcome)).unwrap();
        assert!(h.is_done());
        assert_eq!(h.outcome(), Some(Outcome::Authenticated));
    }
}
