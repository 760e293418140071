#![deny(missing_docs)]

//! A sans-io implementation of the AMQP 1.0 connection/session/link
//! state machines: frame codec, credit-flow accounting, and
//! fragmentation/reassembly, with no bundled transport or runtime.
//!
//! The host owns the socket and the event loop. It feeds bytes in with
//! [`Connection::on_bytes_received`], calls [`Connection::on_tick`] on a
//! timer, and after each call drains [`Connection::take_outbound`] (or
//! [`Connection::flush`] against a [`Transport`](transport::Transport))
//! to write whatever the core produced.
//!
//! ```no_run
//! use amqp_proto::connection::{Connection, OpenOptions};
//! use amqp_proto::session::BeginOptions;
//!
//! let mut conn = Connection::new(OpenOptions { container_id: "example".into(), ..Default::default() });
//! conn.open();
//! let session = conn.create_session(BeginOptions::default()).unwrap();
//! # let _ = session;
//! ```

pub mod connection;
pub mod frame;
pub mod link;
pub mod sasl;
pub mod serial;
pub mod session;
pub mod transport;

pub use connection::Connection;
pub use session::Session;
