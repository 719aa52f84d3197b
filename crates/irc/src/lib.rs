//! Plain-text chat session.
//!
//! Implements just enough of the line protocol to log in, answer keep-alive
//! pings, join channels and post messages. Everything else the server sends
//! is read and dropped.

pub mod connector;
pub mod error;
pub mod outbound;
pub mod protocol;
pub mod session;

pub use {
    connector::{Connector, TcpConnector},
    error::{Error, Result},
    outbound::ChatOutbound,
    protocol::Line,
    session::{Session, SessionOptions, SessionState, SessionWriter},
};
