use std::time::Duration;

/// Crate-wide result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The TCP connect or the handshake write failed.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("connecting to {address} timed out after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },

    /// The peer closed the stream, or the session was already torn down.
    #[error("session closed")]
    Closed,

    /// Nothing was read for longer than the configured read timeout.
    #[error("no input from server for {0:?}")]
    ReadTimeout(Duration),

    /// A line could not be written within the write timeout.
    #[error("write to server stalled for {0:?}")]
    WriteTimeout(Duration),

    /// The server sent more than this many bytes without a line break.
    #[error("server line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures that happened before a session was live.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectTimeout { .. })
    }
}
