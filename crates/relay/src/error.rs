/// A line could not be written to the chat session.
///
/// Never retried: the session behind it is treated as dead.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to join #{destination}: {source}")]
    Join {
        destination: String,
        #[source]
        source: logrelay_irc::Error,
    },

    #[error("failed to announce log {log_id} to #{destination}: {source}")]
    Send {
        destination: String,
        log_id: u64,
        #[source]
        source: logrelay_irc::Error,
    },
}

impl DeliveryError {
    #[must_use]
    pub fn destination(&self) -> &str {
        match self {
            Self::Join { destination, .. } | Self::Send { destination, .. } => destination,
        }
    }
}
