use async_trait::async_trait;

use crate::{Result, protocol::Line, session::SessionWriter};

/// Send side of a chat session.
///
/// Polling loops only ever talk to the network through this trait, which
/// lets tests record what would have been written.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    /// Join a destination channel. Destinations are given without `#`.
    async fn join(&self, destination: &str) -> Result<()>;

    /// Post one line of text to a destination.
    async fn send_text(&self, destination: &str, text: &str) -> Result<()>;
}

#[async_trait]
impl ChatOutbound for SessionWriter {
    async fn join(&self, destination: &str) -> Result<()> {
        self.send(&Line::Join(destination)).await
    }

    async fn send_text(&self, destination: &str, text: &str) -> Result<()> {
        self.send(&Line::Privmsg { destination, text }).await
    }
}
