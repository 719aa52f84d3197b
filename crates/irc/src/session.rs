use std::{sync::Arc, time::Duration};

use {
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader},
        sync::Mutex,
    },
    tracing::{debug, trace, warn},
};

#[cfg(feature = "metrics")]
use logrelay_metrics::{counter, session as session_metrics};

use logrelay_config::Credentials;

use crate::{
    Error, Result,
    protocol::{Line, is_keepalive},
};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Longest line accepted from the server, terminator included.
pub const MAX_LINE_BYTES: usize = 8 * 1024;

/// Where a session is in its handshake.
///
/// Connecting happens in the [`Connector`](crate::Connector) before a session
/// exists; a torn-down session shows up as [`SessionWriter::is_closed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Handshaking,
    Live,
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Payload of the keep-alive reply.
    pub server_identity: String,
    /// Treat this much silence as a dead connection. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Upper bound on writing and flushing one line.
    pub write_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            server_identity: "tmi.twitch.tv".into(),
            read_timeout: None,
            write_timeout: Duration::from_secs(10),
        }
    }
}

/// Serialized write half of a session.
///
/// Cloned into every polling loop; the lock guarantees whole lines. Once the
/// session is closed every write fails with [`Error::Closed`] and touches
/// nothing.
#[derive(Clone)]
pub struct SessionWriter {
    inner: Arc<Mutex<Option<BoxedWriter>>>,
    write_timeout: Duration,
}

impl SessionWriter {
    fn new(writer: BoxedWriter, write_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(writer))),
            write_timeout,
        }
    }

    /// Write one line and flush it.
    ///
    /// A failed or stalled write closes the session for every other writer as
    /// well. The lock is never held longer than the write timeout.
    pub async fn send(&self, line: &Line<'_>) -> Result<()> {
        let mut guard = self.inner.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(Error::Closed);
        };

        let encoded = line.encode();
        let written = tokio::time::timeout(self.write_timeout, async {
            writer.write_all(encoded.as_bytes()).await?;
            writer.flush().await
        })
        .await;

        let err = match written {
            Ok(Ok(())) => {
                trace!(command = line.command(), "line sent");
                return Ok(());
            },
            Ok(Err(e)) => Error::Io(e),
            Err(_) => Error::WriteTimeout(self.write_timeout),
        };
        warn!(command = line.command(), error = %err, "session write failed, closing");
        *guard = None;
        Err(err)
    }

    /// Stop accepting writes and shut the transport down. Idempotent.
    pub async fn close(&self) {
        let taken = self.inner.lock().await.take();
        let Some(mut writer) = taken else {
            return;
        };
        match tokio::time::timeout(self.write_timeout, writer.shutdown()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => debug!(error = %e, "transport shutdown failed"),
            Err(_) => debug!("transport shutdown timed out"),
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

/// One live connection: a line reader plus the shared writer.
pub struct Session {
    reader: BufReader<BoxedReader>,
    writer: SessionWriter,
    options: SessionOptions,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap an already-open transport. No bytes are exchanged yet.
    pub fn from_transport<R, W>(reader: R, writer: W, options: SessionOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: BufReader::new(Box::new(reader)),
            writer: SessionWriter::new(Box::new(writer), options.write_timeout),
            options,
            state: SessionState::Handshaking,
        }
    }

    /// Send the credential and identity lines.
    ///
    /// The server does not acknowledge them in a way we wait for; a rejected
    /// login only shows up later as a closed stream.
    pub async fn handshake(&mut self, credentials: &Credentials) -> Result<()> {
        self.writer
            .send(&Line::Pass(credentials.oauth_key()))
            .await?;
        self.writer.send(&Line::Nick(&credentials.username)).await?;
        self.state = SessionState::Live;
        debug!(username = %credentials.username, "handshake sent");
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle for writing to this session.
    #[must_use]
    pub fn writer(&self) -> SessionWriter {
        self.writer.clone()
    }

    /// Read until the connection fails, answering keep-alive pings.
    ///
    /// Only returns once the session is unusable; the returned error is why.
    /// The writer is closed before returning so no line can reach the old
    /// connection afterwards.
    pub async fn read_loop(mut self) -> Error {
        let err = self.read_until_error().await;
        self.writer.close().await;
        debug!(error = %err, "read loop ended");
        err
    }

    async fn read_until_error(&mut self) -> Error {
        let mut buf = Vec::with_capacity(512);
        loop {
            buf.clear();
            let read = match self.options.read_timeout {
                Some(limit) => match tokio::time::timeout(limit, self.read_line(&mut buf)).await {
                    Ok(read) => read,
                    Err(_) => return Error::ReadTimeout(limit),
                },
                None => self.read_line(&mut buf).await,
            };

            match read {
                Ok(0) => return Error::Closed,
                Ok(n) if n == MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                    return Error::LineTooLong(MAX_LINE_BYTES);
                },
                Ok(_) => {},
                Err(e) => return Error::Io(e),
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);
            trace!(line, "received");

            if is_keepalive(line) {
                #[cfg(feature = "metrics")]
                counter!(session_metrics::PINGS_TOTAL).increment(1);

                if let Err(e) = self
                    .writer
                    .send(&Line::Pong(&self.options.server_identity))
                    .await
                {
                    return e;
                }
                debug!("answered keep-alive");
            }
        }
    }

    async fn read_line(&mut self, buf: &mut Vec<u8>) -> std::io::Result<usize> {
        (&mut self.reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', buf)
            .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        tokio::io::{DuplexStream, duplex, split},
    };

    fn credentials() -> Credentials {
        Credentials::new(Some("relaybot".into()), Some("oauth:secret".into())).unwrap()
    }

    fn session_pair(options: SessionOptions) -> (Session, BufReader<DuplexStream>) {
        session_pair_with_buffer(4096, options)
    }

    fn session_pair_with_buffer(
        buffer: usize,
        options: SessionOptions,
    ) -> (Session, BufReader<DuplexStream>) {
        let (client, server) = duplex(buffer);
        let (read_half, write_half) = split(client);
        (
            Session::from_transport(read_half, write_half, options),
            BufReader::new(server),
        )
    }

    async fn next_line(server: &mut BufReader<DuplexStream>) -> String {
        let mut line = String::new();
        server.read_line(&mut line).await.unwrap();
        line
    }

    #[tokio::test]
    async fn handshake_sends_pass_then_nick() {
        let (mut session, mut server) = session_pair(SessionOptions::default());
        assert_eq!(session.state(), SessionState::Handshaking);

        session.handshake(&credentials()).await.unwrap();

        assert_eq!(next_line(&mut server).await, "PASS oauth:secret\r\n");
        assert_eq!(next_line(&mut server).await, "NICK relaybot\r\n");
        assert_eq!(session.state(), SessionState::Live);
    }

    #[tokio::test]
    async fn answers_keepalive_and_ignores_other_lines() {
        let (session, mut server) = session_pair(SessionOptions::default());
        let task = tokio::spawn(session.read_loop());

        server
            .get_mut()
            .write_all(b":tmi.twitch.tv 001 relaybot :Welcome\r\nPING :tmi.twitch.tv\r\n")
            .await
            .unwrap();
        assert_eq!(next_line(&mut server).await, "PONG :tmi.twitch.tv\r\n");

        drop(server);
        assert!(matches!(task.await.unwrap(), Error::Closed));
    }

    #[tokio::test]
    async fn pong_uses_configured_server_identity() {
        let (session, mut server) = session_pair(SessionOptions {
            server_identity: "irc.example.net".into(),
            ..SessionOptions::default()
        });
        let _task = tokio::spawn(session.read_loop());

        server.get_mut().write_all(b"PING :whatever\n").await.unwrap();
        assert_eq!(next_line(&mut server).await, "PONG :irc.example.net\r\n");
    }

    #[tokio::test]
    async fn eof_closes_writer() {
        let (session, server) = session_pair(SessionOptions::default());
        let writer = session.writer();
        drop(server);

        assert!(matches!(session.read_loop().await, Error::Closed));
        assert!(writer.is_closed().await);
        let err = writer.send(&Line::Join("alice")).await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn silence_past_read_timeout_is_an_error() {
        let (session, _server) = session_pair(SessionOptions {
            read_timeout: Some(Duration::from_secs(360)),
            ..SessionOptions::default()
        });

        let err = session.read_loop().await;
        assert!(matches!(err, Error::ReadTimeout(d) if d == Duration::from_secs(360)));
    }

    #[tokio::test]
    async fn concurrent_writers_produce_whole_lines() {
        let (session, mut server) = session_pair(SessionOptions::default());
        let writer = session.writer();

        let mut handles = Vec::new();
        for i in 0..8 {
            let writer = writer.clone();
            handles.push(tokio::spawn(async move {
                let text = format!("message-{i}");
                writer
                    .send(&Line::Privmsg {
                        destination: "alice",
                        text: &text,
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..8 {
            let line = next_line(&mut server).await;
            assert!(line.starts_with("PRIVMSG #alice :message-"), "{line:?}");
            assert!(line.ends_with("\r\n"));
            seen.push(line);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 8);
    }

    #[tokio::test]
    async fn line_without_terminator_at_limit_ends_session() {
        let (session, mut server) = session_pair(SessionOptions::default());
        let writer = session.writer();
        let flood = tokio::spawn(async move {
            server
                .get_mut()
                .write_all(&vec![b'a'; MAX_LINE_BYTES])
                .await
                .unwrap();
            server
        });

        let err = session.read_loop().await;
        assert!(matches!(err, Error::LineTooLong(MAX_LINE_BYTES)), "{err:?}");
        assert!(writer.is_closed().await);
        drop(flood.await.unwrap());
    }

    #[tokio::test]
    async fn line_at_limit_is_accepted() {
        let (session, mut server) = session_pair(SessionOptions::default());
        let task = tokio::spawn(session.read_loop());

        let mut long = vec![b'a'; MAX_LINE_BYTES - 1];
        long.push(b'\n');
        let stream = server.get_mut();
        stream.write_all(&long).await.unwrap();
        stream.write_all(b"PING :tmi.twitch.tv\r\n").await.unwrap();

        assert_eq!(next_line(&mut server).await, "PONG :tmi.twitch.tv\r\n");
        drop(server);
        assert!(matches!(task.await.unwrap(), Error::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_peer_times_out_write_and_closes_writer() {
        let (session, _server) = session_pair_with_buffer(64, SessionOptions {
            write_timeout: Duration::from_secs(5),
            ..SessionOptions::default()
        });
        let writer = session.writer();

        let text = "x".repeat(256);
        let err = writer
            .send(&Line::Privmsg {
                destination: "alice",
                text: &text,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::WriteTimeout(d) if d == Duration::from_secs(5)));
        assert!(writer.is_closed().await);
        assert!(matches!(
            writer.send(&Line::Join("alice")).await.unwrap_err(),
            Error::Closed
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_reply_to_stalled_peer_ends_read_loop() {
        let (session, mut server) = session_pair_with_buffer(16, SessionOptions {
            write_timeout: Duration::from_secs(5),
            ..SessionOptions::default()
        });
        server.get_mut().write_all(b"PING :x\n").await.unwrap();

        let err = session.read_loop().await;
        assert!(matches!(err, Error::WriteTimeout(_)), "{err:?}");
    }
}
