use std::time::Duration;

use {
    async_trait::async_trait,
    tokio::net::TcpStream,
    tracing::{debug, info},
};

use logrelay_config::{Credentials, IrcConfig};

use crate::{
    Error, Result,
    session::{Session, SessionOptions},
};

/// Opens a fresh session, handshake included.
///
/// The supervisor calls this once per outer cycle; every call yields a new,
/// independent session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Session>;
}

/// Plain TCP connector for the chat network.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
    credentials: Credentials,
    options: SessionOptions,
    connect_timeout: Duration,
}

impl TcpConnector {
    #[must_use]
    pub fn new(
        address: impl Into<String>,
        credentials: Credentials,
        options: SessionOptions,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            credentials,
            options,
            connect_timeout,
        }
    }

    #[must_use]
    pub fn from_config(config: &IrcConfig, credentials: Credentials) -> Self {
        Self::new(
            config.address.clone(),
            credentials,
            SessionOptions {
                server_identity: config.server_identity.clone(),
                read_timeout: Some(config.read_timeout()),
                write_timeout: config.write_timeout(),
            },
            config.connect_timeout(),
        )
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Session> {
        debug!(address = %self.address, "opening chat connection");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| Error::ConnectTimeout {
                address: self.address.clone(),
                timeout: self.connect_timeout,
            })?
            .map_err(|source| Error::Connect {
                address: self.address.clone(),
                source,
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let (reader, writer) = stream.into_split();
        let mut session = Session::from_transport(reader, writer, self.options.clone());
        session
            .handshake(&self.credentials)
            .await
            .map_err(|e| match e {
                Error::Io(source) => Error::Connect {
                    address: self.address.clone(),
                    source,
                },
                Error::Closed => Error::Connect {
                    address: self.address.clone(),
                    source: std::io::ErrorKind::BrokenPipe.into(),
                },
                other => other,
            })?;

        info!(
            address = %self.address,
            username = %self.credentials.username,
            "chat session established"
        );
        Ok(session)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        tokio::{
            io::{AsyncBufReadExt, BufReader},
            net::TcpListener,
        },
    };

    fn credentials() -> Credentials {
        Credentials::new(Some("relaybot".into()), Some("oauth:secret".into())).unwrap()
    }

    #[tokio::test]
    async fn connects_and_sends_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(stream).lines();
            let pass = lines.next_line().await.unwrap().unwrap();
            let nick = lines.next_line().await.unwrap().unwrap();
            (pass, nick)
        });

        let connector = TcpConnector::new(
            address,
            credentials(),
            SessionOptions::default(),
            Duration::from_secs(5),
        );
        let session = connector.connect().await.unwrap();
        assert_eq!(session.state(), crate::SessionState::Live);

        let (pass, nick) = server.await.unwrap();
        assert_eq!(pass, "PASS oauth:secret");
        assert_eq!(nick, "NICK relaybot");
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let connector = TcpConnector::new(
            address,
            credentials(),
            SessionOptions::default(),
            Duration::from_secs(5),
        );
        let err = connector.connect().await.unwrap_err();
        assert!(err.is_connect(), "{err:?}");
    }

    #[test]
    fn from_config_carries_timeouts_and_identity() {
        let config = IrcConfig {
            address: "irc.example.net:6667".into(),
            server_identity: "irc.example.net".into(),
            read_timeout_secs: 120,
            connect_timeout_secs: 3,
            write_timeout_secs: 7,
        };
        let connector = TcpConnector::from_config(&config, credentials());
        assert_eq!(connector.address, "irc.example.net:6667");
        assert_eq!(connector.connect_timeout, Duration::from_secs(3));
        assert_eq!(connector.options.server_identity, "irc.example.net");
        assert_eq!(
            connector.options.read_timeout,
            Some(Duration::from_secs(120))
        );
        assert_eq!(connector.options.write_timeout, Duration::from_secs(7));
    }
}
