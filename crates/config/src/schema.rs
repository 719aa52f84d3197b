//! Config schema types: tunables, credentials and the channel map.

use std::{collections::BTreeMap, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

use crate::{Error, Result};

/// Environment variable holding the chat username.
pub const USERNAME_ENV: &str = "LOGS_BOT_USERNAME";

/// Environment variable holding the chat OAuth key.
pub const OAUTH_KEY_ENV: &str = "LOGS_BOT_OAUTH_KEY";

/// Root of the tunables file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub irc: IrcConfig,
    pub logs: LogsConfig,
    pub timing: TimingConfig,
}

/// Chat network connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IrcConfig {
    /// `host:port` of the plain-text chat endpoint.
    pub address: String,

    /// Payload sent back in `PONG :<server_identity>`.
    pub server_identity: String,

    /// Silence on the read side for this long counts as a lost connection.
    pub read_timeout_secs: u64,

    /// Upper bound on the TCP connect.
    pub connect_timeout_secs: u64,

    /// A single line write that takes longer than this closes the session.
    pub write_timeout_secs: u64,
}

impl IrcConfig {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            address: "irc.chat.twitch.tv:6667".into(),
            server_identity: "tmi.twitch.tv".into(),
            read_timeout_secs: 360,
            connect_timeout_secs: 10,
            write_timeout_secs: 10,
        }
    }
}

/// Match-log service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogsConfig {
    /// Service root. Search lives at `<base_url>/json_search`, permalinks at
    /// `<base_url>/<id>`.
    pub base_url: String,

    pub request_timeout_secs: u64,
}

impl LogsConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://logs.tf".into(),
            request_timeout_secs: 10,
        }
    }
}

/// Polling cadence, staleness and retry timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    /// Sleep between two queries for the same identity.
    pub poll_interval_secs: u64,

    /// Delay between accepting a result and announcing it.
    pub spoiler_delay_secs: u64,

    /// Results older than this are never announced.
    pub stale_threshold_secs: u64,

    /// Constant wait before reconnecting after a lost or failed session.
    pub reconnect_backoff_secs: u64,
}

impl TimingConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn spoiler_delay(&self) -> Duration {
        Duration::from_secs(self.spoiler_delay_secs)
    }

    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_secs)
    }

    #[must_use]
    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            spoiler_delay_secs: 15,
            stale_threshold_secs: 60,
            reconnect_backoff_secs: 30,
        }
    }
}

/// Chat login credentials.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub oauth_key: Secret<String>,
}

impl Credentials {
    /// Build credentials from optional raw values (CLI flags or env).
    ///
    /// Missing and blank values are both rejected.
    pub fn new(username: Option<String>, oauth_key: Option<String>) -> Result<Self> {
        let username = username
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(Error::MissingCredential { name: USERNAME_ENV })?;
        let oauth_key = oauth_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(Error::MissingCredential {
                name: OAUTH_KEY_ENV,
            })?;
        Ok(Self {
            username,
            oauth_key: Secret::new(oauth_key),
        })
    }

    #[must_use]
    pub fn oauth_key(&self) -> &str {
        self.oauth_key.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("oauth_key", &"[REDACTED]")
            .finish()
    }
}

/// Immutable mapping from tracked identity to chat destination.
///
/// Destinations are stored without the leading `#`. Iteration order is the
/// identity's lexical order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: BTreeMap<String, String>,
}

impl ChannelMap {
    /// Build a map from raw pairs, normalising and validating each entry.
    pub fn from_entries<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (identity, destination) in entries {
            let identity = identity.into().trim().to_string();
            let destination = normalize_destination(&destination.into());
            if identity.is_empty() {
                return Err(Error::invalid("tracked identity must not be empty"));
            }
            if destination.is_empty() {
                return Err(Error::invalid(format!(
                    "destination for identity {identity} must not be empty"
                )));
            }
            if destination.chars().any(char::is_whitespace) {
                return Err(Error::invalid(format!(
                    "destination {destination:?} for identity {identity} contains whitespace"
                )));
            }
            if map.insert(identity.clone(), destination).is_some() {
                return Err(Error::invalid(format!("duplicate identity {identity}")));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_destination(raw: &str) -> String {
    raw.trim().trim_start_matches('#').to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_matches_service_cadence() {
        let timing = TimingConfig::default();
        assert_eq!(timing.poll_interval(), Duration::from_secs(10));
        assert_eq!(timing.spoiler_delay(), Duration::from_secs(15));
        assert_eq!(timing.stale_threshold(), Duration::from_secs(60));
        assert_eq!(timing.reconnect_backoff(), Duration::from_secs(30));
    }

    #[test]
    fn credentials_reject_missing_username() {
        let err = Credentials::new(None, Some("oauth:abc".into())).unwrap_err();
        assert!(matches!(err, Error::MissingCredential { name } if name == USERNAME_ENV));
    }

    #[test]
    fn credentials_reject_blank_key() {
        let err = Credentials::new(Some("relaybot".into()), Some("  ".into())).unwrap_err();
        assert!(matches!(err, Error::MissingCredential { name } if name == OAUTH_KEY_ENV));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds =
            Credentials::new(Some("relaybot".into()), Some("oauth:hunter2".into())).unwrap();
        let dbg = format!("{creds:?}");
        assert!(dbg.contains("relaybot"));
        assert!(!dbg.contains("hunter2"));
        assert_eq!(creds.oauth_key(), "oauth:hunter2");
    }

    #[test]
    fn channel_map_strips_hash_prefix() {
        let map = ChannelMap::from_entries([("123", "#alice"), ("456", " bob ")]).unwrap();
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries, vec![("123", "alice"), ("456", "bob")]);
    }

    #[test]
    fn channel_map_rejects_empty_destination() {
        assert!(ChannelMap::from_entries([("123", "#")]).is_err());
    }

    #[test]
    fn channel_map_rejects_duplicate_after_trim() {
        assert!(ChannelMap::from_entries([("123", "alice"), (" 123", "bob")]).is_err());
    }

    #[test]
    fn channel_map_iterates_in_identity_order() {
        let map = ChannelMap::from_entries([("9", "c"), ("1", "a"), ("5", "b")]).unwrap();
        let ids: Vec<_> = map.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "5", "9"]);
    }
}
