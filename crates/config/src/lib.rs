//! Configuration loading and validation.
//!
//! Three inputs feed the relay, all read once at startup:
//! - the channel map (`channels.json`): tracked identity → chat destination
//! - chat credentials, normally taken from `LOGS_BOT_USERNAME` / `LOGS_BOT_OAUTH_KEY`
//! - optional tunables in a TOML file (`logrelay.toml`)
//!
//! Any failure here is fatal for the process.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{load_channel_map, load_settings, parse_channel_map, parse_settings},
    schema::{
        ChannelMap, Credentials, IrcConfig, LogsConfig, OAUTH_KEY_ENV, RelayConfig, TimingConfig,
        USERNAME_ENV,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate_channels, validate_settings},
};
