//! Semantic validation of tunables and the channel map.
//!
//! Parsing already guarantees the shape; this module reports values that parse
//! fine but cannot work (errors) or are probably a mistake (warnings).

use crate::schema::{ChannelMap, RelayConfig};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "timing.poll_interval_secs" or "channels.<identity>".
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Collected diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

/// Validate tunables.
#[must_use]
pub fn validate_settings(config: &RelayConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    let durations = [
        ("timing.poll_interval_secs", config.timing.poll_interval_secs),
        ("timing.spoiler_delay_secs", config.timing.spoiler_delay_secs),
        (
            "timing.stale_threshold_secs",
            config.timing.stale_threshold_secs,
        ),
        (
            "timing.reconnect_backoff_secs",
            config.timing.reconnect_backoff_secs,
        ),
        ("irc.read_timeout_secs", config.irc.read_timeout_secs),
        ("irc.connect_timeout_secs", config.irc.connect_timeout_secs),
        ("irc.write_timeout_secs", config.irc.write_timeout_secs),
        ("logs.request_timeout_secs", config.logs.request_timeout_secs),
    ];
    for (path, value) in durations {
        if value == 0 {
            result.push(Diagnostic::new(Severity::Error, path, "must be greater than zero"));
        }
    }

    if config.timing.stale_threshold_secs > 0
        && config.timing.stale_threshold_secs < config.timing.poll_interval_secs
    {
        result.push(Diagnostic::new(
            Severity::Warning,
            "timing.stale_threshold_secs",
            "shorter than the poll interval; some results will go stale before they are seen",
        ));
    }

    if !config.irc.address.contains(':') {
        result.push(Diagnostic::new(
            Severity::Error,
            "irc.address",
            "expected host:port",
        ));
    }

    if config.irc.server_identity.trim().is_empty() {
        result.push(Diagnostic::new(
            Severity::Error,
            "irc.server_identity",
            "must not be empty",
        ));
    }

    let base_url = &config.logs.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        result.push(Diagnostic::new(
            Severity::Error,
            "logs.base_url",
            "expected an http:// or https:// URL",
        ));
    }

    result
}

/// Report likely mistakes in the channel map. Hard errors are rejected at
/// load time already, so this only produces warnings and infos.
#[must_use]
pub fn validate_channels(channels: &ChannelMap) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (identity, destination) in channels.iter() {
        if destination.chars().any(|c| c.is_ascii_uppercase()) {
            result.push(Diagnostic::new(
                Severity::Warning,
                format!("channels.{identity}"),
                format!(
                    "destination {destination:?} has uppercase letters; chat channels are \
                     lowercase"
                ),
            ));
        }
        if !identity.chars().all(|c| c.is_ascii_digit()) {
            result.push(Diagnostic::new(
                Severity::Info,
                format!("channels.{identity}"),
                "identity is not a numeric account id",
            ));
        }
    }

    result
}
