use {
    chrono::{DateTime, Utc},
    serde::Deserialize,
};

/// The most recent match for one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogResult {
    pub id: u64,
    pub occurred_at: DateTime<Utc>,
    pub title: String,
}

/// Envelope returned by the search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub results: u64,
    #[serde(default)]
    pub logs: Vec<SearchLog>,
}

/// One entry of `logs`. Other fields the service sends are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchLog {
    pub id: u64,
    /// Unix seconds.
    pub date: i64,
    #[serde(default)]
    pub title: String,
}
