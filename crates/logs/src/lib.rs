//! Client for the match-log search service.
//!
//! One lookup per call: the most recent log for a single player, parsed into
//! a [`LogResult`] or a typed [`Error`]. No retries here; the caller polls
//! again on its own schedule.

pub mod client;
pub mod error;
pub mod types;

pub use {
    client::{LogSource, LogsClient, permalink},
    error::{Error, Result},
    types::LogResult,
};
