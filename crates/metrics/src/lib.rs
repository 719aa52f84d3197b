//! Metric names and exporter setup for logrelay.
//!
//! Library crates record through the `metrics` facade behind their own
//! `metrics` feature; the binary decides whether a recorder is installed.
//!
//! ```rust,ignore
//! use logrelay_metrics::{counter, relay};
//!
//! counter!(relay::DELIVERIES_TOTAL).increment(1);
//! ```

mod definitions;
#[cfg(feature = "prometheus")]
mod recorder;

pub use definitions::*;
#[cfg(feature = "prometheus")]
pub use recorder::init_metrics;

pub use metrics::{counter, gauge, histogram};
