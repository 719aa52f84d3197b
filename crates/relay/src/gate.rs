use std::{collections::HashMap, sync::Mutex, time::Duration};

use {
    chrono::{DateTime, TimeDelta, Utc},
    tracing::trace,
};

#[cfg(feature = "metrics")]
use logrelay_metrics::{counter, relay as relay_metrics};

use logrelay_logs::LogResult;

/// Outcome of one gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Announce it. The result's timestamp is now the identity's last
    /// delivered time.
    Deliver,
    /// Older than the staleness threshold.
    Stale { age: TimeDelta },
    /// Not strictly newer than what was last delivered for this identity.
    AlreadyDelivered { last_delivered_at: DateTime<Utc> },
}

impl Decision {
    #[must_use]
    pub fn is_deliver(&self) -> bool {
        matches!(self, Self::Deliver)
    }

    /// Label for logs and metrics.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Deliver => "deliver",
            Self::Stale { .. } => "stale",
            Self::AlreadyDelivered { .. } => "already_delivered",
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DeliveryState {
    last_delivered_at: Option<DateTime<Utc>>,
}

/// Decides whether a freshly queried result may be announced.
///
/// All per-identity state lives behind one lock, and the only way to touch it
/// is [`check_and_record`](Self::check_and_record), so two polls racing on the
/// same identity can never both be told to deliver.
#[derive(Debug)]
pub struct NotificationGate {
    stale_threshold: TimeDelta,
    state: Mutex<HashMap<String, DeliveryState>>,
}

impl NotificationGate {
    #[must_use]
    pub fn new(stale_threshold: Duration) -> Self {
        Self {
            stale_threshold: TimeDelta::from_std(stale_threshold).unwrap_or(TimeDelta::MAX),
            state: Mutex::new(HashMap::new()),
        }
    }

    /// `true` when `result` should be announced now. Accepting records it.
    pub fn should_deliver(&self, identity: &str, result: &LogResult) -> bool {
        self.check_and_record(identity, result.occurred_at, Utc::now())
            .is_deliver()
    }

    /// Evaluate the gate against an explicit clock.
    ///
    /// In order: a result older than the threshold is rejected whatever the
    /// state; then it must be strictly newer than the last delivered one
    /// (never delivered counts as the epoch); accepting stores `occurred_at`
    /// before the lock is released.
    pub fn check_and_record(
        &self,
        identity: &str,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Decision {
        let decision = self.evaluate(identity, occurred_at, now);
        trace!(identity, %occurred_at, reason = decision.reason(), "gate decision");

        #[cfg(feature = "metrics")]
        if !decision.is_deliver() {
            counter!(relay_metrics::GATE_REJECTIONS_TOTAL, "reason" => decision.reason())
                .increment(1);
        }

        decision
    }

    fn evaluate(
        &self,
        identity: &str,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Decision {
        let age = now.signed_duration_since(occurred_at);
        if age > self.stale_threshold {
            return Decision::Stale { age };
        }

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let entry = state.entry(identity.to_string()).or_default();
        let last = entry.last_delivered_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        if occurred_at <= last {
            return Decision::AlreadyDelivered {
                last_delivered_at: last,
            };
        }

        entry.last_delivered_at = Some(occurred_at);
        Decision::Deliver
    }

    /// Timestamp of the last accepted result for `identity`, if any.
    #[cfg(test)]
    pub(crate) fn last_delivered_at(&self, identity: &str) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(identity)
            .and_then(|s| s.last_delivered_at)
    }
}
