use std::{sync::Arc, time::Duration};

use {
    chrono::Utc,
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use logrelay_metrics::{gauge, relay as relay_metrics};

use {
    logrelay_irc::ChatOutbound,
    logrelay_logs::{Error as QueryError, LogSource},
};

use crate::{DeliveryError, DeliveryPipeline, Decision, NotificationGate};

/// What one poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Delivered { log_id: u64 },
    Suppressed(Decision),
    NoResults,
    QueryFailed,
}

/// Collaborators shared by every loop of a session.
#[derive(Clone)]
pub struct PollContext {
    pub source: Arc<dyn LogSource>,
    pub gate: Arc<NotificationGate>,
    pub pipeline: Arc<DeliveryPipeline>,
    pub poll_interval: Duration,
}

/// The polling loop for one tracked identity on one session.
pub struct PollLoop {
    identity: String,
    destination: String,
    ctx: PollContext,
    outbound: Arc<dyn ChatOutbound>,
}

impl PollLoop {
    #[must_use]
    pub fn new(
        identity: impl Into<String>,
        destination: impl Into<String>,
        ctx: PollContext,
        outbound: Arc<dyn ChatOutbound>,
    ) -> Self {
        Self {
            identity: identity.into(),
            destination: destination.into(),
            ctx,
            outbound,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// One fetch → gate → deliver pass.
    ///
    /// Query failures are logged and reported as an outcome; only a failed
    /// write is an error, since it means the session is gone.
    pub async fn poll_once(&self) -> Result<CycleOutcome, DeliveryError> {
        let identity = self.identity.as_str();

        let result = match self.ctx.source.fetch_latest(identity).await {
            Ok(result) => result,
            Err(QueryError::NoResults { body }) => {
                debug!(identity, stage = "query", %body, "no results");
                return Ok(CycleOutcome::NoResults);
            },
            Err(e) => {
                warn!(identity, stage = "query", error = %e, "log query failed");
                return Ok(CycleOutcome::QueryFailed);
            },
        };

        let decision = self
            .ctx
            .gate
            .check_and_record(identity, result.occurred_at, Utc::now());
        if !decision.is_deliver() {
            debug!(
                identity,
                stage = "gate",
                log_id = result.id,
                reason = decision.reason(),
                "result suppressed"
            );
            return Ok(CycleOutcome::Suppressed(decision));
        }

        info!(
            identity,
            destination = %self.destination,
            log_id = result.id,
            "new log accepted"
        );
        self.ctx
            .pipeline
            .deliver(self.outbound.as_ref(), &self.destination, &result)
            .await?;
        Ok(CycleOutcome::Delivered { log_id: result.id })
    }

    /// Join the destination, then poll until `cancel` fires.
    ///
    /// Cancellation is only observed between cycles; a delivery in progress
    /// runs to completion. A write failure cancels `session_lost` and ends the
    /// loop. Returns the identity as the stop acknowledgement.
    pub async fn run(self, cancel: CancellationToken, session_lost: CancellationToken) -> String {
        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::ACTIVE_LOOPS).increment(1.0);

        self.run_inner(&cancel, &session_lost).await;

        #[cfg(feature = "metrics")]
        gauge!(relay_metrics::ACTIVE_LOOPS).decrement(1.0);

        debug!(identity = %self.identity, "polling loop stopped");
        self.identity
    }

    async fn run_inner(&self, cancel: &CancellationToken, session_lost: &CancellationToken) {
        let identity = self.identity.as_str();
        let destination = self.destination.as_str();

        if let Err(source) = self.outbound.join(destination).await {
            let err = DeliveryError::Join {
                destination: destination.to_string(),
                source,
            };
            warn!(
                identity,
                destination,
                stage = "join",
                error = %err,
                "join failed, session lost"
            );
            session_lost.cancel();
            return;
        }
        info!(identity, destination, "polling started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(self.ctx.poll_interval) => {},
            }

            if let Err(e) = self.poll_once().await {
                warn!(
                    identity,
                    destination,
                    stage = "deliver",
                    error = %e,
                    "delivery failed, session lost"
                );
                session_lost.cancel();
                return;
            }
        }
    }
}
