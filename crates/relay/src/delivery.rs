use std::time::Duration;

use tracing::{debug, info};

#[cfg(feature = "metrics")]
use logrelay_metrics::{counter, relay as relay_metrics};

use {
    logrelay_irc::ChatOutbound,
    logrelay_logs::{LogResult, permalink},
};

use crate::DeliveryError;

/// Announces accepted results after the spoiler delay.
#[derive(Debug, Clone)]
pub struct DeliveryPipeline {
    spoiler_delay: Duration,
    base_url: String,
}

impl DeliveryPipeline {
    #[must_use]
    pub fn new(spoiler_delay: Duration, base_url: impl Into<String>) -> Self {
        Self {
            spoiler_delay,
            base_url: base_url.into(),
        }
    }

    /// The chat line for a result: its permalink.
    #[must_use]
    pub fn message_for(&self, result: &LogResult) -> String {
        permalink(&self.base_url, result.id)
    }

    /// Sleep for the spoiler delay, then post the permalink to `destination`.
    ///
    /// The sleep only holds up the calling loop. A write failure is returned
    /// as-is and not retried.
    pub async fn deliver(
        &self,
        outbound: &dyn ChatOutbound,
        destination: &str,
        result: &LogResult,
    ) -> Result<(), DeliveryError> {
        debug!(
            destination,
            log_id = result.id,
            delay = ?self.spoiler_delay,
            "holding announcement"
        );
        tokio::time::sleep(self.spoiler_delay).await;

        let message = self.message_for(result);
        if let Err(source) = outbound.send_text(destination, &message).await {
            #[cfg(feature = "metrics")]
            counter!(relay_metrics::DELIVERY_ERRORS_TOTAL).increment(1);

            return Err(DeliveryError::Send {
                destination: destination.to_string(),
                log_id: result.id,
                source,
            });
        }

        #[cfg(feature = "metrics")]
        counter!(relay_metrics::DELIVERIES_TOTAL).increment(1);

        info!(destination, log_id = result.id, title = %result.title, "announced log");
        Ok(())
    }
}
