//! Prometheus exporter setup.

use {
    anyhow::Result,
    metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    std::net::SocketAddr,
    tracing::info,
};

/// Install the global recorder and serve `/metrics` on `listen`.
///
/// Call once at startup, from inside a tokio runtime.
pub fn init_metrics(listen: SocketAddr) -> Result<()> {
    builder()?.with_http_listener(listen).install()?;
    info!(%listen, "prometheus exporter listening");
    Ok(())
}

fn builder() -> Result<PrometheusBuilder> {
    Ok(PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(crate::logs::QUERY_DURATION_SECONDS.to_string()),
            crate::buckets::QUERY_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Full(crate::session::DURATION_SECONDS.to_string()),
            crate::buckets::SESSION_DURATION,
        )?)
}
