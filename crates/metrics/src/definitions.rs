//! Metric name and label definitions.

/// Log service query metrics
pub mod logs {
    /// Queries issued against the search endpoint
    pub const QUERIES_TOTAL: &str = "logrelay_log_queries_total";
    /// Failed queries, labelled by `kind` (`query`, `no_results`)
    pub const QUERY_ERRORS_TOTAL: &str = "logrelay_log_query_errors_total";
    /// Search request duration in seconds
    pub const QUERY_DURATION_SECONDS: &str = "logrelay_log_query_duration_seconds";
}

/// Gate and delivery metrics
pub mod relay {
    /// Results rejected by the notification gate, labelled by `reason`
    pub const GATE_REJECTIONS_TOTAL: &str = "logrelay_gate_rejections_total";
    /// Announcements written to the chat session
    pub const DELIVERIES_TOTAL: &str = "logrelay_deliveries_total";
    /// Announcements that could not be written
    pub const DELIVERY_ERRORS_TOTAL: &str = "logrelay_delivery_errors_total";
    /// Polling loops currently running
    pub const ACTIVE_LOOPS: &str = "logrelay_active_loops";
}

/// Chat session metrics
pub mod session {
    /// Connection attempts
    pub const CONNECT_ATTEMPTS_TOTAL: &str = "logrelay_connect_attempts_total";
    /// Failed connection attempts
    pub const CONNECT_ERRORS_TOTAL: &str = "logrelay_connect_errors_total";
    /// Sessions that ended after being established
    pub const LOST_TOTAL: &str = "logrelay_sessions_lost_total";
    /// Keep-alive pings answered
    pub const PINGS_TOTAL: &str = "logrelay_pings_total";
    /// How long a session stayed live, in seconds
    pub const DURATION_SECONDS: &str = "logrelay_session_duration_seconds";
}

/// Histogram bucket definitions
pub mod buckets {
    /// Search request duration, 10ms to 30s
    pub const QUERY_DURATION: &[f64] = &[
        0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
    ];

    /// Session lifetime, 1 minute to 1 week
    pub const SESSION_DURATION: &[f64] = &[
        60.0, 300.0, 900.0, 3_600.0, 14_400.0, 43_200.0, 86_400.0, 259_200.0, 604_800.0,
    ];
}
