use std::error::Error as StdError;

/// Crate-wide result type for log queries.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a lookup produced no usable result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure or an unreadable response.
    #[error("log query failed: {context}: {source}")]
    Query {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The service answered with a non-success HTTP status.
    #[error("log query returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered but reported no match. Keeps the raw body for
    /// diagnostics.
    #[error("log query found no results: {body}")]
    NoResults { body: String },
}

impl Error {
    #[must_use]
    pub fn query(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Query {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Query { .. } | Self::Status { .. } => "query",
            Self::NoResults { .. } => "no_results",
        }
    }
}
