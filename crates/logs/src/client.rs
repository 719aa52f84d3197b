use {
    async_trait::async_trait,
    chrono::DateTime,
    reqwest::Client,
    tracing::{debug, trace},
};

#[cfg(feature = "metrics")]
use logrelay_metrics::{counter, histogram, logs as logs_metrics};

use logrelay_config::LogsConfig;

use crate::{
    Error, Result,
    types::{LogResult, SearchResponse},
};

const SEARCH_PATH: &str = "json_search";

/// Anything that can answer "what is this player's latest log".
#[async_trait]
pub trait LogSource: Send + Sync {
    async fn fetch_latest(&self, identity: &str) -> Result<LogResult>;
}

/// HTTP client for the search endpoint.
#[derive(Debug, Clone)]
pub struct LogsClient {
    http: Client,
    base_url: String,
}

impl LogsClient {
    pub fn new(config: &LogsConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("logrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| Error::query("failed to build HTTP client", source))?;
        Ok(Self::with_client(http, &config.base_url))
    }

    /// Use an existing reqwest client, e.g. one shared with other callers.
    #[must_use]
    pub fn with_client(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn search(&self, identity: &str) -> Result<LogResult> {
        let url = format!("{}/{SEARCH_PATH}", self.base_url);
        debug!(identity, %url, "querying latest log");

        let resp = self
            .http
            .get(&url)
            .query(&[("player", identity), ("limit", "1")])
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|source| Error::query("search request failed", source))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| Error::query("failed to read search response", source))?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        trace!(identity, %body, "search response");
        parse_search_response(&body)
    }
}

#[async_trait]
impl LogSource for LogsClient {
    async fn fetch_latest(&self, identity: &str) -> Result<LogResult> {
        #[cfg(feature = "metrics")]
        let start = std::time::Instant::now();
        #[cfg(feature = "metrics")]
        counter!(logs_metrics::QUERIES_TOTAL).increment(1);

        let result = self.search(identity).await;

        #[cfg(feature = "metrics")]
        {
            histogram!(logs_metrics::QUERY_DURATION_SECONDS).record(start.elapsed().as_secs_f64());
            if let Err(e) = &result {
                counter!(logs_metrics::QUERY_ERRORS_TOTAL, "kind" => e.kind()).increment(1);
            }
        }

        result
    }
}

/// Turn a raw search body into the first result, if the service reported one.
pub(crate) fn parse_search_response(body: &str) -> Result<LogResult> {
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|source| Error::query("failed to parse search response", source))?;

    if !parsed.success || parsed.results == 0 {
        return Err(Error::NoResults {
            body: body.to_string(),
        });
    }

    let Some(first) = parsed.logs.into_iter().next() else {
        return Err(Error::NoResults {
            body: body.to_string(),
        });
    };

    let occurred_at = DateTime::from_timestamp(first.date, 0).ok_or_else(|| Error::Query {
        context: "search response".into(),
        source: format!("date {} is out of range", first.date).into(),
    })?;

    Ok(LogResult {
        id: first.id,
        occurred_at,
        title: first.title,
    })
}

/// Public page of a log, as announced in chat.
#[must_use]
pub fn permalink(base_url: &str, id: u64) -> String {
    format!("{}/{id}", base_url.trim_end_matches('/'))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, mockito::Matcher, rstest::rstest};

    fn client_for(server: &mockito::Server) -> LogsClient {
        LogsClient::with_client(Client::new(), &server.url())
    }

    #[test]
    fn parses_first_result() {
        let body = r#"{"success":true,"results":2,"logs":[
            {"id":55,"date":1700000000,"title":"cp_process"},
            {"id":54,"date":1699990000,"title":"koth_product"}]}"#;
        let result = parse_search_response(body).unwrap();
        assert_eq!(result.id, 55);
        assert_eq!(result.occurred_at.timestamp(), 1_700_000_000);
        assert_eq!(result.title, "cp_process");
    }

    #[test]
    fn ignores_unknown_fields() {
        let body = r#"{"success":true,"results":1,"total":9,"parameters":{"player":"1"},
            "logs":[{"id":7,"date":1700000000,"title":"x","map":"cp_gullywash","players":12,"views":3}]}"#;
        assert_eq!(parse_search_response(body).unwrap().id, 7);
    }

    #[rstest]
    #[case::unsuccessful(r#"{"success":false,"results":0,"logs":[]}"#)]
    #[case::zero_results(r#"{"success":true,"results":0,"logs":[]}"#)]
    #[case::missing_logs(r#"{"success":true,"results":1}"#)]
    #[case::error_only(r#"{"success":false,"error":"Invalid player"}"#)]
    fn no_results_keeps_body(#[case] body: &str) {
        match parse_search_response(body).unwrap_err() {
            Error::NoResults { body: raw } => assert_eq!(raw, body),
            other => panic!("expected NoResults, got {other:?}"),
        }
    }

    #[test]
    fn malformed_body_is_query_error() {
        let err = parse_search_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
        assert_eq!(err.kind(), "query");
    }

    #[test]
    fn permalink_joins_base_and_id() {
        assert_eq!(permalink("http://logs.tf", 55), "http://logs.tf/55");
        assert_eq!(permalink("http://logs.tf/", 55), "http://logs.tf/55");
    }

    // ── HTTP tests (with mockito) ──────────────────────────────────────

    #[tokio::test]
    async fn fetch_latest_sends_player_and_limit() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/json_search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("player".into(), "76561197960287930".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                serde_json::json!({
                    "success": true,
                    "results": 1,
                    "logs": [{"id": 55, "date": 1_700_000_000, "title": "x"}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = client_for(&server)
            .fetch_latest("76561197960287930")
            .await
            .unwrap();

        assert_eq!(result.id, 55);
        assert_eq!(result.title, "x");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_latest_no_results() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/json_search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"success":false,"results":0,"logs":[]}"#)
            .create_async()
            .await;

        let err = client_for(&server).fetch_latest("123").await.unwrap_err();
        assert!(matches!(err, Error::NoResults { .. }));
        assert_eq!(err.kind(), "no_results");
    }

    #[tokio::test]
    async fn fetch_latest_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/json_search")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let err = client_for(&server).fetch_latest("123").await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 503, .. }));
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn fetch_latest_unreachable_is_query_error() {
        let client = LogsClient::with_client(Client::new(), "http://127.0.0.1:1");
        let err = client.fetch_latest("123").await.unwrap_err();
        assert!(matches!(err, Error::Query { .. }));
    }

    #[test]
    fn new_trims_trailing_slash() {
        let config = LogsConfig {
            base_url: "http://logs.tf/".into(),
            ..LogsConfig::default()
        };
        assert_eq!(LogsClient::new(&config).unwrap().base_url(), "http://logs.tf");
    }
}
