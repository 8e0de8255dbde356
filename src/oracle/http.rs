//! HTTP-backed compatibility oracle.
//!
//! Client for the product's remote AI scoring endpoint. The endpoint
//! contract is one POST returning `{ "score": <0-100>, "reasons": ... }`;
//! the prompt construction behind it lives in the scoring service, not
//! here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::traits::*;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Oracle backed by a remote scoring endpoint.
pub struct HttpOracle {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    /// Create a new client for the given scoring service.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom request timeout.
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            api_key,
            timeout,
        }
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn score_url(&self) -> String {
        format!("{}/compatibility/score", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }
}

/// Scoring request body.
#[derive(Debug, Serialize)]
struct ScoreRequest<'a> {
    user_a: &'a str,
    user_b: &'a str,
}

/// Scoring response body.
#[derive(Debug, Deserialize)]
struct ScoreResponse {
    score: u16,
    #[serde(default)]
    reasons: serde_json::Value,
}

#[async_trait]
impl CompatibilityOracle for HttpOracle {
    async fn score(&self, user_a: &str, user_b: &str) -> Result<CompatibilityReport, OracleError> {
        let mut request = self
            .client
            .post(self.score_url())
            .json(&ScoreRequest { user_a, user_b });

        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else if e.is_connect() {
                OracleError::Unavailable(e.to_string())
            } else {
                OracleError::RequestFailed(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::RequestFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: ScoreResponse = response
            .json()
            .await
            .map_err(|e| OracleError::ParseError(e.to_string()))?;

        if body.score > 100 {
            return Err(OracleError::ParseError(format!(
                "score {} outside 0-100",
                body.score
            )));
        }

        Ok(CompatibilityReport {
            score: body.score as u8,
            reasons: body.reasons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let oracle = HttpOracle::new("https://scoring.example.test", Some("key".into()));
        assert_eq!(oracle.score_url(), "https://scoring.example.test/compatibility/score");
        assert_eq!(oracle.auth_header().as_deref(), Some("Bearer key"));
        assert_eq!(oracle.timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_score_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compatibility/score"))
            .and(body_json(serde_json::json!({
                "user_a": "alice",
                "user_b": "bob",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 83,
                "reasons": {"shared_interests": ["climbing"]},
            })))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(server.uri(), None);
        let report = oracle.score("alice", "bob").await.unwrap();

        assert_eq!(report.score, 83);
        assert_eq!(
            report.reasons["shared_interests"][0],
            serde_json::json!("climbing")
        );
    }

    #[tokio::test]
    async fn test_error_status_maps_to_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compatibility/score"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(server.uri(), None);
        let result = oracle.score("alice", "bob").await;
        assert!(matches!(result, Err(OracleError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_score_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/compatibility/score"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"score": 150, "reasons": {}})),
            )
            .mount(&server)
            .await;

        let oracle = HttpOracle::new(server.uri(), None);
        let result = oracle.score("alice", "bob").await;
        assert!(matches!(result, Err(OracleError::ParseError(_))));
    }
}
