//! Gemini client with bounded retry
//!
//! This module provides an async HTTP client for the Gemini `generateContent`
//! endpoint. Each call is classified as success, retryable or fatal, and
//! retryable failures are retried with exponential backoff and jitter.

use crate::core::config::Config;
use crate::core::constants::upstream;
use crate::core::retry::{RetryPolicy, is_retryable_status};
use crate::models::gemini::{GenerateContentRequest, GenerationConfig, error_detail};
use anyhow::{Context, Result};
use axum::body::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Error types that can occur during Gemini API interactions
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{status} - {detail}")]
    Status { status: u16, detail: String },

    #[error("{0}")]
    Network(String),
}

/// Classification of one upstream call
#[derive(Debug)]
pub enum AttemptOutcome {
    /// 2xx with the full response body
    Success(Bytes),
    /// 429, 5xx or a transport failure
    Retryable(UpstreamError),
    /// Any other non-success status
    Fatal(UpstreamError),
}

/// Terminal failure of a relay call
#[derive(Debug, thiserror::Error)]
pub enum RelayCallError {
    /// Upstream rejected the request; never retried
    #[error("upstream rejected request: {0}")]
    Rejected(UpstreamError),

    /// Every allowed attempt failed with a retryable error
    #[error("upstream unavailable after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: UpstreamError },
}

/// Gemini async client
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    generation_config: GenerationConfig,
    retry_policy: RetryPolicy,
}

impl GeminiClient {
    /// Create a new Gemini client from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: Self::endpoint_url(&config.base_url, &config.model),
            generation_config: GenerationConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_output_tokens,
            },
            retry_policy: RetryPolicy::from_config(config),
        })
    }

    /// `{base_url}/{model}:generateContent`
    fn endpoint_url(base_url: &str, model: &str) -> String {
        format!(
            "{}/{}:{}",
            base_url.trim_end_matches('/'),
            model,
            upstream::GENERATE_CONTENT
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Build the upstream payload for a prompt
    pub fn build_request(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest::from_prompt(prompt, self.generation_config.clone())
    }

    /// Generate content for a prompt, retrying transient failures
    ///
    /// Attempts run strictly one after another. A fatal status stops at
    /// once; retryable failures sleep for the policy's backoff before the
    /// next attempt. Returns the raw body of the first successful response.
    ///
    /// # Errors
    ///
    /// `Rejected` for a non-retryable status, `Exhausted` when the attempt
    /// budget runs out.
    pub async fn generate_content(
        &self,
        api_key: &str,
        prompt: &str,
    ) -> Result<Bytes, RelayCallError> {
        let request = self.build_request(prompt);
        let mut attempt = 0;

        loop {
            match self.send_once(api_key, &request).await {
                AttemptOutcome::Success(body) => {
                    debug!("Attempt {} succeeded", attempt + 1);
                    return Ok(body);
                }
                AttemptOutcome::Fatal(err) => {
                    error!("Attempt {} failed with non-retryable error: {}", attempt + 1, err);
                    return Err(RelayCallError::Rejected(err));
                }
                AttemptOutcome::Retryable(err) => {
                    if !self.retry_policy.has_attempts_left(attempt) {
                        error!(
                            "Attempt {} failed: {}. No attempts left",
                            attempt + 1,
                            err
                        );
                        return Err(RelayCallError::Exhausted {
                            attempts: attempt + 1,
                            last: err,
                        });
                    }

                    let delay = self.retry_policy.backoff_delay(attempt);
                    warn!(
                        "Attempt {} failed: {}. Retrying in {}ms...",
                        attempt + 1,
                        err,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Send a single request and classify the result
    async fn send_once(&self, api_key: &str, request: &GenerateContentRequest) -> AttemptOutcome {
        let response = match self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .header(upstream::API_KEY_HEADER, api_key)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return AttemptOutcome::Retryable(Self::network_error(e)),
        };

        let status = response.status();

        if status.is_success() {
            return match response.bytes().await {
                Ok(body) => AttemptOutcome::Success(body),
                Err(e) => AttemptOutcome::Retryable(Self::network_error(e)),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let err = UpstreamError::Status {
            status: status.as_u16(),
            detail: Self::status_detail(status, &body),
        };

        if is_retryable_status(status) {
            AttemptOutcome::Retryable(err)
        } else {
            AttemptOutcome::Fatal(err)
        }
    }

    fn status_detail(status: StatusCode, body: &str) -> String {
        error_detail(body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        })
    }

    fn network_error(err: reqwest::Error) -> UpstreamError {
        let kind = if err.is_timeout() {
            "request timed out"
        } else if err.is_connect() {
            "connection error"
        } else {
            "transport error"
        };
        UpstreamError::Network(format!("{}: {}", kind, err.without_url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL_PATH: &str = "/models/gemini-test:generateContent";

    fn test_config(base_url: &str) -> Config {
        Config {
            base_url: format!("{}/models", base_url),
            model: "gemini-test".to_string(),
            request_timeout: 5,
            base_delay_ms: 5,
            max_jitter_ms: 2,
            ..Config::default()
        }
    }

    fn success_body(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            GeminiClient::endpoint_url("https://example.com/v1beta/models/", "gemini-pro"),
            "https://example.com/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[tokio::test]
    async fn test_sends_key_in_header_and_prompt_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MODEL_PATH))
            .and(header("x-goog-api-key", "AIza-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server.uri())).unwrap();
        let prompt = "  Multi-line\nprompt with \"quotes\" and ünïcode  ";
        client.generate_content("AIza-test", prompt).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["contents"][0]["parts"][0]["text"], json!(prompt));
        assert!(requests[0].url.query().is_none());
    }

    #[tokio::test]
    async fn test_server_error_then_success_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("done")))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server.uri())).unwrap();
        let body = client.generate_content("k", "p").await.unwrap();

        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, success_body("done"));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_forbidden_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server.uri())).unwrap();
        let err = client.generate_content("k", "p").await.unwrap_err();

        match err {
            RelayCallError::Rejected(UpstreamError::Status { status, detail }) => {
                assert_eq!(status, 403);
                assert_eq!(detail, "Permission denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_exhausts_attempts() {
        // Reserve a free port, then release it so connections are refused.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let uri = format!("http://127.0.0.1:{}", port);

        let client = GeminiClient::new(&test_config(&uri)).unwrap();
        let err = client.generate_content("k", "p").await.unwrap_err();

        match err {
            RelayCallError::Exhausted {
                attempts,
                last: UpstreamError::Network(_),
            } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_status_detail_defaults_to_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = GeminiClient::new(&test_config(&server.uri())).unwrap();
        let err = client.generate_content("k", "p").await.unwrap_err();
        assert_eq!(err.to_string(), "upstream rejected request: 404 - Not Found");
    }
}
