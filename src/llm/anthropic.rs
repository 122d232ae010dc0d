//! HTTP client for the Anthropic Messages API.

use std::time::Duration;

use rand::Rng;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::AnthropicConfig;
use crate::llm::completion::{
    CompletionClient, CompletionFuture, CompletionRequest, CompletionResponse,
};
use crate::llm::error::{ExternalCallError, ExternalCallResult};

/// Messages endpoint path appended to the base URL.
pub const MESSAGES_PATH: &str = "/v1/messages";
/// API version header value.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Upper bound on the delay between two attempts.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

/// Completion client backed by the Messages API.
#[derive(Clone, Debug)]
pub struct AnthropicClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl AnthropicClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client cannot be built.
    pub fn new(config: &AnthropicConfig) -> ExternalCallResult<Self> {
        let mut api_key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|err| ExternalCallError::HttpClient(format!("invalid API key header: {err}")))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", api_key);
        headers.insert("anthropic-version", HeaderValue::from_static(ANTHROPIC_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .gzip(true)
            .build()
            .map_err(|err| ExternalCallError::HttpClient(err.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}{MESSAGES_PATH}", config.base_url.trim_end_matches('/')),
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    async fn send_once(&self, request: &CompletionRequest) -> ExternalCallResult<CompletionResponse> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| self.classify(err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            return Err(ExternalCallError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExternalCallError::Status {
                status: status.as_u16(),
                body: truncate(&body, MAX_ERROR_BODY),
            });
        }

        let bytes = response.bytes().await.map_err(|err| self.classify(err))?;
        serde_json::from_slice(&bytes).map_err(|err| ExternalCallError::Malformed(err.to_string()))
    }

    fn classify(&self, err: reqwest::Error) -> ExternalCallError {
        if err.is_timeout() {
            ExternalCallError::Timeout(self.request_timeout)
        } else {
            ExternalCallError::HttpRequest(err)
        }
    }
}

impl CompletionClient for AnthropicClient {
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> CompletionFuture<'a, ExternalCallResult<CompletionResponse>> {
        Box::pin(async move {
            let mut attempt = 0_u32;
            loop {
                match self.send_once(request).await {
                    Ok(response) => {
                        debug!(
                            attempt,
                            input_tokens = response.usage.input_tokens,
                            output_tokens = response.usage.output_tokens,
                            "completion call succeeded"
                        );
                        return Ok(response);
                    }
                    Err(err) if err.is_retryable() && attempt < self.max_retries => {
                        let delay = backoff_delay(self.retry_base_delay, attempt, &err);
                        warn!(
                            attempt = attempt + 1,
                            max_retries = self.max_retries,
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %err,
                            "completion call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }
}

/// Delay before retry number `attempt + 1`: the server hint when given,
/// otherwise exponential backoff with up to 25% jitter, capped.
fn backoff_delay(base: Duration, attempt: u32, err: &ExternalCallError) -> Duration {
    if let Some(hint) = err.retry_delay() {
        return hint.min(MAX_RETRY_BACKOFF);
    }
    let exponential = base.saturating_mul(1_u32 << attempt.min(10)).min(MAX_RETRY_BACKOFF);
    let max_jitter = u64::try_from(exponential.as_millis() / 4).unwrap_or(0);
    let jitter = rand::thread_rng().gen_range(0..=max_jitter);
    (exponential + Duration::from_millis(jitter)).min(MAX_RETRY_BACKOFF)
}

fn truncate(body: &str, limit: usize) -> String {
    if body.len() <= limit {
        return body.to_string();
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::State;
    use axum::http::HeaderMap as AxumHeaders;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::conversation::turn::Turn;

    async fn spawn_fake(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn config(base_url: String) -> AnthropicConfig {
        AnthropicConfig {
            api_key: "sk-test".to_string(),
            base_url,
            max_retries: 2,
            retry_base_delay_ms: 1,
            ..AnthropicConfig::default()
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 64,
            messages: vec![Turn::user_text("hello")],
            temperature: 0.0,
            system: None,
            stop_sequences: Vec::new(),
            tools: Vec::new(),
        }
    }

    async fn flaky(
        State(hits): State<Arc<AtomicUsize>>,
        headers: AxumHeaders,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let attempt = hits.fetch_add(1, Ordering::SeqCst);
        assert_eq!(headers["x-api-key"], "sk-test");
        assert_eq!(headers["anthropic-version"], ANTHROPIC_VERSION);
        assert_eq!(body["messages"][0]["role"], "user");

        if attempt == 0 {
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"type": "error"})),
            );
        }
        (
            axum::http::StatusCode::OK,
            Json(json!({
                "id": "msg_1",
                "type": "message",
                "role": "assistant",
                "stop_reason": "end_turn",
                "content": [{"type": "text", "text": "hi there"}],
                "usage": {"input_tokens": 3, "output_tokens": 2}
            })),
        )
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(MESSAGES_PATH, post(flaky))
            .with_state(Arc::clone(&hits));
        let client = AnthropicClient::new(&config(spawn_fake(router).await)).unwrap();

        let response = client.complete(&request()).await.unwrap();

        assert_eq!(response.joined_text(), "hi there");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                MESSAGES_PATH,
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (axum::http::StatusCode::BAD_REQUEST, "bad request")
                }),
            )
            .with_state(Arc::clone(&hits));
        let client = AnthropicClient::new(&config(spawn_fake(router).await)).unwrap();

        let err = client.complete(&request()).await.unwrap_err();

        assert!(matches!(err, ExternalCallError::Status { status: 400, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_exhausts_retries() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                MESSAGES_PATH,
                post(|State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (
                        axum::http::StatusCode::TOO_MANY_REQUESTS,
                        [("retry-after", "0")],
                        "slow down",
                    )
                }),
            )
            .with_state(Arc::clone(&hits));
        let client = AnthropicClient::new(&config(spawn_fake(router).await)).unwrap();

        let err = client.complete(&request()).await.unwrap_err();

        assert!(matches!(err, ExternalCallError::RateLimited(Some(0))));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let router = Router::new().route(MESSAGES_PATH, post(|| async { "not json" }));
        let client = AnthropicClient::new(&config(spawn_fake(router).await)).unwrap();

        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, ExternalCallError::Malformed(_)));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = AnthropicClient::new(&config("https://api.example.com/".to_string())).unwrap();
        assert_eq!(client.endpoint, "https://api.example.com/v1/messages");
    }

    #[test]
    fn test_backoff_bounds() {
        let base = Duration::from_millis(100);
        let err = ExternalCallError::Timeout(Duration::from_secs(1));
        for attempt in 0..4 {
            let delay = backoff_delay(base, attempt, &err);
            let floor = base * (1 << attempt);
            assert!(delay >= floor);
            assert!(delay <= floor + floor / 4);
        }
        assert_eq!(backoff_delay(base, 40, &err), MAX_RETRY_BACKOFF);
        assert_eq!(
            backoff_delay(base, 0, &ExternalCallError::RateLimited(Some(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let body = "é".repeat(400);
        let truncated = truncate(&body, 511);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 514);
    }
}
