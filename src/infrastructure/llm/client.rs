use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient, Response, StatusCode};
use tracing::{debug, error, info, instrument, warn};

use super::errors::LlmApiError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::domain::models::{LlmConfig, RetryConfig};
use crate::domain::ports::{CompletionRequest, LlmClient};
use crate::infrastructure::retry::RetryPolicy;

/// Configuration for the chat-completions client
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// Bearer token
    pub api_key: String,

    /// API base URL, without `/v1/...`
    pub base_url: String,

    /// Model name sent with every request
    pub model: String,

    /// Rate limit in requests per second
    pub rate_limit_rps: f64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl ChatClientConfig {
    pub fn from_config(llm: &LlmConfig, retry: &RetryConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            model: llm.model.clone(),
            rate_limit_rps: llm.rate_limit_rps,
            max_retries: retry.max_retries,
            initial_backoff_ms: retry.initial_backoff_ms,
            max_backoff_ms: retry.max_backoff_ms,
            timeout_secs: llm.timeout_secs,
        }
    }
}

/// HTTP client for an OpenAI-compatible chat-completions API
///
/// Provides:
/// - Connection pooling and reuse
/// - Rate limiting via token bucket algorithm
/// - Exponential backoff retry logic for transient errors
/// - Per-request timeout
pub struct ChatClient {
    http_client: ReqwestClient,
    base_url: String,
    model: String,
    rate_limiter: Arc<TokenBucketRateLimiter>,
    retry_policy: RetryPolicy,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, LlmApiError> {
        info!(
            "Initializing chat client: base_url={}, model={}, rate_limit={} rps, timeout={}s, api_key={}",
            config.base_url,
            config.model,
            config.rate_limit_rps,
            config.timeout_secs,
            redact_key(&config.api_key)
        );

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.api_key))
                .map_err(|e| LlmApiError::InvalidRequest(format!("Invalid API key: {e}")))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(10)
            .timeout(Duration::from_secs(config.timeout_secs))
            .tcp_nodelay(true)
            .default_headers(headers)
            .build()
            .map_err(LlmApiError::NetworkError)?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
            model: config.model,
            rate_limiter: Arc::new(TokenBucketRateLimiter::new(config.rate_limit_rps)),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    /// Run one completion with rate limiting and retries.
    #[instrument(skip(self, request), fields(model = %self.model, max_tokens = request.max_tokens))]
    pub async fn send(&self, request: &CompletionRequest) -> Result<String, LlmApiError> {
        debug!("Sending completion request");

        let result = self
            .retry_policy
            .execute(|| async {
                self.rate_limiter.acquire().await;
                self.execute_request(request).await
            })
            .await;

        match &result {
            Ok(text) => info!("Completion succeeded: {} chars", text.chars().count()),
            Err(err) => error!("Completion failed: {}", err),
        }

        result
    }

    async fn execute_request(&self, request: &CompletionRequest) -> Result<String, LlmApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!("POST {}", url);

        let response = self.http_client.post(&url).json(&body).send().await?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: Response) -> Result<String, LlmApiError> {
        let status = response.status();

        debug!("Response status: {}", status);

        if !status.is_success() {
            return Err(self.handle_error_response(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await?;
        if let Some(usage) = completion.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Token usage"
            );
        }

        completion
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| LlmApiError::EmptyCompletion("no choices[0].message.content".into()))
    }

    async fn handle_error_response(&self, response: Response) -> LlmApiError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());

        warn!("API error ({}): {}", status, body);

        match status {
            StatusCode::BAD_REQUEST => LlmApiError::InvalidRequest(body),
            StatusCode::UNAUTHORIZED => LlmApiError::InvalidApiKey,
            StatusCode::FORBIDDEN => LlmApiError::Forbidden(body),
            StatusCode::NOT_FOUND => LlmApiError::NotFound,
            StatusCode::TOO_MANY_REQUESTS => LlmApiError::RateLimitExceeded,
            status if status.is_server_error() => LlmApiError::ServerError(status, body),
            _ => LlmApiError::UnknownError(status, body),
        }
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
        Ok(self.send(&request).await?)
    }
}

/// Keep a short prefix of the key for log correlation.
fn redact_key(key: &str) -> String {
    match key.char_indices().nth(8) {
        Some((idx, _)) => format!("{}...[REDACTED]", &key[..idx]),
        None => "[REDACTED]".to_string(),
    }
}
