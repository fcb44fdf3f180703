use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, instrument};

use super::errors::ServiceError;
use crate::domain::models::{EvalError, ServerConfig};
use crate::domain::ports::{DiagnoseResponse, DiagnosisService, HealthReport, ReloadAck};
use crate::infrastructure::retry::RetryPolicy;

/// HTTP adapter for the diagnosis service
pub struct DiagnosisClient {
    http_client: ReqwestClient,
    base_url: String,
    request_timeout: Duration,
    control_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl DiagnosisClient {
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        info!(
            "Initializing diagnosis client: url={}, timeout={}s, retries={}",
            config.url, config.request_timeout_secs, config.max_retries
        );

        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(64)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            control_timeout: Duration::from_secs(config.control_timeout_secs),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_diagnose(&self, query: &str) -> Result<DiagnoseResponse, ServiceError> {
        let started = Instant::now();
        let response = self
            .http_client
            .post(self.url("/diagnose"))
            .timeout(self.request_timeout)
            .json(&json!({ "symptoms": query }))
            .send()
            .await?;

        let mut body: DiagnoseResponse = parse_json(response).await?;
        body.attempt_latency = Some(started.elapsed());
        Ok(body)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status(status, body));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| ServiceError::Malformed(e.to_string()))
}

#[async_trait]
impl DiagnosisService for DiagnosisClient {
    #[instrument(skip(self, query), fields(query_chars = query.chars().count()))]
    async fn diagnose(&self, query: &str) -> Result<DiagnoseResponse, EvalError> {
        self.retry_policy
            .execute(|| self.post_diagnose(query))
            .await
            .map_err(|e| {
                debug!("Diagnose call failed: {}", e);
                EvalError::from(e)
            })
    }

    async fn reload_prompts(&self) -> anyhow::Result<ReloadAck> {
        let response = self
            .http_client
            .post(self.url("/admin/reload-prompts"))
            .timeout(self.control_timeout)
            .send()
            .await
            .context("Reload request failed")?;

        Ok(parse_json(response).await?)
    }

    async fn health(&self) -> anyhow::Result<HealthReport> {
        let response = self
            .http_client
            .get(self.url("/health"))
            .timeout(self.control_timeout)
            .send()
            .await
            .with_context(|| format!("GET {}/health failed", self.base_url))?;

        Ok(parse_json(response).await?)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
