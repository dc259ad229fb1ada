// File: livelist-sync/src/http.rs
// Purpose: reqwest client for the payments REST API and the HTTP page source

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::error::{Result, SyncError};
use crate::record::RecordKind;
use crate::source::{PageQuery, PageResponse, PageSource};

/// Retry schedule for idempotent requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based): base, 2*base, 4*base...
    pub fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Thin authenticated JSON client shared by page loads and admin actions
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    token: Option<Arc<str>>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(SyncError::Network)?;
        Ok(Self::with_client(http, config))
    }

    /// Reuse an existing reqwest client (connection pool)
    pub fn with_client(http: reqwest::Client, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').into(),
            token: config
                .token
                .as_deref()
                .filter(|token| !token.is_empty())
                .map(Into::into),
            timeout: config.timeout(),
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff_base: config.backoff_base(),
            },
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET with timeout and retries; the only request that is retried.
    pub async fn get_json(&self, path_and_query: &str) -> Result<Value> {
        let mut attempt = 0;
        loop {
            match self.send_once(Method::GET, path_and_query, None).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    attempt += 1;
                    tracing::debug!(
                        path = path_and_query,
                        error = %err,
                        attempt,
                        max_attempts = self.retry.max_retries + 1,
                        "Request failed, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt of a mutating call. Mutations are never retried.
    pub async fn send_json(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.send_once(method, path, body).await
    }

    async fn send_once(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.url(path);
        let mut request = self.http.request(method, &url).timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(SyncError::from_response_body(status.as_u16(), &text));
        }
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn classify(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.timeout)
        } else {
            SyncError::Network(err)
        }
    }
}

/// `PageSource` backed by the REST list endpoints
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: ApiClient,
}

impl HttpPageSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, kind: RecordKind, query: &PageQuery) -> Result<PageResponse> {
        let path = format!("{}?{}", kind.endpoint(), query.to_query_string());
        tracing::debug!(%kind, path = %path, "Fetching page");
        let body = self.client.get_json(&path).await?;
        PageResponse::from_value(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(2), Duration::from_secs(4));
        assert_eq!(RetryPolicy::none().delay(3), Duration::ZERO);
    }

    #[test]
    fn test_client_from_config() {
        let config = ApiConfig {
            base_url: "https://api.example.com/".to_string(),
            token: Some(String::new()),
            max_retries: 5,
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&config).unwrap();

        assert_eq!(client.base_url(), "https://api.example.com");
        assert_eq!(
            client.url(RecordKind::Transaction.endpoint()),
            "https://api.example.com/api/payments/transactions/"
        );
        assert_eq!(client.retry_policy().max_retries, 5);
        assert!(client.token.is_none());
    }
}
