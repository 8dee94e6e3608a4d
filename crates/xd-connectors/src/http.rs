//! HTTP utilities for connectors.
//!
//! Wraps a `reqwest` client with XDR key authentication, an optional
//! client-side rate limit, a per-request timeout and an opt-in retry count.

use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Length of the nonce used by advanced API keys.
const ADVANCED_NONCE_LEN: usize = 64;

/// HTTP client with authentication, rate limiting and optional retries.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    /// Period duration.
    pub period: Duration,
    /// Maximum burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 600,
            period: Duration::from_secs(60),
            burst_size: 10,
        }
    }
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                connector_name = %config.name,
                "TLS certificate verification disabled"
            );
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                headers.insert(name, val);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .pool_max_idle_per_host(16)
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = match rate_limit {
            Some(rl) => {
                let per_request = rl.period / rl.max_requests.max(1);
                let quota = Quota::with_period(per_request)
                    .ok_or_else(|| {
                        ConnectorError::ConfigError("Rate limit period must be non-zero".into())
                    })?
                    .allow_burst(NonZeroU32::new(rl.burst_size).unwrap_or(NonZeroU32::MIN));
                Some(Arc::new(GovernorRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Builds a URL from a path.
    pub fn build_url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Executes a GET request.
    pub async fn get(&self, path: &str) -> ConnectorResult<Response> {
        let url = self.build_url(path);
        self.execute(|| self.client.get(&url)).await
    }

    /// Executes a POST request with a JSON body.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<Response> {
        let url = self.build_url(path);
        self.execute(|| self.client.post(&url).json(body)).await
    }

    /// Executes a POST request and deserializes the JSON response.
    pub async fn post_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> ConnectorResult<R> {
        let response = self.post(path, body).await?;
        parse_json_response(response).await
    }

    /// Sends a request, retrying server errors and transport failures up to
    /// `max_retries` times. Auth headers are regenerated on every attempt so
    /// advanced-key nonces are never reused.
    async fn execute<F>(&self, build: F) -> ConnectorResult<Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut delay = Duration::from_millis(200);
        let mut attempt = 0;

        loop {
            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            let request = self.add_auth(build());
            let outcome = match request.send().await {
                Ok(response) => check_status(response).await,
                Err(e) => Err(map_transport_error(&e)),
            };

            match outcome {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.config.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    debug!(attempt, error = %err, "Retrying request after {:?}", delay);
                    sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(10));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn add_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            AuthConfig::None => request,
            AuthConfig::XdrStandard { key_id, key } => request
                .header("x-xdr-auth-id", key_id)
                .header("Authorization", key.expose_secret()),
            AuthConfig::XdrAdvanced { key_id, key } => {
                let nonce = generate_nonce();
                let timestamp = chrono::Utc::now().timestamp_millis().to_string();
                request
                    .header("x-xdr-auth-id", key_id)
                    .header("x-xdr-nonce", &nonce)
                    .header("x-xdr-timestamp", &timestamp)
                    .header(
                        "Authorization",
                        advanced_auth_hash(key.expose_secret(), &nonce, &timestamp),
                    )
            }
        }
    }
}

/// Hex sha256 of `key + nonce + timestamp`, the advanced-key signature.
pub fn advanced_auth_hash(key: &str, nonce: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(timestamp.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ADVANCED_NONCE_LEN)
        .map(char::from)
        .collect()
}

async fn parse_json_response<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

    serde_json::from_str(&text).map_err(|e| {
        ConnectorError::InvalidResponse(format!(
            "Failed to parse response (status {}): {} - Body: {}",
            status,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}

async fn check_status(response: Response) -> ConnectorResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            Err(ConnectorError::RateLimited(retry_after))
        }
        StatusCode::UNAUTHORIZED => Err(ConnectorError::AuthenticationFailed(
            "Unauthorized".into(),
        )),
        StatusCode::FORBIDDEN => Err(ConnectorError::AuthorizationDenied("Forbidden".into())),
        StatusCode::NOT_FOUND => Err(ConnectorError::NotFound("Resource not found".into())),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ConnectorError::RequestFailed(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            )))
        }
    }
}

fn map_transport_error(e: &reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

fn is_retryable(err: &ConnectorError) -> bool {
    match err {
        ConnectorError::Timeout(_)
        | ConnectorError::ConnectionFailed(_)
        | ConnectorError::RateLimited(_) => true,
        ConnectorError::RequestFailed(msg) => msg.starts_with("HTTP 5"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn create_test_config() -> ConnectorConfig {
        ConnectorConfig {
            name: "test".to_string(),
            base_url: "https://api-tenant.xdr.us.paloaltonetworks.com/".to_string(),
            auth: AuthConfig::None,
            timeout_secs: 30,
            max_retries: 0,
            verify_tls: true,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_build_url() {
        let client = HttpClient::new(create_test_config()).unwrap();

        assert_eq!(
            client.build_url("/public_api/v1/incidents/get_incidents"),
            "https://api-tenant.xdr.us.paloaltonetworks.com/public_api/v1/incidents/get_incidents"
        );
        assert_eq!(
            client.build_url("public_api/v1/healthcheck"),
            "https://api-tenant.xdr.us.paloaltonetworks.com/public_api/v1/healthcheck"
        );
    }

    #[test]
    fn test_advanced_auth_hash_is_sha256_of_concatenation() {
        // sha256("abc")
        assert_eq!(
            advanced_auth_hash("a", "b", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_nonce_shape() {
        let nonce = generate_nonce();
        assert_eq!(nonce.len(), ADVANCED_NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(nonce, generate_nonce());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable(&ConnectorError::Timeout("t".into())));
        assert!(is_retryable(&ConnectorError::RequestFailed(
            "HTTP 502 Bad Gateway: ".into()
        )));
        assert!(!is_retryable(&ConnectorError::RequestFailed(
            "HTTP 400 Bad Request: ".into()
        )));
        assert!(!is_retryable(&ConnectorError::AuthenticationFailed(
            "no".into()
        )));
    }

    #[test]
    fn test_rate_limited_client_builds() {
        let client =
            HttpClient::with_rate_limit(create_test_config(), Some(RateLimitConfig::default()));
        assert!(client.is_ok());
    }
}
