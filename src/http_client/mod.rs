//! HTTP client that charges every request against a service-class budget.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::time::{Duration, Instant};

use reqwest::Client;
use tracing::debug;

use crate::error::{FetchError, FetchResult};
use crate::rate_limit::{RateLimiter, ServiceClass};

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with per-service-class rate limiting.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    rate_limiter: RateLimiter,
}

impl HttpClient {
    /// Create a new HTTP client with the default user agent.
    pub fn new(timeout: Duration, rate_limiter: RateLimiter) -> FetchResult<Self> {
        Self::with_user_agent(timeout, rate_limiter, USER_AGENT)
    }

    /// Create a new HTTP client with a custom user agent.
    pub fn with_user_agent(
        timeout: Duration,
        rate_limiter: RateLimiter,
        user_agent: &str,
    ) -> FetchResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| FetchError::Connection(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Get the rate limiter for this client.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    /// Make a GET request after acquiring a slot for `class`.
    pub async fn get(&self, class: ServiceClass, url: &str) -> FetchResult<HttpResponse> {
        // Wait for rate limiter before making request
        self.rate_limiter.acquire(class).await;

        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let status = response.status();

        debug!(
            "GET {} [{}] -> {} in {}ms",
            url,
            class,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        Ok(HttpResponse {
            status,
            url: url.to_string(),
            response,
        })
    }

    /// GET a body as text, treating any non-success status as an error.
    pub async fn get_text(&self, class: ServiceClass, url: &str) -> FetchResult<String> {
        self.get(class, url).await?.error_for_status()?.text().await
    }

    /// GET a body as bytes, treating any non-success status as an error.
    pub async fn get_bytes(&self, class: ServiceClass, url: &str) -> FetchResult<Vec<u8>> {
        self.get(class, url).await?.error_for_status()?.bytes().await
    }
}
