//! Fixed-budget rate limiter per service class.
//!
//! Provides the high-level API over a pluggable backend: wait until the
//! class has budget, then return. Never fails, only delays.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::backend::{RateLimitBackend, UnlimitedBackend};
use super::config::{ClassStats, RateLimitConfig, ServiceClass};
use super::memory::InMemoryRateLimitBackend;

/// Type alias for a boxed rate limit backend.
pub type BoxedRateLimitBackend = Arc<dyn RateLimitBackend>;

/// Rate limiter shared by every service client.
#[derive(Clone)]
pub struct RateLimiter {
    backend: BoxedRateLimitBackend,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Create an in-memory rate limiter with the given budgets.
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_backend(Arc::new(InMemoryRateLimitBackend::new()), config)
    }

    /// Create a rate limiter over a custom backend.
    pub fn with_backend(backend: BoxedRateLimitBackend, config: RateLimitConfig) -> Self {
        Self { backend, config }
    }

    /// A limiter that never waits.
    pub fn unlimited() -> Self {
        Self::with_backend(Arc::new(UnlimitedBackend), RateLimitConfig::default())
    }

    /// Wait until `class` has budget, then record the dispatch.
    pub async fn acquire(&self, class: ServiceClass) {
        let budget = self.config.budget(class);
        match self.backend.acquire(class, budget).await {
            Ok(wait_time) => {
                if wait_time > Duration::ZERO {
                    debug!("Rate limiting {}: waiting {:?}", class, wait_time);
                    tokio::time::sleep(wait_time).await;
                }
            }
            Err(e) => {
                // Fall back to allowing the request
                warn!("Rate limit acquire failed for {}: {}", class, e);
            }
        }
    }

    /// Get statistics for every class that has been used.
    pub async fn get_stats(&self) -> BTreeMap<ServiceClass, ClassStats> {
        let mut stats = BTreeMap::new();
        for class in ServiceClass::ALL {
            match self.backend.stats(class).await {
                Ok(s) if s.total_requests > 0 => {
                    stats.insert(class, s);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to read rate limit stats for {}: {}", class, e),
            }
        }
        stats
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
