//! Pluggable backend trait for rate limiting storage.
//!
//! Allows swapping the in-memory sliding window for a no-op backend in tests
//! or an external store shared between processes.

use std::time::Duration;

use async_trait::async_trait;

use super::config::{CallBudget, ClassStats, ServiceClass};

/// Result type for rate limit operations.
pub type RateLimitResult<T> = Result<T, RateLimitError>;

/// Errors from rate limit backend operations.
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Trait for rate limit storage backends.
///
/// Implementations must be thread-safe: every worker in a batch shares one
/// backend, and `acquire` is the only point where they serialize.
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    /// Atomically reserve a dispatch slot for `class`.
    /// Returns how long the caller must wait before dispatching.
    async fn acquire(&self, class: ServiceClass, budget: CallBudget) -> RateLimitResult<Duration>;

    /// Statistics for a class.
    async fn stats(&self, class: ServiceClass) -> RateLimitResult<ClassStats>;
}

/// Backend that never delays. Used by tests and for local mirrors that have
/// no call budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnlimitedBackend;

#[async_trait]
impl RateLimitBackend for UnlimitedBackend {
    async fn acquire(&self, _class: ServiceClass, _budget: CallBudget) -> RateLimitResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn stats(&self, _class: ServiceClass) -> RateLimitResult<ClassStats> {
        Ok(ClassStats::default())
    }
}
