//! Rate limiting infrastructure for the external metadata services.
//!
//! Each service class has a fixed call budget (N calls per trailing window).
//! Budgets are enforced by a pluggable backend:
//! - In-memory sliding window (default)
//! - Unlimited (tests, local mirrors)

mod backend;
mod config;
mod limiter;
mod memory;

pub use backend::{RateLimitBackend, RateLimitError, RateLimitResult, UnlimitedBackend};
pub use config::{CallBudget, ClassStats, RateLimitConfig, ServiceClass};
pub use limiter::{BoxedRateLimitBackend, RateLimiter};
pub use memory::InMemoryRateLimitBackend;
