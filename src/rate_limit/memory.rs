//! In-memory rate limit backend for single-process operation.
//!
//! Keeps a sliding window of dispatch times per service class. Slots are
//! reserved under the lock, so concurrent callers never see more than the
//! budget inside any trailing window. State is not persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::backend::{RateLimitBackend, RateLimitResult};
use super::config::{CallBudget, ClassStats, ServiceClass};

/// Internal state for a service class.
#[derive(Debug, Default)]
struct ClassWindow {
    /// Granted dispatch times, ascending. May hold future reservations.
    dispatches: VecDeque<Instant>,
    total_requests: u64,
}

impl ClassWindow {
    /// Drop dispatches that can no longer fall inside a window ending at or
    /// after `now`.
    fn prune(&mut self, now: Instant, period: Duration) {
        while let Some(&front) = self.dispatches.front() {
            if front + period <= now {
                self.dispatches.pop_front();
            } else {
                break;
            }
        }
    }

    /// Reserve the earliest slot that keeps every trailing window within
    /// budget. Returns the reserved dispatch time.
    fn reserve(&mut self, now: Instant, budget: CallBudget) -> Instant {
        self.prune(now, budget.period);

        let calls = budget.calls.max(1) as usize;
        let mut slot = now;
        if let Some(&last) = self.dispatches.back() {
            slot = slot.max(last);
        }
        if self.dispatches.len() >= calls {
            let anchor = self.dispatches[self.dispatches.len() - calls];
            slot = slot.max(anchor + budget.period);
        }

        self.dispatches.push_back(slot);
        self.total_requests += 1;
        slot
    }

    fn in_window(&self, now: Instant, period: Duration) -> usize {
        self.dispatches
            .iter()
            .filter(|&&t| t + period > now)
            .count()
    }
}

/// In-memory sliding-window backend.
#[derive(Clone, Default)]
pub struct InMemoryRateLimitBackend {
    classes: Arc<RwLock<HashMap<ServiceClass, ClassWindow>>>,
    /// Period per class from the most recent acquire, for stats.
    periods: Arc<RwLock<HashMap<ServiceClass, Duration>>>,
}

impl InMemoryRateLimitBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitBackend for InMemoryRateLimitBackend {
    async fn acquire(&self, class: ServiceClass, budget: CallBudget) -> RateLimitResult<Duration> {
        let now = Instant::now();
        let slot = {
            let mut classes = self.classes.write().await;
            classes.entry(class).or_default().reserve(now, budget)
        };
        self.periods.write().await.insert(class, budget.period);
        Ok(slot.saturating_duration_since(now))
    }

    async fn stats(&self, class: ServiceClass) -> RateLimitResult<ClassStats> {
        let period = self
            .periods
            .read()
            .await
            .get(&class)
            .copied()
            .unwrap_or_else(|| class.default_budget().period);
        let classes = self.classes.read().await;
        Ok(classes
            .get(&class)
            .map(|w| ClassStats {
                total_requests: w.total_requests,
                in_window: w.in_window(Instant::now(), period),
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_calls_within_budget_do_not_wait() {
        let backend = InMemoryRateLimitBackend::new();
        let budget = CallBudget::per_second(3);
        for _ in 0..3 {
            let wait = backend
                .acquire(ServiceClass::Annotation, budget)
                .await
                .unwrap();
            assert_eq!(wait, Duration::ZERO);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reservations_follow_budget() {
        let backend = InMemoryRateLimitBackend::new();
        let budget = CallBudget::per_second(3);
        let mut waits = Vec::new();
        for _ in 0..10 {
            waits.push(
                backend
                    .acquire(ServiceClass::IdConversion, budget)
                    .await
                    .unwrap()
                    .as_secs(),
            );
        }
        assert_eq!(waits, vec![0, 0, 0, 1, 1, 1, 2, 2, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_classes_are_independent() {
        let backend = InMemoryRateLimitBackend::new();
        let one = CallBudget::per_second(1);
        backend.acquire(ServiceClass::PreprintDetails, one).await.unwrap();
        let other = backend.acquire(ServiceClass::Annotation, one).await.unwrap();
        assert_eq!(other, Duration::ZERO);
        let same = backend.acquire(ServiceClass::PreprintDetails, one).await.unwrap();
        assert_eq!(same, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expires() {
        let backend = InMemoryRateLimitBackend::new();
        let one = CallBudget::per_second(1);
        backend.acquire(ServiceClass::PreprintDetails, one).await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;
        let wait = backend.acquire(ServiceClass::PreprintDetails, one).await.unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats() {
        let backend = InMemoryRateLimitBackend::new();
        let budget = CallBudget::per_second(3);
        backend.acquire(ServiceClass::Annotation, budget).await.unwrap();
        backend.acquire(ServiceClass::Annotation, budget).await.unwrap();

        let stats = backend.stats(ServiceClass::Annotation).await.unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.in_window, 2);

        let untouched = backend.stats(ServiceClass::ReverseDoi).await.unwrap();
        assert_eq!(untouched, ClassStats::default());
    }
}
