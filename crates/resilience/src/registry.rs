use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};

use crate::breaker::{BreakerEvent, BreakerSnapshot, CircuitBreaker};
use crate::error::BreakerError;
use crate::options::BreakerOptions;

const EVENT_CAPACITY: usize = 64;

/// Process-wide set of circuit breakers, one per dependency name.
///
/// Breakers are created lazily on first use and live as long as the
/// registry. Calls on different names never contend beyond a short read
/// lock on the map.
pub struct BreakerRegistry {
    defaults: BreakerOptions,
    overrides: HashMap<String, BreakerOptions>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    events: broadcast::Sender<BreakerEvent>,
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerOptions::default())
    }
}

impl BreakerRegistry {
    /// Creates a registry whose breakers use `defaults`.
    pub fn new(defaults: BreakerOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            defaults,
            overrides: HashMap::new(),
            breakers: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Uses `options` instead of the defaults for the breaker named `name`.
    pub fn with_override(mut self, name: impl Into<String>, options: BreakerOptions) -> Self {
        self.overrides.insert(name.into(), options);
        self
    }

    /// Returns the options a breaker named `name` is (or will be) created with.
    pub fn options_for(&self, name: &str) -> &BreakerOptions {
        self.overrides.get(name).unwrap_or(&self.defaults)
    }

    /// Returns the breaker for `name`, creating it on first use.
    pub async fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::debug!(breaker = name, "Creating circuit breaker");
                Arc::new(CircuitBreaker::new(
                    name,
                    self.options_for(name).clone(),
                    self.events.clone(),
                ))
            })
            .clone()
    }

    /// Runs `action` through the breaker for `name`.
    ///
    /// The registry never retries; the action's error, a timeout, or an
    /// open-circuit rejection is returned to the caller as is.
    pub async fn invoke<T, E, F, Fut>(&self, name: &str, action: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.breaker(name).await.call(action).await
    }

    /// Returns a snapshot of every breaker created so far, sorted by name.
    pub async fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let breakers = self.breakers.read().await;
        let mut snapshots: Vec<_> = breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Subscribes to state transitions of every breaker in the registry.
    pub fn subscribe(&self) -> broadcast::Receiver<BreakerEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::BreakerState;

    #[tokio::test]
    async fn test_one_breaker_per_name() {
        let registry = BreakerRegistry::default();

        let a = registry.breaker("users-service").await;
        let b = registry.breaker("users-service").await;
        let c = registry.breaker("products-service").await;

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(registry.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_overrides_apply_per_name() {
        let fast = BreakerOptions::default().with_timeout(Some(Duration::from_millis(50)));
        let registry =
            BreakerRegistry::new(BreakerOptions::default()).with_override("products-service", fast);

        let products = registry.breaker("products-service").await;
        let users = registry.breaker("users-service").await;

        assert_eq!(products.options().timeout, Some(Duration::from_millis(50)));
        assert_eq!(users.options().timeout, Some(Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn test_breakers_are_independent() {
        let registry = BreakerRegistry::default();
        let mut events = registry.subscribe();

        let result = registry
            .invoke("users-service", || async { Err::<(), _>("down") })
            .await;
        assert!(matches!(result, Err(BreakerError::Inner("down"))));

        let rejected = registry
            .invoke("users-service", || async { Ok::<_, String>(()) })
            .await;
        assert!(rejected.unwrap_err().is_open());

        let other = registry
            .invoke("products-service", || async { Ok::<_, String>(7) })
            .await;
        assert_eq!(other.unwrap(), 7);

        let event = events.recv().await.unwrap();
        assert_eq!(event.name, "users-service");
        assert_eq!(event.to, BreakerState::Open);

        let snapshot = registry.snapshot().await;
        let names: Vec<_> = snapshot.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["products-service", "users-service"]);
        assert_eq!(snapshot[0].state, BreakerState::Closed);
        assert_eq!(snapshot[1].state, BreakerState::Open);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_one_breaker() {
        let registry = Arc::new(BreakerRegistry::default());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry
                        .invoke("users-service", move || async move { Ok::<_, String>(i) })
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].successes, 16);
    }
}
