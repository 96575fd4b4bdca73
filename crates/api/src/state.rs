//! Shared application state.

use std::sync::Arc;

use order_store::{OrderStore, OutboxStore};
use orders::OrderOrchestrator;
use resilience::BreakerRegistry;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: OrderOrchestrator<Arc<dyn OrderStore>>,
    pub outbox: Arc<dyn OutboxStore>,
    pub breakers: Arc<BreakerRegistry>,
}

impl AppState {
    pub fn new(
        orders: OrderOrchestrator<Arc<dyn OrderStore>>,
        outbox: Arc<dyn OutboxStore>,
        breakers: Arc<BreakerRegistry>,
    ) -> Arc<Self> {
        Arc::new(Self {
            orders,
            outbox,
            breakers,
        })
    }
}
