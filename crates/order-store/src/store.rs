use async_trait::async_trait;
use common::{OrderId, OutboxId, UserId};
use domain::{Order, OrderStatus, OutboxDisposition, OutboxEntry, OutboxStatus};
use serde::Serialize;

use crate::{OutboxQuery, Result};

/// Write and read access to orders.
///
/// Every write that changes an order also records its outbox entry; both
/// become visible together or not at all. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Stores a new order, its items and one outbox entry atomically.
    ///
    /// On any error nothing is stored.
    async fn insert_order_with_outbox(&self, order: &Order, entry: &OutboxEntry) -> Result<()>;

    /// Moves an order to `order.status` if it is currently in `expected`,
    /// recording `entry` in the same transaction.
    ///
    /// Fails with `StatusConflict` if the stored status differs, and with
    /// `OrderNotFound` if the order does not exist.
    async fn update_order_status_with_outbox(
        &self,
        order: &Order,
        expected: OrderStatus,
        entry: &OutboxEntry,
    ) -> Result<()>;

    /// Loads an order with its items.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists every order, newest first.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Lists the orders placed by one user, newest first.
    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>>;
}

/// Access to the outbox, used by the dispatcher.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Returns up to `limit` pending entries, oldest first.
    async fn list_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>>;

    /// Records the outcome of a publication attempt.
    async fn update_outbox_status(&self, id: OutboxId, disposition: &OutboxDisposition)
    -> Result<()>;

    /// Loads a single entry.
    async fn get_outbox_entry(&self, id: OutboxId) -> Result<Option<OutboxEntry>>;

    /// Lists entries matching a query, oldest first.
    async fn query_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxEntry>>;

    /// Counts entries per status.
    async fn outbox_stats(&self) -> Result<OutboxStats>;

    /// Moves up to `limit` failed entries (oldest first) back to pending.
    ///
    /// Returns the number of entries requeued.
    async fn requeue_failed(&self, limit: usize) -> Result<u64>;
}

/// Entry counts per outbox status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    pub pending: u64,
    pub processed: u64,
    pub failed: u64,
}

impl OutboxStats {
    pub(crate) fn record(&mut self, status: OutboxStatus, count: u64) {
        match status {
            OutboxStatus::Pending => self.pending += count,
            OutboxStatus::Processed => self.processed += count,
            OutboxStatus::Failed => self.failed += count,
        }
    }

    /// Total number of entries.
    pub fn total(&self) -> u64 {
        self.pending + self.processed + self.failed
    }
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for std::sync::Arc<T> {
    async fn insert_order_with_outbox(&self, order: &Order, entry: &OutboxEntry) -> Result<()> {
        (**self).insert_order_with_outbox(order, entry).await
    }

    async fn update_order_status_with_outbox(
        &self,
        order: &Order,
        expected: OrderStatus,
        entry: &OutboxEntry,
    ) -> Result<()> {
        (**self)
            .update_order_status_with_outbox(order, expected, entry)
            .await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        (**self).get_order(id).await
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        (**self).list_orders().await
    }

    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        (**self).list_orders_for_user(user_id).await
    }
}

#[async_trait]
impl<T: OutboxStore + ?Sized> OutboxStore for std::sync::Arc<T> {
    async fn list_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        (**self).list_pending_outbox(limit).await
    }

    async fn update_outbox_status(
        &self,
        id: OutboxId,
        disposition: &OutboxDisposition,
    ) -> Result<()> {
        (**self).update_outbox_status(id, disposition).await
    }

    async fn get_outbox_entry(&self, id: OutboxId) -> Result<Option<OutboxEntry>> {
        (**self).get_outbox_entry(id).await
    }

    async fn query_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxEntry>> {
        (**self).query_outbox(query).await
    }

    async fn outbox_stats(&self) -> Result<OutboxStats> {
        (**self).outbox_stats().await
    }

    async fn requeue_failed(&self, limit: usize) -> Result<u64> {
        (**self).requeue_failed(limit).await
    }
}
