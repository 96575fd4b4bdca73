use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{OrderId, OutboxId, UserId};
use domain::{Order, OrderStatus, OutboxDisposition, OutboxEntry, OutboxStatus};
use tokio::sync::RwLock;

use crate::{
    OutboxQuery, Result, StoreError,
    store::{OrderStore, OutboxStats, OutboxStore},
};

#[derive(Default)]
struct State {
    orders: Vec<Order>,
    outbox: Vec<OutboxEntry>,
}

/// In-memory order store for tests and local runs.
///
/// Writes happen under a single lock, so an order and its outbox entry are
/// always visible together. Failures can be injected to exercise rollback
/// paths.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
    fail_writes: Arc<AtomicBool>,
    fail_outbox_updates: Arc<AtomicBool>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes order writes fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes outbox status updates fail with [`StoreError::Unavailable`].
    pub fn set_fail_outbox_updates(&self, fail: bool) {
        self.fail_outbox_updates.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns a copy of every outbox entry, in insertion order.
    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.clone()
    }

    /// Appends an outbox entry without an owning order.
    pub async fn insert_outbox_entry(&self, entry: OutboxEntry) {
        self.state.write().await.outbox.push(entry);
    }

    /// Removes all orders and outbox entries.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.outbox.clear();
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

fn newest_first<'a>(orders: impl DoubleEndedIterator<Item = &'a Order>) -> Vec<Order> {
    let mut orders: Vec<Order> = orders.rev().cloned().collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert_order_with_outbox(&self, order: &Order, entry: &OutboxEntry) -> Result<()> {
        self.check_writes()?;

        let mut state = self.state.write().await;
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(StoreError::DuplicateOrder(order.id));
        }

        state.orders.push(order.clone());
        state.outbox.push(entry.clone());
        Ok(())
    }

    async fn update_order_status_with_outbox(
        &self,
        order: &Order,
        expected: OrderStatus,
        entry: &OutboxEntry,
    ) -> Result<()> {
        self.check_writes()?;

        let mut state = self.state.write().await;
        let stored = state
            .orders
            .iter_mut()
            .find(|o| o.id == order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;

        if stored.status != expected {
            return Err(StoreError::StatusConflict {
                order_id: order.id,
                expected,
                actual: stored.status,
            });
        }

        stored.status = order.status;
        stored.updated_at = order.updated_at;
        state.outbox.push(entry.clone());
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(state.orders.iter()))
    }

    async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(
            state.orders.iter().filter(|o| &o.user_id == user_id),
        ))
    }
}

#[async_trait]
impl OutboxStore for InMemoryOrderStore {
    async fn list_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEntry>> {
        self.query_outbox(OutboxQuery::with_status(OutboxStatus::Pending).limit(limit))
            .await
    }

    async fn update_outbox_status(
        &self,
        id: OutboxId,
        disposition: &OutboxDisposition,
    ) -> Result<()> {
        if self.fail_outbox_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "outbox updates disabled".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let entry = state
            .outbox
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(StoreError::OutboxEntryNotFound(id))?;
        entry.apply(disposition);
        Ok(())
    }

    async fn get_outbox_entry(&self, id: OutboxId) -> Result<Option<OutboxEntry>> {
        let state = self.state.read().await;
        Ok(state.outbox.iter().find(|e| e.id == id).cloned())
    }

    async fn query_outbox(&self, query: OutboxQuery) -> Result<Vec<OutboxEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .outbox
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        entries.sort_by_key(|e| e.created_at);

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(entries.into_iter().skip(offset).take(limit).collect())
    }

    async fn outbox_stats(&self) -> Result<OutboxStats> {
        let state = self.state.read().await;
        let mut stats = OutboxStats::default();
        for entry in &state.outbox {
            stats.record(entry.status, 1);
        }
        Ok(stats)
    }

    async fn requeue_failed(&self, limit: usize) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut failed: Vec<&mut OutboxEntry> = state
            .outbox
            .iter_mut()
            .filter(|e| e.status == OutboxStatus::Failed)
            .collect();
        failed.sort_by_key(|e| e.created_at);

        let mut requeued = 0;
        for entry in failed.into_iter().take(limit) {
            entry.requeue();
            requeued += 1;
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, OrderCreated, OrderItem, OrderPaid, PricingPolicy};

    fn place(user: &str) -> (Order, OutboxEntry) {
        let order = Order::place(
            UserId::new(user),
            vec![OrderItem::new("p1", "Widget", 2, Money::from_dollars(10))],
            &PricingPolicy::default(),
            None,
            None,
        )
        .unwrap();
        let entry = OutboxEntry::for_event(&OrderCreated::from_order(&order)).unwrap();
        (order, entry)
    }

    #[tokio::test]
    async fn test_insert_and_get_order() {
        let store = InMemoryOrderStore::new();
        let (order, entry) = place("u1");

        store.insert_order_with_outbox(&order, &entry).await.unwrap();

        let loaded = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
        assert_eq!(store.outbox_entries().await, vec![entry]);
    }

    #[tokio::test]
    async fn test_failed_write_stores_nothing() {
        let store = InMemoryOrderStore::new();
        store.set_fail_writes(true);
        let (order, entry) = place("u1");

        let result = store.insert_order_with_outbox(&order, &entry).await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.order_count().await, 0);
        assert!(store.outbox_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_order_rejected() {
        let store = InMemoryOrderStore::new();
        let (order, entry) = place("u1");
        store.insert_order_with_outbox(&order, &entry).await.unwrap();

        let result = store.insert_order_with_outbox(&order, &entry).await;

        assert!(matches!(result, Err(StoreError::DuplicateOrder(id)) if id == order.id));
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_list_orders_newest_first_and_by_user() {
        let store = InMemoryOrderStore::new();
        let (first, e1) = place("u1");
        let (second, e2) = place("u2");
        let (third, e3) = place("u1");
        store.insert_order_with_outbox(&first, &e1).await.unwrap();
        store.insert_order_with_outbox(&second, &e2).await.unwrap();
        store.insert_order_with_outbox(&third, &e3).await.unwrap();

        let all: Vec<_> = store
            .list_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(all, vec![third.id, second.id, first.id]);

        let mine: Vec<_> = store
            .list_orders_for_user(&UserId::new("u1"))
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(mine, vec![third.id, first.id]);
    }

    #[tokio::test]
    async fn test_status_update_is_compare_and_set() {
        let store = InMemoryOrderStore::new();
        let (mut order, entry) = place("u1");
        store.insert_order_with_outbox(&order, &entry).await.unwrap();

        order.transition_to(OrderStatus::Paid).unwrap();
        let paid = OutboxEntry::for_event(&OrderPaid::from_order(&order)).unwrap();
        store
            .update_order_status_with_outbox(&order, OrderStatus::Pending, &paid)
            .await
            .unwrap();

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
        assert_eq!(store.outbox_entries().await.len(), 2);

        let again = store
            .update_order_status_with_outbox(&order, OrderStatus::Pending, &paid)
            .await;
        assert!(matches!(
            again,
            Err(StoreError::StatusConflict {
                actual: OrderStatus::Paid,
                ..
            })
        ));
        assert_eq!(store.outbox_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn test_pending_outbox_is_oldest_first_and_limited() {
        let store = InMemoryOrderStore::new();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let (order, entry) = place("u1");
            ids.push(entry.id);
            store.insert_order_with_outbox(&order, &entry).await.unwrap();
        }

        let pending = store.list_pending_outbox(3).await.unwrap();
        let pending_ids: Vec<_> = pending.iter().map(|e| e.id).collect();
        assert_eq!(pending_ids, &ids[..3]);
    }

    #[tokio::test]
    async fn test_update_outbox_status_and_stats() {
        let store = InMemoryOrderStore::new();
        let (o1, e1) = place("u1");
        let (o2, e2) = place("u1");
        let (o3, e3) = place("u1");
        store.insert_order_with_outbox(&o1, &e1).await.unwrap();
        store.insert_order_with_outbox(&o2, &e2).await.unwrap();
        store.insert_order_with_outbox(&o3, &e3).await.unwrap();

        store
            .update_outbox_status(e1.id, &OutboxDisposition::processed_now())
            .await
            .unwrap();
        store
            .update_outbox_status(e2.id, &OutboxDisposition::failed("broker down"))
            .await
            .unwrap();

        let stats = store.outbox_stats().await.unwrap();
        assert_eq!(
            stats,
            OutboxStats {
                pending: 1,
                processed: 1,
                failed: 1
            }
        );

        let failed = store.get_outbox_entry(e2.id).await.unwrap().unwrap();
        assert_eq!(failed.error.as_deref(), Some("broker down"));

        let missing = store
            .update_outbox_status(OutboxId::new(), &OutboxDisposition::processed_now())
            .await;
        assert!(matches!(missing, Err(StoreError::OutboxEntryNotFound(_))));
    }

    #[tokio::test]
    async fn test_requeue_failed() {
        let store = InMemoryOrderStore::new();
        let (order, entry) = place("u1");
        store.insert_order_with_outbox(&order, &entry).await.unwrap();
        store
            .update_outbox_status(entry.id, &OutboxDisposition::failed("nope"))
            .await
            .unwrap();

        assert_eq!(store.requeue_failed(10).await.unwrap(), 1);
        assert_eq!(store.requeue_failed(10).await.unwrap(), 0);

        let pending = store.list_pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].error.is_none());
    }

    #[tokio::test]
    async fn test_fail_outbox_updates_leaves_entry_pending() {
        let store = InMemoryOrderStore::new();
        let (order, entry) = place("u1");
        store.insert_order_with_outbox(&order, &entry).await.unwrap();
        store.set_fail_outbox_updates(true);

        let result = store
            .update_outbox_status(entry.id, &OutboxDisposition::processed_now())
            .await;

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        let stored = store.get_outbox_entry(entry.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OutboxStatus::Pending);
    }
}
