//! Order creation and lifecycle use cases.

use std::time::Instant;

use common::{OrderId, ProductId, UserId};
use domain::{
    MAX_QUANTITY, Money, Order, OrderCreated, OrderItem, OrderPaid, OrderStatus, OutboxEntry,
    PricingPolicy,
};
use order_store::{OrderStore, StoreError};

use crate::error::{OrderError, Result};
use crate::services::{LookupResult, Product, ProductsClient, UsersClient};

/// A line of a new order as requested by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price the client believes the product has. Never used for pricing.
    pub price: Option<Money>,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            price: None,
        }
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = Some(price);
        self
    }
}

/// Input of [`OrderOrchestrator::create_order`].
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<RequestedItem>,
    pub shipping_address: Option<serde_json::Value>,
    pub payment_method: Option<String>,
}

impl CreateOrderRequest {
    pub fn new(user_id: impl Into<UserId>, items: Vec<RequestedItem>) -> Self {
        Self {
            user_id: user_id.into(),
            items,
            shipping_address: None,
            payment_method: None,
        }
    }
}

/// Runs the order use cases against a store and the remote validators.
///
/// A failed `create_order` never leaves a persisted row behind; a successful
/// one always stores the order together with exactly one `order.created`
/// outbox entry.
pub struct OrderOrchestrator<S: OrderStore> {
    store: S,
    users: UsersClient,
    products: ProductsClient,
    pricing: PricingPolicy,
}

impl<S: OrderStore> OrderOrchestrator<S> {
    pub fn new(store: S, users: UsersClient, products: ProductsClient) -> Self {
        Self {
            store,
            users,
            products,
            pricing: PricingPolicy::default(),
        }
    }

    /// Uses `pricing` for tax and shipping on new orders.
    pub fn with_pricing(mut self, pricing: PricingPolicy) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates the user and products, prices the order with the catalog's
    /// prices, and stores it with its `order.created` outbox entry.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id, items = request.items.len()))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        let started = Instant::now();
        let result = self.try_create_order(request).await;

        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(order_id = %order.id, total = %order.total, "Order created");
            }
            Err(err) => {
                metrics::counter!("order_creation_failures_total", "reason" => err.reason())
                    .increment(1);
                if err.is_retryable() {
                    tracing::warn!(error = %err, "Order creation aborted, dependency unavailable");
                } else {
                    tracing::info!(error = %err, "Order creation rejected");
                }
            }
        }
        metrics::histogram!("order_creation_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        result
    }

    async fn try_create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        validate_items(&request.items)?;

        match self.users.find_user(&request.user_id).await {
            LookupResult::Found(_) => {}
            LookupResult::NotFound => return Err(OrderError::UserNotFound(request.user_id)),
            LookupResult::Unavailable(reason) => {
                return Err(OrderError::UserUnavailable {
                    user_id: request.user_id,
                    reason,
                });
            }
        }

        let products = self.validate_products(&request.items).await?;

        let items = request
            .items
            .iter()
            .map(|requested| -> Result<OrderItem> {
                let product = products
                    .iter()
                    .find(|p| p.id == requested.product_id)
                    .ok_or_else(|| OrderError::ProductNotFound(requested.product_id.clone()))?;

                if let Some(claimed) = requested.price
                    && claimed != product.price
                {
                    tracing::debug!(
                        product_id = %product.id,
                        claimed = %claimed,
                        actual = %product.price,
                        "Ignoring client-supplied price"
                    );
                }

                Ok(OrderItem::new(
                    product.id.clone(),
                    product.name.clone(),
                    requested.quantity,
                    product.price,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let order = Order::place(
            request.user_id,
            items,
            &self.pricing,
            request.shipping_address,
            request.payment_method,
        )?;
        let entry = OutboxEntry::for_event(&OrderCreated::from_order(&order))?;

        self.store.insert_order_with_outbox(&order, &entry).await?;
        Ok(order)
    }

    /// Looks up each distinct product once and checks its stock against the
    /// total quantity requested for it.
    async fn validate_products(&self, items: &[RequestedItem]) -> Result<Vec<Product>> {
        let mut wanted: Vec<(&ProductId, u32)> = Vec::new();
        for item in items {
            match wanted.iter_mut().find(|(id, _)| *id == &item.product_id) {
                Some((_, quantity)) => *quantity = quantity.saturating_add(item.quantity),
                None => wanted.push((&item.product_id, item.quantity)),
            }
        }

        let mut products = Vec::with_capacity(wanted.len());
        for (product_id, requested) in wanted {
            let product = match self.products.find_product(product_id).await {
                LookupResult::Found(product) => product,
                LookupResult::NotFound => {
                    return Err(OrderError::ProductNotFound(product_id.clone()));
                }
                LookupResult::Unavailable(reason) => {
                    return Err(OrderError::ProductUnavailable {
                        product_id: product_id.clone(),
                        reason,
                    });
                }
            };

            if product.stock < requested {
                return Err(OrderError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested,
                    available: product.stock,
                });
            }
            products.push(product);
        }

        Ok(products)
    }

    /// Returns an order with its items.
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.store
            .get_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))
    }

    /// Lists every order, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        Ok(self.store.list_orders().await?)
    }

    /// Lists one user's orders, newest first.
    pub async fn list_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        Ok(self.store.list_orders_for_user(user_id).await?)
    }

    /// Records a (simulated) payment: moves the order to `PAID` and stores
    /// an `order.paid` outbox entry in the same transaction.
    #[tracing::instrument(skip(self))]
    pub async fn pay_order(&self, id: OrderId) -> Result<Order> {
        let mut order = self.get_order(id).await?;
        let previous = order.status;

        order
            .transition_to(OrderStatus::Paid)
            .map_err(|_| OrderError::InvalidStatusTransition {
                order_id: id,
                from: previous,
                to: OrderStatus::Paid,
            })?;
        let entry = OutboxEntry::for_event(&OrderPaid::from_order(&order))?;

        match self
            .store
            .update_order_status_with_outbox(&order, previous, &entry)
            .await
        {
            Ok(()) => {
                tracing::info!(order_id = %id, "Order paid");
                Ok(order)
            }
            Err(StoreError::StatusConflict { actual, .. }) => {
                Err(OrderError::InvalidStatusTransition {
                    order_id: id,
                    from: actual,
                    to: OrderStatus::Paid,
                })
            }
            Err(StoreError::OrderNotFound(_)) => Err(OrderError::OrderNotFound(id)),
            Err(err) => Err(err.into()),
        }
    }
}

fn validate_items(items: &[RequestedItem]) -> Result<()> {
    if items.is_empty() {
        return Err(OrderError::EmptyOrder);
    }
    if let Some(item) = items
        .iter()
        .find(|item| !(1..=MAX_QUANTITY).contains(&item.quantity))
    {
        return Err(OrderError::InvalidQuantity {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        });
    }
    Ok(())
}
