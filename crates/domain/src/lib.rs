//! Domain model for the order service.
//!
//! This crate provides the records persisted by the order store and the
//! rules that apply when they are created:
//! - [`Order`] and [`OrderItem`] with frozen pricing
//! - [`OrderStatus`] lifecycle
//! - [`OutboxEntry`] and its [`OutboxStatus`] disposition
//! - Event payloads published through the outbox

pub mod clock;
pub mod error;
pub mod events;
pub mod money;
pub mod order;
pub mod outbox;

pub use common::{OrderId, OutboxId, ProductId, UserId};
pub use error::DomainError;
pub use events::{ORDER_CREATED, ORDER_PAID, OrderCreated, OrderPaid, OutboxEvent};
pub use money::Money;
pub use order::{MAX_QUANTITY, Order, OrderItem, OrderStatus, PriceBreakdown, PricingPolicy};
pub use outbox::{OutboxDisposition, OutboxEntry, OutboxStatus};
