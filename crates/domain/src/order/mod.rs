//! Order records, lifecycle and pricing.

mod model;
mod pricing;
mod status;

pub use model::{MAX_QUANTITY, Order, OrderItem};
pub use pricing::{PriceBreakdown, PricingPolicy};
pub use status::OrderStatus;
