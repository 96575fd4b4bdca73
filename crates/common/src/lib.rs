//! Identifier types shared by every crate in the order service.

pub mod types;

pub use types::{OrderId, OutboxId, ProductId, UserId};
