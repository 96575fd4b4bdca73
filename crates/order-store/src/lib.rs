//! Storage for orders and their outbox entries.
//!
//! The [`OrderStore`] write path stores an order together with its outbox
//! entry in one transaction; the [`OutboxStore`] side is read and updated by
//! the dispatcher.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod transaction;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::OutboxQuery;
pub use store::{OrderStore, OutboxStats, OutboxStore};
pub use transaction::with_transaction;
