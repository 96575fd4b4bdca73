//! Outbox dispatching.
//!
//! This crate provides the publishing side of the transactional outbox:
//! - [`EventPublisher`] trait for handing messages to a broker
//! - [`LogPublisher`] and [`InMemoryPublisher`] implementations
//! - [`OutboxDispatcher`] that sweeps pending entries on a fixed interval

pub mod dispatcher;
pub mod error;
pub mod publisher;

pub use dispatcher::{DispatcherConfig, OutboxDispatcher, SweepReport};
pub use error::{OutboxError, PublishError, Result};
pub use publisher::{EventPublisher, InMemoryPublisher, LogPublisher, OutboxMessage};
