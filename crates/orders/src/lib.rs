//! The order-creation use case.
//!
//! [`OrderOrchestrator`] validates the user and every product through
//! breaker-guarded remote lookups ([`UsersClient`], [`ProductsClient`]),
//! prices the order, and stores it together with its `order.created` outbox
//! entry in one transaction.

pub mod error;
pub mod orchestrator;
pub mod services;

pub use error::{ErrorClass, OrderError, Result};
pub use orchestrator::{CreateOrderRequest, OrderOrchestrator, RequestedItem};
pub use services::{
    DependencyFailure, HttpProductCatalog, HttpUserDirectory, InMemoryProductCatalog,
    InMemoryUserDirectory, LookupResult, PRODUCTS_SERVICE, Product, ProductCatalog,
    ProductsClient, TransportError, USERS_SERVICE, User, UserDirectory, UsersClient,
};
