//! Remote user and product lookups.
//!
//! Each dependency has a transport trait ([`UserDirectory`],
//! [`ProductCatalog`]) with in-memory and HTTP implementations, and a client
//! ([`UsersClient`], [`ProductsClient`]) that routes every call through the
//! shared breaker registry and folds the outcome into a [`LookupResult`].

mod http;
pub mod products;
pub mod users;

use std::time::Duration;

use resilience::BreakerError;
use thiserror::Error;

pub use products::{
    HttpProductCatalog, InMemoryProductCatalog, PRODUCTS_SERVICE, Product, ProductCatalog,
    ProductsClient,
};
pub use users::{
    HttpUserDirectory, InMemoryUserDirectory, USERS_SERVICE, User, UserDirectory, UsersClient,
};

/// A failure talking to a remote service. A legitimate "not found" is not a
/// transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The base URL could not be turned into a request URL.
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// The request could not be sent or the connection failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// The service answered with an unexpected status code.
    #[error("Unexpected status {0}")]
    Status(u16),

    /// The response body could not be decoded.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The service is unreachable (used by test doubles).
    #[error("Service unreachable")]
    Unreachable,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TransportError::Decode(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Why a dependency could not answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyFailure {
    /// The circuit breaker rejected the call.
    #[error("circuit open")]
    CircuitOpen,

    /// The call exceeded the breaker timeout.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before it finished.
    #[error("call cancelled")]
    Cancelled,

    /// The call ran and failed.
    #[error("{0}")]
    Transport(TransportError),
}

impl From<BreakerError<TransportError>> for DependencyFailure {
    fn from(err: BreakerError<TransportError>) -> Self {
        match err {
            BreakerError::Open { .. } => DependencyFailure::CircuitOpen,
            BreakerError::Timeout { after, .. } => DependencyFailure::Timeout(after),
            BreakerError::Cancelled { .. } => DependencyFailure::Cancelled,
            BreakerError::Inner(err) => DependencyFailure::Transport(err),
        }
    }
}

/// Outcome of a breaker-guarded lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupResult<T> {
    Found(T),
    NotFound,
    Unavailable(DependencyFailure),
}

impl<T> LookupResult<T> {
    fn from_call(result: Result<Option<T>, BreakerError<TransportError>>) -> Self {
        match result {
            Ok(Some(value)) => LookupResult::Found(value),
            Ok(None) => LookupResult::NotFound,
            Err(err) => LookupResult::Unavailable(err.into()),
        }
    }

    /// Returns the value if it was found.
    pub fn found(self) -> Option<T> {
        match self {
            LookupResult::Found(value) => Some(value),
            _ => None,
        }
    }
}
