use std::time::Duration;

use thiserror::Error;

/// Errors returned by a call made through a circuit breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open (or a recovery probe is already in flight); the
    /// action was not invoked.
    #[error("Circuit breaker '{name}' is open")]
    Open { name: String },

    /// The action did not finish within the breaker's timeout. It may still
    /// complete in the background; its result is discarded.
    #[error("Call to '{name}' timed out after {after:?}")]
    Timeout { name: String, after: Duration },

    /// The action's task was cancelled before producing a result.
    #[error("Call to '{name}' was cancelled")]
    Cancelled { name: String },

    /// The action ran and returned an error.
    #[error("{0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without invoking the action.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Returns true if the call timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Returns the action's own error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(err) => Some(err),
            _ => None,
        }
    }

    /// Maps the action's error, keeping breaker-level errors as they are.
    pub fn map_inner<F, O>(self, f: O) -> BreakerError<F>
    where
        O: FnOnce(E) -> F,
    {
        match self {
            BreakerError::Open { name } => BreakerError::Open { name },
            BreakerError::Timeout { name, after } => BreakerError::Timeout { name, after },
            BreakerError::Cancelled { name } => BreakerError::Cancelled { name },
            BreakerError::Inner(err) => BreakerError::Inner(f(err)),
        }
    }
}
