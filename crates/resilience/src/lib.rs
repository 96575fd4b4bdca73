//! Circuit breakers for calls to remote dependencies.
//!
//! A [`BreakerRegistry`] owns one [`CircuitBreaker`] per dependency name,
//! created on first use. Each breaker fails fast while its dependency is
//! unhealthy and probes for recovery after a cool-down:
//!
//! ```text
//! CLOSED ──(error rate ≥ threshold)──► OPEN
//!    ▲                                   │ reset timeout
//!    │                                   ▼
//!    └──────(probe succeeds)────────  HALF_OPEN ──(probe fails)──► OPEN
//! ```

pub mod breaker;
pub mod error;
pub mod options;
pub mod registry;
mod window;

pub use breaker::{BreakerEvent, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use error::BreakerError;
pub use options::BreakerOptions;
pub use registry::BreakerRegistry;
