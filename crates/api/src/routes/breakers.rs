//! Circuit breaker diagnostics.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use resilience::BreakerSnapshot;

use crate::state::AppState;

/// GET /breakers: state and rolling counters of every breaker.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<BreakerSnapshot>> {
    Json(state.breakers.snapshot().await)
}
