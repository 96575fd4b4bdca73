//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use resilience::BreakerState;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `ok`, or `degraded` while any dependency breaker is not closed.
    pub status: &'static str,
    pub open_breakers: Vec<String>,
}

/// GET /health: returns service health and any tripped dependencies.
///
/// Always answers 200; an open breaker degrades order creation, not the
/// service itself.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let open_breakers: Vec<String> = state
        .breakers
        .snapshot()
        .await
        .into_iter()
        .filter(|snapshot| snapshot.state != BreakerState::Closed)
        .map(|snapshot| snapshot.name)
        .collect();

    let status = if open_breakers.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        open_breakers,
    })
}
