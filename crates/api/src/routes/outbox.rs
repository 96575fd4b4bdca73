//! Outbox diagnostics and remediation.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use order_store::OutboxStats;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_REQUEUE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct RequeueParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RequeueResponse {
    pub requeued: u64,
}

/// GET /outbox/stats: entry counts per status.
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<OutboxStats>, ApiError> {
    let stats = state.outbox.outbox_stats().await?;

    metrics::gauge!("outbox_entries", "status" => "PENDING").set(stats.pending as f64);
    metrics::gauge!("outbox_entries", "status" => "FAILED").set(stats.failed as f64);

    Ok(Json(stats))
}

/// POST /outbox/requeue?limit=N: moves failed entries back to pending.
#[tracing::instrument(skip(state))]
pub async fn requeue(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RequeueParams>,
) -> Result<Json<RequeueResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_REQUEUE_LIMIT);
    let requeued = state.outbox.requeue_failed(limit).await?;

    tracing::info!(requeued, "Requeued failed outbox entries");
    Ok(Json(RequeueResponse { requeued }))
}
