//! HTTP API server for order creation.
//!
//! Provides REST endpoints for creating, querying and paying orders, plus
//! breaker and outbox diagnostics, with structured logging (tracing) and
//! Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::ApiError;
pub use state::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/my-orders", get(routes::orders::list_mine))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}/pay", patch(routes::orders::pay))
        .route("/breakers", get(routes::breakers::list))
        .route("/outbox/stats", get(routes::outbox::stats))
        .route("/outbox/requeue", post(routes::outbox::requeue))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
