//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use order_store::StoreError;
use orders::{ErrorClass, OrderError};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request the handler rejected itself.
    #[error("{0}")]
    BadRequest(String),

    /// Order use-case error, mapped by its class.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Storage error outside an order use case.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Order(err) => match err.class() {
                ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
                ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorClass::NotFound => StatusCode::NOT_FOUND,
                ErrorClass::Conflict => StatusCode::CONFLICT,
                ErrorClass::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!(error = %message, "internal server error");
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                tracing::warn!(error = %message, "dependency unavailable");
            }
            _ => {}
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}
