//! Shared API error type and health handler.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use mqwatch_store::StoreError;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("{0}")]
    Overloaded(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Query(e) => ApiError::BadRequest(e.to_string()),
            StoreError::Overloaded => ApiError::Overloaded(err.to_string()),
            StoreError::Timeout(_) => ApiError::Timeout(err.to_string()),
            StoreError::Closed => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Overloaded(_) | ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        let overloaded = matches!(self, ApiError::Overloaded(_));

        let body = Json(json!({
            "error": self.to_string()
        }));

        let mut response = (status, body).into_response();
        if overloaded {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

/// Handler for `GET /health`.
///
/// Reports the server version and the buffer counters.
pub async fn health_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let stats = state.store.stats().await?;
    Ok(Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "total_received": stats.total_received,
        "buffered": stats.buffered,
        "capacity": stats.capacity,
    })))
}
