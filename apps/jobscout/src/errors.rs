use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::search::SearchError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No job data available: {0}")]
    NoDataAvailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NoDataAvailable { partial_failures } => {
                let detail = if partial_failures.is_empty() {
                    "live search returned no postings and the job store is empty".to_string()
                } else {
                    format!(
                        "every live search failed ({}) and the job store is empty",
                        partial_failures.join("; ")
                    )
                };
                AppError::NoDataAvailable(detail)
            }
            SearchError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NoDataAvailable(msg) => {
                tracing::warn!("No data available: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "NO_DATA_AVAILABLE",
                    msg.clone(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A job store error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
