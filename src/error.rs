// HTTP-facing error type. Library modules return their own thiserror enums;
// handlers convert them here so status codes are decided in one place.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::sort_view::PreferenceError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

// Implement conversion from anyhow::Error for easier error propagation
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<PreferenceError> for AppError {
    fn from(error: PreferenceError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::ComparisonFull => AppError::Conflict(error.to_string()),
            StoreError::UnknownNotification(_) => AppError::NotFound(error.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::NotFound(message) => {
                tracing::debug!("Not found: {}", message);
                (StatusCode::NOT_FOUND, message)
            }
            AppError::BadRequest(message) => {
                tracing::warn!("Bad request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::Conflict(message) => {
                tracing::warn!("Conflict: {}", message);
                (StatusCode::CONFLICT, message)
            }
        };

        (status, Json(json!({ "success": false, "error": error_message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_statuses() {
        let full = AppError::from(StoreError::ComparisonFull).into_response();
        assert_eq!(full.status(), StatusCode::CONFLICT);

        let missing = AppError::from(StoreError::UnknownNotification("n1".into())).into_response();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad = AppError::from(PreferenceError::InvalidPageSize(0)).into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_errors_are_masked() {
        let response = AppError::from(anyhow::anyhow!("disk on fire")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
