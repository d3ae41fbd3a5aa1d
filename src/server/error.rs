use crate::error::{ImportError, StoreError};
use axum::{
    extract::multipart::MultipartError,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Import error: {0}")]
    Import(#[from] ImportError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Invalid JSON body: {0}")]
    Json(#[from] JsonRejection),
    #[error("Background task failed: {0}")]
    Task(#[from] JoinError),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn admin_required() -> Self {
        ApiError::Forbidden("Admin access required".to_string())
    }

    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Store(StoreError::NotFound(message)) => (StatusCode::NOT_FOUND, message),
            // the frontend expects 400 for duplicates
            ApiError::Store(StoreError::Conflict(message)) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(store_err) => {
                tracing::error!(error = ?store_err, "Database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Import(ImportError::Store(store_err)) => {
                tracing::error!(error = ?store_err, "Database error during import.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::Import(import_err) => (StatusCode::BAD_REQUEST, import_err.to_string()),
            ApiError::Multipart(multipart_err) => (multipart_err.status(), multipart_err.body_text()),
            ApiError::Json(rejection) => (rejection.status(), rejection.body_text()),
            ApiError::Task(join_err) => {
                tracing::error!(error = ?join_err, "Store task failed.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
        }
    }
}

/// Converts an `ApiError` into a `{"error": ...}` JSON response.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}
