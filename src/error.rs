//! Error types for Book Journey server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::Genre;

/// Application error codes exposed in API error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    DbFailure = 3,
    NoSuchBook = 5,
    Duplicate = 8,
    BadValue = 18,
    BestsellerNotFound = 30,
    CatalogFailure = 31,
    CatalogMalformed = 32,
    CatalogParse = 33,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    /// No book is currently flagged as bestseller for the genre.
    #[error("No current bestseller for genre {0}")]
    PreconditionMissing(Genre),

    /// Transport error, timeout or non-success status from the catalog.
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// The catalog answered but the body failed structural validation.
    #[error("Catalog returned a malformed response: {0}")]
    CatalogMalformedResponse(String),

    /// The payload does not yield an identifying code or a book record.
    #[error("Failed to parse catalog payload: {0}")]
    Parse(String),
}

impl AppError {
    /// True for failures that abort a single genre of a reconciliation run
    pub fn is_genre_failure(&self) -> bool {
        matches!(
            self,
            AppError::PreconditionMissing(_)
                | AppError::CatalogUnavailable(_)
                | AppError::CatalogMalformedResponse(_)
                | AppError::Parse(_)
        )
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
            AppError::PreconditionMissing(_) => (
                StatusCode::NOT_FOUND,
                ErrorCode::BestsellerNotFound,
                self.to_string(),
            ),
            AppError::CatalogUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, ErrorCode::CatalogFailure, msg.clone())
            }
            AppError::CatalogMalformedResponse(msg) => {
                (StatusCode::BAD_GATEWAY, ErrorCode::CatalogMalformed, msg.clone())
            }
            AppError::Parse(msg) => (StatusCode::BAD_GATEWAY, ErrorCode::CatalogParse, msg.clone()),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
