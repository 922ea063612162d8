use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Main error type for the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found error (book, author, series, format).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unknown grouping key in `/opds/by-{grouping}`.
    #[error("Unknown grouping: {0}")]
    InvalidGrouping(String),

    /// Unknown sort key in `/opds/books/{sort}`.
    #[error("Unknown sort: {0}")]
    InvalidSort(String),

    /// Malformed request parameters.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// SQLite error from the catalog database.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XML serialization error.
    #[error("XML error: {0}")]
    Xml(String),

    /// Image encoding error.
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) | AppError::InvalidGrouping(_) => StatusCode::NOT_FOUND,
            AppError::InvalidSort(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Client errors echo their message; server errors stay opaque.
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "Request error");
            "Internal server error".to_string()
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
            self.to_string()
        };

        (status, body).into_response()
    }
}

/// Result type alias for the application.
pub type Result<T> = std::result::Result<T, AppError>;
