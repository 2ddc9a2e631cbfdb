use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

pub type AppResult<T> = Result<T, AppError>;

/// AppError
///
/// Every failure a handler can end in. Client-facing variants map to their status
/// code; server faults are logged here and answered with a generic error page so no
/// internal detail reaches the client.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("authentication required")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("identity provider error: {0}")]
    IdentityProvider(String),
    #[error("service unavailable: {0}")]
    Unavailable(&'static str),
}

/// ErrorPage
///
/// Body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorPage {
    pub status: u16,
    pub error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Storage(_) | AppError::IdentityProvider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
                .to_string()
        } else {
            self.to_string()
        };

        let page = ErrorPage {
            status: status.as_u16(),
            error,
        };
        (status, Json(page)).into_response()
    }
}

/// Fallback for unknown routes: the same not-found page as a missing entity.
pub async fn page_not_found() -> AppError {
    AppError::NotFound("page")
}

/// True when a database error is a unique-constraint violation.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}
