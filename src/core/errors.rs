use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::templates;

/// Failures talking to the database. Never retried; every one of them ends
/// the request with a 500.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database pool is not registered with the application")]
    PoolMissing,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("login required")]
    AuthenticationRequired { login_url: String },
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BlogError {
    fn from(err: sqlx::Error) -> Self {
        BlogError::Storage(StorageError::Sqlx(err))
    }
}

impl From<anyhow::Error> for BlogError {
    fn from(err: anyhow::Error) -> Self {
        BlogError::Internal(err.to_string())
    }
}

impl ResponseError for BlogError {
    fn status_code(&self) -> StatusCode {
        match self {
            BlogError::AuthenticationRequired { .. } => StatusCode::FOUND,
            BlogError::Forbidden => StatusCode::FORBIDDEN,
            BlogError::NotFound(_) => StatusCode::NOT_FOUND,
            BlogError::Storage(_) | BlogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        match self {
            BlogError::AuthenticationRequired { login_url } => HttpResponse::Found()
                .insert_header((header::LOCATION, login_url.as_str()))
                .finish(),
            // internals stay in the log, not in the page
            BlogError::Storage(_) | BlogError::Internal(_) => HttpResponse::build(status)
                .content_type("text/html; charset=utf-8")
                .body(templates::render_error(status, "Something went wrong on our side.")),
            BlogError::Forbidden => HttpResponse::build(status)
                .content_type("text/html; charset=utf-8")
                .body(templates::render_error(status, "You are not allowed to do that.")),
            BlogError::NotFound(msg) => HttpResponse::build(status)
                .content_type("text/html; charset=utf-8")
                .body(templates::render_error(status, msg)),
        }
    }
}
