use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkshopError>;

#[derive(Error, Debug)]
pub enum WorkshopError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient drops: required {required}, available {available}")]
    InsufficientFunds { required: i32, available: i32 },

    #[error("Invalid invite code")]
    InvalidInviteCode,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WorkshopError {
    fn from(err: serde_json::Error) -> Self {
        WorkshopError::Internal(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for WorkshopError {
    fn from(err: std::io::Error) -> Self {
        WorkshopError::Storage(err.to_string())
    }
}

impl ResponseError for WorkshopError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        HttpResponse::build(status_code).json(json!({
            "code": status_code.as_u16(),
            "message": self.to_string(),
            "data": null
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WorkshopError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WorkshopError::Validation(_) => StatusCode::BAD_REQUEST,
            WorkshopError::UserNotFound => StatusCode::NOT_FOUND,
            WorkshopError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkshopError::Conflict(_) => StatusCode::CONFLICT,
            WorkshopError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            WorkshopError::InvalidInviteCode => StatusCode::BAD_REQUEST,
            WorkshopError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WorkshopError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WorkshopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl WorkshopError {
    /// True when the wrapped sqlx error is a unique constraint violation
    /// on the named constraint. Storage-level uniqueness is the authoritative
    /// guard for the read-then-write windows (registration, daily logs);
    /// callers translate these into domain `Conflict`s.
    pub fn is_unique_violation(&self, constraint: &str) -> bool {
        match self {
            WorkshopError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("23505")
                    && db_err.constraint() == Some(constraint)
            }
            _ => false,
        }
    }
}
