use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("Ticket not found: {0}")]
    NotFound(Uuid),

    #[error("Not authorized to modify ticket {0}")]
    NotOwner(Uuid),

    #[error("No waiting tickets in the queue")]
    QueueEmpty,

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

pub type TicketResult<T> = Result<T, TicketError>;

/// Convert TicketError to AppError for standardized error responses
impl From<TicketError> for AppError {
    fn from(err: TicketError) -> Self {
        match err {
            TicketError::NotFound(id) => AppError::NotFound(format!("Ticket {} not found", id)),
            TicketError::NotOwner(id) => {
                AppError::Forbidden(format!("Access denied to ticket {}", id))
            }
            TicketError::QueueEmpty => {
                AppError::NotFound("No waiting tickets in the queue".to_string())
            }
            TicketError::Validation(msg) => AppError::BadRequest(msg),
            TicketError::Database(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for TicketError {
    fn into_response(self) -> Response {
        // Convert to AppError for the standardized error response format
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

impl From<mongodb::error::Error> for TicketError {
    fn from(err: mongodb::error::Error) -> Self {
        TicketError::Database(err.to_string())
    }
}

impl From<mongodb::bson::ser::Error> for TicketError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        TicketError::Database(err.to_string())
    }
}
