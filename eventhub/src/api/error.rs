//! `BookingError` → HTTP.

use crate::error::{BookingError, ErrorKind};
use axum::http::StatusCode;
use eventhub_web::AppError;

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Validation => Self::validation(message),
            ErrorKind::Authentication => Self::unauthorized(message),
            ErrorKind::Forbidden => Self::forbidden(message),
            ErrorKind::NotFound => Self::new(StatusCode::NOT_FOUND, message, "NOT_FOUND".to_string()),
            ErrorKind::ExternalDependency => Self::retry_later(message),
            ErrorKind::Invariant | ErrorKind::Storage => {
                Self::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            }
        }
    }
}

/// Webhook variant: authentication failures are a plain 400.
pub(super) fn webhook_error(err: BookingError) -> AppError {
    match err.kind() {
        ErrorKind::Authentication | ErrorKind::Validation => AppError::bad_request(err.to_string()),
        _ => err.into(),
    }
}
