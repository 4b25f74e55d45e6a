use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Slot already booked: {0}")]
    SlotAlreadyBooked(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("External service error: {0}")]
    ExternalService(String),
}

impl AppError {
    /// Stable machine-readable code so clients can tell conflicts apart from failures.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Database(_) => "database_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::SlotAlreadyBooked(_) => "slot_already_booked",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::ExternalService(_) => "external_service_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::SlotAlreadyBooked(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Database(msg)
            | AppError::ValidationError(msg)
            | AppError::SlotAlreadyBooked(msg)
            | AppError::InvalidTransition(msg)
            | AppError::ExternalService(msg) => msg.clone(),
        };

        if status.is_server_error() {
            tracing::error!("Error: {}: {}", status, message);
        } else {
            tracing::warn!("Request rejected: {}: {}", status, message);
        }

        let body = Json(json!({
            "error": message,
            "code": self.code(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_conflict_is_distinguishable_from_server_error() {
        let conflict = AppError::SlotAlreadyBooked("slot taken".to_string());
        let failure = AppError::Database("boom".to_string());

        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "slot_already_booked");
        assert_eq!(failure.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unreachable_backend_is_a_gateway_error() {
        let err = AppError::ExternalService("connection refused".to_string());

        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), "external_service_error");
    }
}
