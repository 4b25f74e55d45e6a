use thiserror::Error;

use appointment_cell::AppointmentError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("Invalid notification configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Reminder targets unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<AppointmentError> for NotificationError {
    fn from(err: AppointmentError) -> Self {
        NotificationError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        NotificationError::DeliveryFailed(err.to_string())
    }
}
