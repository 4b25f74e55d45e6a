// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use video_conferencing_cell::VideoConferencingError;

// ==============================================================================
// SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub color: String,
    pub is_visible: bool,
}

impl Schedule {
    pub fn contains(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start >= self.start_time && end <= self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Timeslot {
    pub id: Uuid,
    pub schedule_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_booked: bool,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub timeslot_id: Uuid,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Accepted,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Booked => "booked",
            AppointmentStatus::Accepted => "accepted",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses reachable in one step. `Cancelled` exists in stored data but nothing
    /// here moves an appointment into or out of it.
    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Booked => &[AppointmentStatus::Accepted],
            AppointmentStatus::Accepted => &[AppointmentStatus::Completed],
            AppointmentStatus::Completed => &[],
            AppointmentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Statuses for which reminders are still sent.
    pub fn upcoming() -> &'static [AppointmentStatus] {
        &[AppointmentStatus::Booked, AppointmentStatus::Accepted]
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "booked" => Ok(AppointmentStatus::Booked),
            "accepted" => Ok(AppointmentStatus::Accepted),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::Validation(format!("unknown status '{}'", other))),
        }
    }
}

/// An appointment together with the slot it occupies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookedSlot {
    pub appointment: Appointment,
    pub timeslot: Timeslot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prescription {
    #[serde(alias = "med")]
    pub medication: String,
    #[serde(alias = "dose")]
    pub dosage: String,
    pub schedule: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitDetails {
    pub appointment_id: Uuid,
    pub complaints: String,
    pub diagnosis: String,
    pub assignment: String,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    pub updated_at: DateTime<Utc>,
}

/// Read model the reminder scheduler polls for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderTarget {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub start_time: DateTime<Utc>,
    /// Messenger chat of the patient, if the patient ever connected one.
    pub chat_id: Option<i64>,
    pub language: Option<String>,
    pub doctor_name: String,
    pub service_name: String,
}

// ==============================================================================
// DIRECTORY RECORDS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalService {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub chat_id: Option<i64>,
    pub language: Option<String>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: Uuid,
    pub service_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub color: Option<String>,
    pub slot_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleVisibilityRequest {
    pub is_visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub schedule_id: Uuid,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteVisitRequest {
    #[serde(default)]
    pub complaints: String,
    #[serde(default)]
    pub diagnosis: String,
    #[serde(default)]
    pub assignment: String,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleListQuery {
    pub doctor_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    /// Comma separated schedule ids.
    pub schedule_ids: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Timeslot is already booked")]
    SlotAlreadyBooked,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database backend unreachable: {0}")]
    Unavailable(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        // Transport failures never reached PostgREST; anything else is a rejected query.
        if err.downcast_ref::<reqwest::Error>().is_some() {
            AppointmentError::Unavailable(err.to_string())
        } else {
            AppointmentError::Database(err.to_string())
        }
    }
}

impl From<VideoConferencingError> for AppointmentError {
    fn from(err: VideoConferencingError) -> Self {
        match err {
            VideoConferencingError::SessionNotFound => {
                AppointmentError::NotFound("Video session".to_string())
            }
            VideoConferencingError::BackendUnavailable { message } => AppointmentError::Unavailable(message),
            other => AppointmentError::Database(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::SlotAlreadyBooked => AppError::SlotAlreadyBooked(err.to_string()),
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidTransition { .. } => AppError::InvalidTransition(err.to_string()),
            AppointmentError::Validation(message) => AppError::ValidationError(message),
            AppointmentError::Database(message) => AppError::Database(message),
            AppointmentError::Unavailable(message) => AppError::ExternalService(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use AppointmentStatus::*;

        assert!(Booked.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Completed));

        for (from, to) in [
            (Booked, Completed),
            (Booked, Cancelled),
            (Accepted, Booked),
            (Completed, Accepted),
            (Completed, Booked),
            (Cancelled, Booked),
            (Cancelled, Accepted),
        ] {
            assert!(!from.can_transition_to(to), "{} -> {} must be rejected", from, to);
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&AppointmentStatus::Accepted).unwrap(), "\"accepted\"");
        assert_eq!("completed".parse::<AppointmentStatus>().unwrap(), AppointmentStatus::Completed);
        assert!("done".parse::<AppointmentStatus>().is_err());
    }

    #[test]
    fn test_prescription_accepts_short_field_names() {
        let prescription: Prescription =
            serde_json::from_str(r#"{"med":"Ibuprofen","dose":"200mg","schedule":"twice a day"}"#).unwrap();
        assert_eq!(prescription.medication, "Ibuprofen");
        assert_eq!(prescription.dosage, "200mg");
    }

    #[test]
    fn test_errors_map_to_distinct_http_codes() {
        let conflict: AppError = AppointmentError::SlotAlreadyBooked.into();
        let transition: AppError = AppointmentError::InvalidTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Accepted,
        }
        .into();

        assert_eq!(conflict.code(), "slot_already_booked");
        assert_eq!(transition.code(), "invalid_transition");
        assert_eq!(transition.to_string(), "Invalid transition: Cannot move appointment from completed to accepted");
    }
}
