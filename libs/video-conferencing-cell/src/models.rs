// libs/video-conferencing-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==============================================================================
// SESSION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VideoSession {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub room_name: String,
    /// Role-less relative join URL. Use [`JoinLink::for_role`] to address a participant.
    pub video_url: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl VideoSession {
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn join_link(&self) -> JoinLink {
        JoinLink::new(self.video_url.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    Doctor,
    Patient,
}

impl ParticipantRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantRole::Doctor => "doctor",
            ParticipantRole::Patient => "patient",
        }
    }

    pub fn counterpart(&self) -> ParticipantRole {
        match self {
            ParticipantRole::Doctor => ParticipantRole::Patient,
            ParticipantRole::Patient => ParticipantRole::Doctor,
        }
    }
}

impl fmt::Display for ParticipantRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ParticipantRole {
    type Err = VideoConferencingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "doctor" => Ok(ParticipantRole::Doctor),
            "patient" => Ok(ParticipantRole::Patient),
            other => Err(VideoConferencingError::RelayProtocol {
                message: format!("unknown role '{}', expected doctor or patient", other),
            }),
        }
    }
}

/// Join URL handed to a browser. Stored without a role; each participant gets its own
/// variant through [`JoinLink::for_role`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinLink {
    url: String,
}

impl JoinLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn for_role(&self, role: ParticipantRole) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}role={}", self.url, separator, role)
    }

    /// Role-specific link prefixed with `base_url` (scheme and host, no trailing slash needed).
    pub fn absolute(&self, base_url: &str, role: ParticipantRole) -> String {
        let base = base_url.trim_end_matches('/');
        let relative = self.for_role(role);
        if relative.starts_with('/') {
            format!("{}{}", base, relative)
        } else {
            format!("{}/{}", base, relative)
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum VideoConferencingError {
    #[error("Video session not found")]
    SessionNotFound,

    #[error("Signaling protocol error: {message}")]
    RelayProtocol { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Database backend unreachable: {message}")]
    BackendUnavailable { message: String },
}

impl From<anyhow::Error> for VideoConferencingError {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        if err.downcast_ref::<reqwest::Error>().is_some() {
            VideoConferencingError::BackendUnavailable { message }
        } else {
            VideoConferencingError::DatabaseError { message }
        }
    }
}

impl From<VideoConferencingError> for shared_models::error::AppError {
    fn from(err: VideoConferencingError) -> Self {
        use shared_models::error::AppError;

        match err {
            VideoConferencingError::SessionNotFound => {
                AppError::NotFound("Video session not found".to_string())
            }
            VideoConferencingError::RelayProtocol { message } => AppError::BadRequest(message),
            VideoConferencingError::DatabaseError { message } => AppError::Database(message),
            VideoConferencingError::BackendUnavailable { message } => AppError::ExternalService(message),
        }
    }
}
