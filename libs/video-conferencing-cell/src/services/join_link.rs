use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::JoinLink;

/// Builds the role-less relative join URL served by the static call page.
#[derive(Debug, Clone)]
pub struct JoinLinkBuilder {
    room_path: String,
}

impl JoinLinkBuilder {
    pub fn new(room_path: impl Into<String>) -> Self {
        let room_path = room_path.into();
        let room_path = if room_path.starts_with('/') {
            room_path
        } else {
            format!("/{}", room_path)
        };

        Self { room_path }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.video_room_path.clone())
    }

    pub fn for_appointment(&self, appointment_id: Uuid) -> JoinLink {
        JoinLink::new(format!("{}?appointment_id={}", self.room_path, appointment_id))
    }
}
