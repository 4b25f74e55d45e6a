use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::{prefer, SupabaseClient};

use crate::models::{VideoConferencingError, VideoSession};
use crate::services::session::VideoSessionStore;

/// `video_sessions` table over PostgREST. A unique index on `appointment_id` makes
/// insert-if-absent converge for concurrent creators.
pub struct SupabaseVideoSessionStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseVideoSessionStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl VideoSessionStore for SupabaseVideoSessionStore {
    async fn latest_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VideoSession>, VideoConferencingError> {
        let path = format!(
            "/rest/v1/video_sessions?appointment_id=eq.{}&order=started_at.desc&limit=1",
            appointment_id
        );
        let rows: Vec<VideoSession> = self.supabase.request(Method::GET, &path, None).await?;

        Ok(rows.into_iter().next())
    }

    async fn latest_for_appointments(
        &self,
        appointment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VideoSession>, VideoConferencingError> {
        let ids = appointment_ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let path = format!(
            "/rest/v1/video_sessions?appointment_id=in.({})&order=started_at.desc",
            ids
        );
        let rows: Vec<VideoSession> = self.supabase.request(Method::GET, &path, None).await?;

        let mut latest = HashMap::new();
        for row in rows {
            latest.entry(row.appointment_id).or_insert(row);
        }
        Ok(latest)
    }

    async fn insert_if_absent(
        &self,
        session: VideoSession,
    ) -> Result<VideoSession, VideoConferencingError> {
        let appointment_id = session.appointment_id;
        let inserted: Vec<VideoSession> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/video_sessions?on_conflict=appointment_id",
                Some(json!(session)),
                Some(prefer::IGNORE_DUPLICATES),
            )
            .await?;

        if let Some(row) = inserted.into_iter().next() {
            return Ok(row);
        }

        debug!("Video session for appointment {} already existed", appointment_id);
        self.latest_for_appointment(appointment_id)
            .await?
            .ok_or(VideoConferencingError::SessionNotFound)
    }

    async fn end_latest(
        &self,
        appointment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<VideoSession>, VideoConferencingError> {
        let path = format!(
            "/rest/v1/video_sessions?appointment_id=eq.{}&ended_at=is.null",
            appointment_id
        );
        let updated: Vec<VideoSession> = self
            .supabase
            .request_with_prefer(
                Method::PATCH,
                &path,
                Some(json!({ "ended_at": ended_at })),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;

        match updated.into_iter().next() {
            Some(row) => Ok(Some(row)),
            None => self.latest_for_appointment(appointment_id).await,
        }
    }
}
