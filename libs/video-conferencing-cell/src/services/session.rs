// libs/video-conferencing-cell/src/services/session.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use shared_utils::clock::SharedClock;

use crate::models::{VideoConferencingError, VideoSession};
use crate::services::join_link::JoinLinkBuilder;

/// Persistence seam for video sessions.
#[async_trait]
pub trait VideoSessionStore: Send + Sync {
    async fn latest_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VideoSession>, VideoConferencingError>;

    /// Latest session per appointment for every id that has one.
    async fn latest_for_appointments(
        &self,
        appointment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VideoSession>, VideoConferencingError>;

    /// Stores `session` unless the appointment already has one, and returns whichever
    /// row ends up stored. Concurrent callers converge on a single session.
    async fn insert_if_absent(
        &self,
        session: VideoSession,
    ) -> Result<VideoSession, VideoConferencingError>;

    /// Sets `ended_at` on the latest open session. Returns the latest session, ended or not.
    async fn end_latest(
        &self,
        appointment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<VideoSession>, VideoConferencingError>;
}

#[derive(Default)]
pub struct InMemoryVideoSessionStore {
    sessions: RwLock<HashMap<Uuid, Vec<VideoSession>>>,
}

impl InMemoryVideoSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoSessionStore for InMemoryVideoSessionStore {
    async fn latest_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<VideoSession>, VideoConferencingError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&appointment_id)
            .and_then(|history| history.last().cloned()))
    }

    async fn latest_for_appointments(
        &self,
        appointment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VideoSession>, VideoConferencingError> {
        let sessions = self.sessions.read().await;
        Ok(appointment_ids
            .iter()
            .filter_map(|id| {
                sessions
                    .get(id)
                    .and_then(|history| history.last().cloned())
                    .map(|session| (*id, session))
            })
            .collect())
    }

    async fn insert_if_absent(
        &self,
        session: VideoSession,
    ) -> Result<VideoSession, VideoConferencingError> {
        let mut sessions = self.sessions.write().await;
        let history = sessions.entry(session.appointment_id).or_default();

        if let Some(existing) = history.last() {
            return Ok(existing.clone());
        }

        history.push(session.clone());
        Ok(session)
    }

    async fn end_latest(
        &self,
        appointment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<VideoSession>, VideoConferencingError> {
        let mut sessions = self.sessions.write().await;
        let latest = sessions
            .get_mut(&appointment_id)
            .and_then(|history| history.last_mut());

        Ok(latest.map(|session| {
            if session.ended_at.is_none() {
                session.ended_at = Some(ended_at);
            }
            session.clone()
        }))
    }
}

/// Creates and resolves the single video session of an appointment.
pub struct VideoSessionManager {
    store: Arc<dyn VideoSessionStore>,
    links: JoinLinkBuilder,
    clock: SharedClock,
    sequence: AtomicU64,
}

impl VideoSessionManager {
    pub fn new(store: Arc<dyn VideoSessionStore>, links: JoinLinkBuilder, clock: SharedClock) -> Self {
        let seed = u64::try_from(clock.now().timestamp_millis()).unwrap_or_default();

        Self {
            store,
            links,
            clock,
            sequence: AtomicU64::new(seed),
        }
    }

    /// Returns the appointment's session, creating it on first call.
    #[instrument(skip(self))]
    pub async fn start_session(&self, appointment_id: Uuid) -> Result<VideoSession, VideoConferencingError> {
        if let Some(existing) = self.store.latest_for_appointment(appointment_id).await? {
            debug!("Reusing video session {} for appointment {}", existing.room_name, appointment_id);
            return Ok(existing);
        }

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let candidate = VideoSession {
            id: Uuid::new_v4(),
            appointment_id,
            room_name: format!("appointment-{}-{}", appointment_id, sequence),
            video_url: self.links.for_appointment(appointment_id).as_str().to_string(),
            started_at: self.clock.now().with_timezone(&Utc),
            ended_at: None,
        };

        let stored = self.store.insert_if_absent(candidate).await?;
        info!("Video session {} ready for appointment {}", stored.room_name, appointment_id);

        Ok(stored)
    }

    pub async fn current_session(&self, appointment_id: Uuid) -> Result<VideoSession, VideoConferencingError> {
        self.store
            .latest_for_appointment(appointment_id)
            .await?
            .ok_or(VideoConferencingError::SessionNotFound)
    }

    pub async fn sessions_for(
        &self,
        appointment_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, VideoSession>, VideoConferencingError> {
        if appointment_ids.is_empty() {
            return Ok(HashMap::new());
        }
        self.store.latest_for_appointments(appointment_ids).await
    }

    /// Marks the session ended. Ending twice keeps the first `ended_at`; an appointment
    /// without a session yields `None`.
    #[instrument(skip(self))]
    pub async fn end_session(&self, appointment_id: Uuid) -> Result<Option<VideoSession>, VideoConferencingError> {
        let ended_at = self.clock.now().with_timezone(&Utc);
        let session = self.store.end_latest(appointment_id, ended_at).await?;

        match &session {
            Some(session) => info!("Video session {} ended", session.room_name),
            None => debug!("No video session to end for appointment {}", appointment_id),
        }

        Ok(session)
    }
}
