// libs/appointment-cell/src/services/lifecycle.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_utils::clock::SharedClock;
use video_conferencing_cell::{VideoSession, VideoSessionManager};

use crate::models::{AppointmentError, AppointmentStatus, CompleteVisitRequest, VisitDetails};
use crate::services::store::AppointmentStore;

/// Conditional status updates attempted before giving up on a row that never matches.
const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// Validate that a status transition is allowed.
pub fn validate_status_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", current, next);
        Err(AppointmentError::InvalidTransition { from: current, to: next })
    }
}

/// Drives appointments through `booked -> accepted -> completed`.
pub struct AppointmentLifecycle {
    store: Arc<dyn AppointmentStore>,
    sessions: Arc<VideoSessionManager>,
    clock: SharedClock,
}

impl AppointmentLifecycle {
    pub fn new(store: Arc<dyn AppointmentStore>, sessions: Arc<VideoSessionManager>, clock: SharedClock) -> Self {
        Self { store, sessions, clock }
    }

    pub async fn status(&self, appointment_id: Uuid) -> Result<AppointmentStatus, AppointmentError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .map(|appointment| appointment.status)
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", appointment_id)))
    }

    /// Moves the appointment to `target`. Already being there counts as success.
    ///
    /// Every write is conditional on the status just read, so a concurrent writer makes
    /// the write miss and the loop re-reads. Statuses only move forward, which bounds
    /// the number of retries.
    async fn transition(
        &self,
        appointment_id: Uuid,
        target: AppointmentStatus,
    ) -> Result<AppointmentStatus, AppointmentError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self.status(appointment_id).await?;
            if current == target {
                debug!("Appointment {} already {}", appointment_id, target);
                return Ok(current);
            }

            validate_status_transition(current, target)?;

            let now = self.clock.now().with_timezone(&Utc);
            if self.store.update_status(appointment_id, current, target, now).await? {
                info!("Appointment {} moved {} -> {}", appointment_id, current, target);
                return Ok(target);
            }

            debug!(
                "Status of appointment {} changed concurrently, re-reading (attempt {})",
                appointment_id, attempt
            );
        }

        warn!(
            "Appointment {} did not reach {} after {} attempts",
            appointment_id, target, MAX_TRANSITION_ATTEMPTS
        );
        Err(AppointmentError::Database(format!(
            "status update for appointment {} to {} matched no row after {} attempts",
            appointment_id, target, MAX_TRANSITION_ATTEMPTS
        )))
    }

    /// Doctor accepts the booking. Returns the call session; repeated or concurrent
    /// accepts resolve to the same session.
    #[instrument(skip(self))]
    pub async fn accept(&self, appointment_id: Uuid) -> Result<VideoSession, AppointmentError> {
        self.transition(appointment_id, AppointmentStatus::Accepted).await?;
        Ok(self.sessions.start_session(appointment_id).await?)
    }

    /// Stores the doctor's visit notes and completes an accepted appointment. Submitting
    /// again after completion overwrites the notes.
    #[instrument(skip(self, request))]
    pub async fn complete_visit(
        &self,
        appointment_id: Uuid,
        request: CompleteVisitRequest,
    ) -> Result<VisitDetails, AppointmentError> {
        let current = self.status(appointment_id).await?;
        if !matches!(current, AppointmentStatus::Accepted | AppointmentStatus::Completed) {
            return Err(AppointmentError::InvalidTransition {
                from: current,
                to: AppointmentStatus::Completed,
            });
        }

        let details = self
            .store
            .upsert_visit_details(VisitDetails {
                appointment_id,
                complaints: request.complaints,
                diagnosis: request.diagnosis,
                assignment: request.assignment,
                prescriptions: request.prescriptions,
                updated_at: self.clock.now().with_timezone(&Utc),
            })
            .await?;

        self.transition(appointment_id, AppointmentStatus::Completed).await?;
        info!(
            "Visit details saved for appointment {} ({} prescriptions)",
            appointment_id,
            details.prescriptions.len()
        );

        Ok(details)
    }

    /// Either peer hangs up. Completes the appointment and closes the call session.
    #[instrument(skip(self))]
    pub async fn end_call(&self, appointment_id: Uuid) -> Result<AppointmentStatus, AppointmentError> {
        let status = self.transition(appointment_id, AppointmentStatus::Completed).await?;
        self.sessions.end_session(appointment_id).await?;
        Ok(status)
    }

    pub async fn visit_details(&self, appointment_id: Uuid) -> Result<VisitDetails, AppointmentError> {
        self.store
            .get_visit_details(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Visit details for appointment {}", appointment_id)))
    }
}
