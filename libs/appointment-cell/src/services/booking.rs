// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use shared_utils::clock::SharedClock;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest};
use crate::services::store::AppointmentStore;

/// Turns a patient's pick of a time range into exactly one appointment.
///
/// The appointment row is written first and the slot is claimed second. Whoever loses
/// the claim removes its own row again, so at most one appointment survives per slot.
pub struct BookingAllocator {
    store: Arc<dyn AppointmentStore>,
    clock: SharedClock,
}

impl BookingAllocator {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    #[instrument(skip(self, request), fields(schedule_id = %request.schedule_id, patient_id = %request.patient_id))]
    pub async fn book(&self, request: BookAppointmentRequest) -> Result<Appointment, AppointmentError> {
        if request.end_time <= request.start_time {
            return Err(AppointmentError::Validation(
                "end_time must be after start_time".to_string(),
            ));
        }

        let schedule = self
            .store
            .get_schedule(request.schedule_id)
            .await?
            .filter(|schedule| schedule.is_visible)
            .ok_or_else(|| AppointmentError::NotFound(format!("Schedule {}", request.schedule_id)))?;

        if !schedule.contains(request.start_time, request.end_time) {
            return Err(AppointmentError::Validation(format!(
                "{} - {} is outside the schedule window",
                request.start_time, request.end_time
            )));
        }

        let slot = self
            .store
            .get_or_create_timeslot(schedule.id, request.start_time, request.end_time)
            .await?;

        if slot.is_booked {
            info!("Timeslot {} is already booked", slot.id);
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        let now = self.clock.now().with_timezone(&Utc);
        let appointment = self
            .store
            .insert_appointment(Appointment {
                id: Uuid::new_v4(),
                timeslot_id: slot.id,
                patient_id: request.patient_id,
                status: AppointmentStatus::Booked,
                created_at: now,
                updated_at: now,
            })
            .await?;

        match self.store.claim_timeslot(slot.id).await {
            Ok(true) => {
                info!("Appointment {} booked on timeslot {}", appointment.id, slot.id);
                Ok(appointment)
            }
            Ok(false) => {
                warn!("Lost the claim on timeslot {}, rolling back appointment {}", slot.id, appointment.id);
                self.rollback(appointment.id).await;
                Err(AppointmentError::SlotAlreadyBooked)
            }
            Err(e) => {
                self.rollback(appointment.id).await;
                Err(e)
            }
        }
    }

    async fn rollback(&self, appointment_id: Uuid) {
        if let Err(e) = self.store.delete_appointment(appointment_id).await {
            error!("Failed to remove orphaned appointment {}: {}", appointment_id, e);
        }
    }
}
