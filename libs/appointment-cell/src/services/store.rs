// libs/appointment-cell/src/services/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookedSlot, ReminderTarget, Schedule,
    Timeslot, VisitDetails,
};

/// Persistence seam for schedules, timeslots, appointments and visit details.
///
/// The only compare-and-set operations are [`claim_timeslot`](Self::claim_timeslot)
/// and [`update_status`](Self::update_status); everything the booking and lifecycle
/// guarantees rest on is expressed through those two.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    // --- schedules ---------------------------------------------------------

    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, AppointmentError>;

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<Schedule>, AppointmentError>;

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, AppointmentError>;

    async fn set_schedule_visibility(
        &self,
        schedule_id: Uuid,
        is_visible: bool,
    ) -> Result<Option<Schedule>, AppointmentError>;

    // --- timeslots ---------------------------------------------------------

    /// Inserts the slots, skipping any (schedule, start, end) triple that already
    /// exists. Returns how many rows were actually added.
    async fn insert_timeslots(&self, slots: Vec<Timeslot>) -> Result<usize, AppointmentError>;

    async fn get_or_create_timeslot(
        &self,
        schedule_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Timeslot, AppointmentError>;

    async fn get_timeslot(&self, timeslot_id: Uuid) -> Result<Option<Timeslot>, AppointmentError>;

    async fn list_timeslots(&self, schedule_id: Uuid) -> Result<Vec<Timeslot>, AppointmentError>;

    /// Flips `is_booked` from false to true. `Ok(false)` means another caller got there first.
    async fn claim_timeslot(&self, timeslot_id: Uuid) -> Result<bool, AppointmentError>;

    // --- appointments ------------------------------------------------------

    /// Fails with `SlotAlreadyBooked` if a live appointment already holds the slot.
    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError>;

    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Writes `next` only if the stored status still equals `expected`.
    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppointmentError>;

    async fn list_appointments_for_schedules(
        &self,
        schedule_ids: &[Uuid],
    ) -> Result<Vec<BookedSlot>, AppointmentError>;

    // --- visit details -----------------------------------------------------

    /// Replaces any previous record for the appointment, prescriptions included.
    async fn upsert_visit_details(&self, details: VisitDetails) -> Result<VisitDetails, AppointmentError>;

    async fn get_visit_details(&self, appointment_id: Uuid) -> Result<Option<VisitDetails>, AppointmentError>;

    // --- reminders ---------------------------------------------------------

    /// Appointments in one of `statuses` whose slot starts within `[from, to]`.
    async fn reminder_targets(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<ReminderTarget>, AppointmentError>;
}
