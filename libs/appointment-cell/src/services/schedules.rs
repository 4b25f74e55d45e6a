use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, instrument};
use uuid::Uuid;

use shared_utils::clock::SharedClock;

use crate::models::{AppointmentError, CreateScheduleRequest, Schedule, Timeslot};
use crate::services::store::AppointmentStore;

const DEFAULT_COLOR: &str = "#4f9dde";

/// Upper bound on the slots one schedule may materialize in a single request.
pub const MAX_SLOTS_PER_SCHEDULE: i64 = 2_000;

/// Splits a schedule window into back-to-back slots of `step`. The last slot never
/// runs past the window end.
pub fn generate_timeslots(schedule: &Schedule, step: Duration, created_at: DateTime<Utc>) -> Vec<Timeslot> {
    let mut slots = Vec::new();
    if step <= Duration::zero() {
        return slots;
    }

    let mut cursor = schedule.start_time;
    while cursor + step <= schedule.end_time {
        slots.push(Timeslot {
            id: Uuid::new_v4(),
            schedule_id: schedule.id,
            start_time: cursor,
            end_time: cursor + step,
            is_booked: false,
            created_at,
        });
        cursor += step;
    }

    slots
}

/// Doctor-facing schedule management: windows, visibility and slot materialization.
pub struct ScheduleService {
    store: Arc<dyn AppointmentStore>,
    clock: SharedClock,
    default_step_minutes: i64,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn AppointmentStore>, clock: SharedClock, default_step_minutes: i64) -> Self {
        Self {
            store,
            clock,
            default_step_minutes,
        }
    }

    /// Creates the schedule and its slots. Returns the schedule and the slot count.
    #[instrument(skip(self, request), fields(doctor_id = %request.doctor_id))]
    pub async fn create_schedule(
        &self,
        request: CreateScheduleRequest,
    ) -> Result<(Schedule, usize), AppointmentError> {
        if request.end_time <= request.start_time {
            return Err(AppointmentError::Validation(
                "Schedule end_time must be after start_time".to_string(),
            ));
        }
        let step = self.step(request.slot_minutes, request.start_time, request.end_time)?;

        let schedule = self
            .store
            .create_schedule(Schedule {
                id: Uuid::new_v4(),
                doctor_id: request.doctor_id,
                service_id: request.service_id,
                start_time: request.start_time,
                end_time: request.end_time,
                color: request.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
                is_visible: true,
            })
            .await?;

        let inserted = self.materialize(&schedule, step).await?;
        info!("Schedule {} created with {} timeslots", schedule.id, inserted);

        Ok((schedule, inserted))
    }

    /// Re-runs slot generation for an existing schedule. Slots that already exist are
    /// left alone, so this is safe to repeat.
    pub async fn regenerate_timeslots(
        &self,
        schedule_id: Uuid,
        slot_minutes: Option<i64>,
    ) -> Result<usize, AppointmentError> {
        let schedule = self.get_schedule(schedule_id).await?;
        let step = self.step(slot_minutes, schedule.start_time, schedule.end_time)?;
        self.materialize(&schedule, step).await
    }

    pub async fn get_schedule(&self, schedule_id: Uuid) -> Result<Schedule, AppointmentError> {
        self.store
            .get_schedule(schedule_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Schedule {}", schedule_id)))
    }

    pub async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, AppointmentError> {
        self.store.list_schedules(doctor_id).await
    }

    pub async fn set_visibility(&self, schedule_id: Uuid, is_visible: bool) -> Result<Schedule, AppointmentError> {
        let schedule = self
            .store
            .set_schedule_visibility(schedule_id, is_visible)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Schedule {}", schedule_id)))?;

        info!("Schedule {} visibility set to {}", schedule_id, is_visible);
        Ok(schedule)
    }

    pub async fn list_timeslots(&self, schedule_id: Uuid) -> Result<Vec<Timeslot>, AppointmentError> {
        self.get_schedule(schedule_id).await?;
        self.store.list_timeslots(schedule_id).await
    }

    fn step(
        &self,
        slot_minutes: Option<i64>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Duration, AppointmentError> {
        let minutes = slot_minutes.unwrap_or(self.default_step_minutes);
        if minutes <= 0 {
            return Err(AppointmentError::Validation(format!(
                "slot_minutes must be positive, got {}",
                minutes
            )));
        }
        let step = Duration::try_minutes(minutes).ok_or_else(|| {
            AppointmentError::Validation(format!("slot_minutes {} is out of range", minutes))
        })?;

        let slot_count = (end - start).num_minutes() / minutes;
        if slot_count > MAX_SLOTS_PER_SCHEDULE {
            return Err(AppointmentError::Validation(format!(
                "{} slots of {} minutes exceed the limit of {} per schedule",
                slot_count, minutes, MAX_SLOTS_PER_SCHEDULE
            )));
        }

        Ok(step)
    }

    async fn materialize(&self, schedule: &Schedule, step: Duration) -> Result<usize, AppointmentError> {
        let created_at = self.clock.now().with_timezone(&Utc);
        let slots = generate_timeslots(schedule, step, created_at);
        self.store.insert_timeslots(slots).await
    }
}
