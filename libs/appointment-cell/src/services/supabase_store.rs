// libs/appointment-cell/src/services/supabase_store.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{prefer, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookedSlot, ReminderTarget, Schedule,
    Timeslot, VisitDetails,
};
use crate::services::store::AppointmentStore;

/// Appointment tables over PostgREST. Compare-and-set is a filtered `PATCH` with
/// `Prefer: return=representation`: an empty result means the guard did not match.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

/// `appointments` row with its timeslot embedded through `select=*,timeslots!inner(*)`.
#[derive(Debug, Deserialize)]
struct AppointmentWithSlotRow {
    #[serde(flatten)]
    appointment: Appointment,
    timeslots: Timeslot,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn timestamp(value: DateTime<Utc>) -> String {
        urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
    }

    fn id_list(ids: &[Uuid]) -> String {
        ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
    }

    async fn fetch_one<T>(&self, path: &str) -> Result<Option<T>, AppointmentError>
    where
        T: serde::de::DeserializeOwned,
    {
        let rows: Vec<T> = self.supabase.request(Method::GET, path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_timeslot(
        &self,
        schedule_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Option<Timeslot>, AppointmentError> {
        let path = format!(
            "/rest/v1/timeslots?schedule_id=eq.{}&start_time=eq.{}&end_time=eq.{}",
            schedule_id,
            Self::timestamp(start_time),
            Self::timestamp(end_time)
        );
        self.fetch_one(&path).await
    }
}

fn is_conflict(err: &anyhow::Error) -> bool {
    err.to_string().starts_with("Conflict")
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, AppointmentError> {
        let rows: Vec<Schedule> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/schedules",
                Some(json!(schedule)),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("schedule insert returned no row".to_string()))
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<Schedule>, AppointmentError> {
        self.fetch_one(&format!("/rest/v1/schedules?id=eq.{}", schedule_id)).await
    }

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, AppointmentError> {
        let path = format!("/rest/v1/schedules?doctor_id=eq.{}&order=start_time.asc", doctor_id);
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    async fn set_schedule_visibility(
        &self,
        schedule_id: Uuid,
        is_visible: bool,
    ) -> Result<Option<Schedule>, AppointmentError> {
        let rows: Vec<Schedule> = self
            .supabase
            .request_with_prefer(
                Method::PATCH,
                &format!("/rest/v1/schedules?id=eq.{}", schedule_id),
                Some(json!({ "is_visible": is_visible })),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_timeslots(&self, slots: Vec<Timeslot>) -> Result<usize, AppointmentError> {
        if slots.is_empty() {
            return Ok(0);
        }

        let inserted: Vec<Value> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/timeslots?on_conflict=schedule_id,start_time,end_time",
                Some(json!(slots)),
                Some(prefer::IGNORE_DUPLICATES),
            )
            .await?;
        Ok(inserted.len())
    }

    async fn get_or_create_timeslot(
        &self,
        schedule_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Timeslot, AppointmentError> {
        if let Some(existing) = self.find_timeslot(schedule_id, start_time, end_time).await? {
            return Ok(existing);
        }

        let candidate = Timeslot {
            id: Uuid::new_v4(),
            schedule_id,
            start_time,
            end_time,
            is_booked: false,
            created_at: Utc::now(),
        };
        let inserted: Vec<Timeslot> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/timeslots?on_conflict=schedule_id,start_time,end_time",
                Some(json!([candidate])),
                Some(prefer::IGNORE_DUPLICATES),
            )
            .await?;

        if let Some(slot) = inserted.into_iter().next() {
            return Ok(slot);
        }

        // Lost the insert race; the winner's row is there now.
        debug!("Timeslot for schedule {} created concurrently, re-reading", schedule_id);
        self.find_timeslot(schedule_id, start_time, end_time)
            .await?
            .ok_or_else(|| AppointmentError::Database("timeslot vanished after insert".to_string()))
    }

    async fn get_timeslot(&self, timeslot_id: Uuid) -> Result<Option<Timeslot>, AppointmentError> {
        self.fetch_one(&format!("/rest/v1/timeslots?id=eq.{}", timeslot_id)).await
    }

    async fn list_timeslots(&self, schedule_id: Uuid) -> Result<Vec<Timeslot>, AppointmentError> {
        let path = format!("/rest/v1/timeslots?schedule_id=eq.{}&order=start_time.asc", schedule_id);
        Ok(self.supabase.request(Method::GET, &path, None).await?)
    }

    async fn claim_timeslot(&self, timeslot_id: Uuid) -> Result<bool, AppointmentError> {
        let claimed: Vec<Value> = self
            .supabase
            .request_with_prefer(
                Method::PATCH,
                &format!("/rest/v1/timeslots?id=eq.{}&is_booked=eq.false", timeslot_id),
                Some(json!({ "is_booked": true })),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;
        Ok(!claimed.is_empty())
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let result: anyhow::Result<Vec<Appointment>> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/appointments",
                Some(json!(appointment)),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await;

        match result {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| AppointmentError::Database("appointment insert returned no row".to_string())),
            Err(e) if is_conflict(&e) => {
                warn!("Appointment insert for timeslot {} hit the live-slot index", appointment.timeslot_id);
                Err(AppointmentError::SlotAlreadyBooked)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        let _: Vec<Value> = self
            .supabase
            .request_with_prefer(
                Method::DELETE,
                &format!("/rest/v1/appointments?id=eq.{}", appointment_id),
                None,
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        self.fetch_one(&format!("/rest/v1/appointments?id=eq.{}", appointment_id)).await
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppointmentError> {
        let updated: Vec<Value> = self
            .supabase
            .request_with_prefer(
                Method::PATCH,
                &format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", appointment_id, expected),
                Some(json!({ "status": next, "updated_at": updated_at })),
                Some(prefer::RETURN_REPRESENTATION),
            )
            .await?;

        if updated.is_empty() && self.get_appointment(appointment_id).await?.is_none() {
            return Err(AppointmentError::NotFound(format!("Appointment {}", appointment_id)));
        }
        Ok(!updated.is_empty())
    }

    async fn list_appointments_for_schedules(
        &self,
        schedule_ids: &[Uuid],
    ) -> Result<Vec<BookedSlot>, AppointmentError> {
        if schedule_ids.is_empty() {
            return Ok(Vec::new());
        }

        let path = format!(
            "/rest/v1/appointments?select=*,timeslots!inner(*)&timeslots.schedule_id=in.({})&order=created_at.asc",
            Self::id_list(schedule_ids)
        );
        let rows: Vec<AppointmentWithSlotRow> = self.supabase.request(Method::GET, &path, None).await?;

        let mut booked: Vec<BookedSlot> = rows
            .into_iter()
            .map(|row| BookedSlot {
                appointment: row.appointment,
                timeslot: row.timeslots,
            })
            .collect();
        booked.sort_by_key(|b| b.timeslot.start_time);
        Ok(booked)
    }

    async fn upsert_visit_details(&self, details: VisitDetails) -> Result<VisitDetails, AppointmentError> {
        let rows: Vec<VisitDetails> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/visit_details?on_conflict=appointment_id",
                Some(json!(details)),
                Some(prefer::MERGE_DUPLICATES),
            )
            .await?;

        Ok(rows.into_iter().next().unwrap_or(details))
    }

    async fn get_visit_details(&self, appointment_id: Uuid) -> Result<Option<VisitDetails>, AppointmentError> {
        self.fetch_one(&format!("/rest/v1/visit_details?appointment_id=eq.{}", appointment_id))
            .await
    }

    async fn reminder_targets(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<ReminderTarget>, AppointmentError> {
        let targets: Vec<ReminderTarget> = self
            .supabase
            .rpc(
                "upcoming_appointment_reminders",
                json!({
                    "from_ts": from,
                    "to_ts": to,
                    "statuses": statuses,
                }),
            )
            .await?;
        Ok(targets)
    }
}
