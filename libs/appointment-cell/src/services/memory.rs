use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookedSlot, Doctor, MedicalService, Patient,
    ReminderTarget, Schedule, Timeslot, VisitDetails,
};
use crate::services::store::AppointmentStore;

#[derive(Default)]
struct MemoryState {
    schedules: HashMap<Uuid, Schedule>,
    timeslots: HashMap<Uuid, Timeslot>,
    appointments: HashMap<Uuid, Appointment>,
    visit_details: HashMap<Uuid, VisitDetails>,
    doctors: HashMap<Uuid, Doctor>,
    services: HashMap<Uuid, MedicalService>,
    patients: HashMap<Uuid, Patient>,
}

impl MemoryState {
    fn find_timeslot(&self, schedule_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> Option<&Timeslot> {
        self.timeslots
            .values()
            .find(|slot| slot.schedule_id == schedule_id && slot.start_time == start && slot.end_time == end)
    }

    fn live_appointment_for(&self, timeslot_id: Uuid) -> Option<&Appointment> {
        self.appointments
            .values()
            .find(|a| a.timeslot_id == timeslot_id && a.status != AppointmentStatus::Cancelled)
    }
}

/// Single-process store. Every operation runs under one lock, which makes the
/// compare-and-set operations trivially atomic.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: Mutex<MemoryState>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        self.state.lock().await.doctors.insert(doctor.id, doctor);
    }

    pub async fn insert_service(&self, service: MedicalService) {
        self.state.lock().await.services.insert(service.id, service);
    }

    pub async fn insert_patient(&self, patient: Patient) {
        self.state.lock().await.patients.insert(patient.id, patient);
    }

    /// Number of stored appointments referencing the slot, whatever their status.
    pub async fn appointments_for_timeslot(&self, timeslot_id: Uuid) -> usize {
        self.state
            .lock()
            .await
            .appointments
            .values()
            .filter(|a| a.timeslot_id == timeslot_id)
            .count()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn create_schedule(&self, schedule: Schedule) -> Result<Schedule, AppointmentError> {
        let mut state = self.state.lock().await;
        state.schedules.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get_schedule(&self, schedule_id: Uuid) -> Result<Option<Schedule>, AppointmentError> {
        Ok(self.state.lock().await.schedules.get(&schedule_id).cloned())
    }

    async fn list_schedules(&self, doctor_id: Uuid) -> Result<Vec<Schedule>, AppointmentError> {
        let state = self.state.lock().await;
        let mut schedules: Vec<Schedule> = state
            .schedules
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        schedules.sort_by_key(|s| s.start_time);
        Ok(schedules)
    }

    async fn set_schedule_visibility(
        &self,
        schedule_id: Uuid,
        is_visible: bool,
    ) -> Result<Option<Schedule>, AppointmentError> {
        let mut state = self.state.lock().await;
        Ok(state.schedules.get_mut(&schedule_id).map(|schedule| {
            schedule.is_visible = is_visible;
            schedule.clone()
        }))
    }

    async fn insert_timeslots(&self, slots: Vec<Timeslot>) -> Result<usize, AppointmentError> {
        let mut state = self.state.lock().await;
        let mut inserted = 0;

        for slot in slots {
            if state.find_timeslot(slot.schedule_id, slot.start_time, slot.end_time).is_some() {
                continue;
            }
            state.timeslots.insert(slot.id, slot);
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn get_or_create_timeslot(
        &self,
        schedule_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Timeslot, AppointmentError> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.find_timeslot(schedule_id, start_time, end_time) {
            return Ok(existing.clone());
        }

        let slot = Timeslot {
            id: Uuid::new_v4(),
            schedule_id,
            start_time,
            end_time,
            is_booked: false,
            created_at: Utc::now(),
        };
        state.timeslots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn get_timeslot(&self, timeslot_id: Uuid) -> Result<Option<Timeslot>, AppointmentError> {
        Ok(self.state.lock().await.timeslots.get(&timeslot_id).cloned())
    }

    async fn list_timeslots(&self, schedule_id: Uuid) -> Result<Vec<Timeslot>, AppointmentError> {
        let state = self.state.lock().await;
        let mut slots: Vec<Timeslot> = state
            .timeslots
            .values()
            .filter(|slot| slot.schedule_id == schedule_id)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.start_time);
        Ok(slots)
    }

    async fn claim_timeslot(&self, timeslot_id: Uuid) -> Result<bool, AppointmentError> {
        let mut state = self.state.lock().await;
        match state.timeslots.get_mut(&timeslot_id) {
            Some(slot) if !slot.is_booked => {
                slot.is_booked = true;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppointmentError::NotFound(format!("Timeslot {}", timeslot_id))),
        }
    }

    async fn insert_appointment(&self, appointment: Appointment) -> Result<Appointment, AppointmentError> {
        let mut state = self.state.lock().await;

        if state.live_appointment_for(appointment.timeslot_id).is_some() {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        state.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn delete_appointment(&self, appointment_id: Uuid) -> Result<(), AppointmentError> {
        self.state.lock().await.appointments.remove(&appointment_id);
        Ok(())
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.state.lock().await.appointments.get(&appointment_id).cloned())
    }

    async fn update_status(
        &self,
        appointment_id: Uuid,
        expected: AppointmentStatus,
        next: AppointmentStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppointmentError> {
        let mut state = self.state.lock().await;
        match state.appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = next;
                appointment.updated_at = updated_at;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(AppointmentError::NotFound(format!("Appointment {}", appointment_id))),
        }
    }

    async fn list_appointments_for_schedules(
        &self,
        schedule_ids: &[Uuid],
    ) -> Result<Vec<BookedSlot>, AppointmentError> {
        let state = self.state.lock().await;
        let mut booked: Vec<BookedSlot> = state
            .appointments
            .values()
            .filter_map(|appointment| {
                let timeslot = state.timeslots.get(&appointment.timeslot_id)?;
                schedule_ids.contains(&timeslot.schedule_id).then(|| BookedSlot {
                    appointment: appointment.clone(),
                    timeslot: timeslot.clone(),
                })
            })
            .collect();
        booked.sort_by_key(|b| b.timeslot.start_time);
        Ok(booked)
    }

    async fn upsert_visit_details(&self, details: VisitDetails) -> Result<VisitDetails, AppointmentError> {
        let mut state = self.state.lock().await;
        state.visit_details.insert(details.appointment_id, details.clone());
        Ok(details)
    }

    async fn get_visit_details(&self, appointment_id: Uuid) -> Result<Option<VisitDetails>, AppointmentError> {
        Ok(self.state.lock().await.visit_details.get(&appointment_id).cloned())
    }

    async fn reminder_targets(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<ReminderTarget>, AppointmentError> {
        let state = self.state.lock().await;
        let mut targets = Vec::new();

        for appointment in state.appointments.values() {
            if !statuses.contains(&appointment.status) {
                continue;
            }
            let Some(slot) = state.timeslots.get(&appointment.timeslot_id) else {
                continue;
            };
            if slot.start_time < from || slot.start_time > to {
                continue;
            }

            let schedule = state.schedules.get(&slot.schedule_id);
            let doctor_name = schedule
                .and_then(|s| state.doctors.get(&s.doctor_id))
                .map(|d| d.full_name.clone())
                .unwrap_or_default();
            let service_name = schedule
                .and_then(|s| state.services.get(&s.service_id))
                .map(|s| s.name.clone())
                .unwrap_or_default();
            let patient = state.patients.get(&appointment.patient_id);

            targets.push(ReminderTarget {
                appointment_id: appointment.id,
                status: appointment.status,
                start_time: slot.start_time,
                chat_id: patient.and_then(|p| p.chat_id),
                language: patient.and_then(|p| p.language.clone()),
                doctor_name,
                service_name,
            });
        }

        targets.sort_by_key(|t| t.start_time);
        Ok(targets)
    }
}
