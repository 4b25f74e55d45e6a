// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::clock::SharedClock;
use video_conferencing_cell::VideoSessionManager;

use crate::handlers;
use crate::services::{AppointmentLifecycle, AppointmentStore, BookingAllocator, ScheduleService};

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AppointmentStore>,
    pub sessions: Arc<VideoSessionManager>,
    pub booking: Arc<BookingAllocator>,
    pub lifecycle: Arc<AppointmentLifecycle>,
    pub schedules: Arc<ScheduleService>,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn AppointmentStore>,
        sessions: Arc<VideoSessionManager>,
        clock: SharedClock,
    ) -> Self {
        Self {
            booking: Arc::new(BookingAllocator::new(store.clone(), clock.clone())),
            lifecycle: Arc::new(AppointmentLifecycle::new(store.clone(), sessions.clone(), clock.clone())),
            schedules: Arc::new(ScheduleService::new(store.clone(), clock, config.slot_step_minutes)),
            config,
            store,
            sessions,
        }
    }
}

pub fn appointment_routes(state: AppointmentCellState) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment).get(handlers::list_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/status", get(handlers::get_appointment_status))
        .route("/{appointment_id}/accept", post(handlers::accept_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/details", get(handlers::get_visit_details))
        .route("/{appointment_id}/end-call", put(handlers::end_call))
        .with_state(state)
}

pub fn schedule_routes(state: AppointmentCellState) -> Router {
    Router::new()
        .route("/", post(handlers::create_schedule).get(handlers::list_schedules))
        .route("/{schedule_id}/visibility", patch(handlers::set_schedule_visibility))
        .route("/{schedule_id}/timeslots", get(handlers::list_timeslots))
        .with_state(state)
}
