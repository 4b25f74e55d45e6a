// libs/appointment-cell/src/lib.rs
//! Schedules, timeslot booking and the appointment lifecycle.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Appointment, AppointmentError, AppointmentStatus, ReminderTarget, Schedule, Timeslot,
    VisitDetails,
};
pub use router::{appointment_routes, schedule_routes, AppointmentCellState};
pub use services::{
    AppointmentLifecycle, AppointmentStore, BookingAllocator, InMemoryAppointmentStore,
    ScheduleService, SupabaseAppointmentStore,
};
