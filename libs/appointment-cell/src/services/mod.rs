// libs/appointment-cell/src/services/mod.rs

pub mod booking;
pub mod lifecycle;
pub mod memory;
pub mod schedules;
pub mod store;
pub mod supabase_store;

pub use booking::BookingAllocator;
pub use lifecycle::{validate_status_transition, AppointmentLifecycle};
pub use memory::InMemoryAppointmentStore;
pub use schedules::{generate_timeslots, ScheduleService};
pub use store::AppointmentStore;
pub use supabase_store::SupabaseAppointmentStore;
