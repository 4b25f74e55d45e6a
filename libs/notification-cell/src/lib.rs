//! Appointment reminders.
//!
//! A single [`ReminderScheduler`] task polls the appointment store, sorts upcoming
//! appointments into reminder windows and pushes each window at most once per
//! appointment through a [`Notifier`]. The innermost window carries the patient's
//! join link instead of a text reminder.

pub mod error;
pub mod services;

pub use error::*;
pub use services::*;
