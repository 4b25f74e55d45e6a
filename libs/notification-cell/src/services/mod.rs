// libs/notification-cell/src/services/mod.rs

pub mod dedup;
pub mod messages;
pub mod notifier;
pub mod scheduler;
pub mod telegram;
pub mod windows;

pub use dedup::SentReminders;
pub use messages::{JoinPrompt, Language};
pub use notifier::{LogNotifier, Notifier};
pub use scheduler::{ReminderScheduler, SchedulerSettings, TickReport};
pub use telegram::TelegramNotifier;
pub use windows::{ReminderWindow, ReminderWindows};
