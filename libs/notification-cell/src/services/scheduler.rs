use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use appointment_cell::{AppointmentStatus, AppointmentStore, ReminderTarget};
use shared_config::AppConfig;
use shared_utils::clock::SharedClock;

use crate::error::NotificationError;
use crate::services::dedup::SentReminders;
use crate::services::messages::{join_prompt, reminder_text, Language};
use crate::services::notifier::Notifier;
use crate::services::windows::{ReminderWindow, ReminderWindows};

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval: std::time::Duration,
    pub lookahead: Duration,
    pub window_margin: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self, NotificationError> {
        let lookahead = Duration::try_hours(config.reminder_lookahead_hours).ok_or_else(|| {
            NotificationError::InvalidConfiguration(format!(
                "reminder lookahead of {} hours is out of range",
                config.reminder_lookahead_hours
            ))
        })?;
        let window_margin = Duration::try_seconds(config.reminder_window_margin_secs).ok_or_else(|| {
            NotificationError::InvalidConfiguration(format!(
                "reminder window margin of {} seconds is out of range",
                config.reminder_window_margin_secs
            ))
        })?;

        Ok(Self {
            poll_interval: std::time::Duration::from_secs(config.reminder_poll_interval_secs),
            lookahead,
            window_margin,
        })
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: std::time::Duration::from_secs(60),
            lookahead: Duration::hours(25),
            window_margin: Duration::minutes(5),
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub scanned: usize,
    pub sent: usize,
    pub failed: usize,
    pub already_sent: usize,
    pub skipped_no_recipient: usize,
    pub pruned: usize,
}

impl TickReport {
    fn is_quiet(&self) -> bool {
        self.sent == 0 && self.failed == 0 && self.skipped_no_recipient == 0
    }
}

pub struct ReminderScheduler {
    store: Arc<dyn AppointmentStore>,
    notifier: Arc<dyn Notifier>,
    clock: SharedClock,
    windows: ReminderWindows,
    settings: SchedulerSettings,
    sent: SentReminders,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("windows", &self.windows)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
        settings: SchedulerSettings,
    ) -> Result<Self, NotificationError> {
        let poll_interval = Duration::from_std(settings.poll_interval)
            .map_err(|e| NotificationError::InvalidConfiguration(format!("poll interval: {}", e)))?;
        if poll_interval <= Duration::zero() {
            return Err(NotificationError::InvalidConfiguration(
                "poll interval must be positive".to_string(),
            ));
        }

        let windows = ReminderWindows::standard(settings.window_margin, poll_interval)?;
        Ok(Self::with_windows(store, notifier, clock, windows, settings))
    }

    pub fn with_windows(
        store: Arc<dyn AppointmentStore>,
        notifier: Arc<dyn Notifier>,
        clock: SharedClock,
        windows: ReminderWindows,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            windows,
            settings,
            sent: SentReminders::new(),
        }
    }

    /// Number of `(appointment, window)` pairs currently remembered.
    pub fn remembered(&self) -> usize {
        self.sent.len()
    }

    /// One scan over the upcoming appointments. Fails only when the targets cannot be
    /// read; delivery failures are counted in the report.
    #[instrument(skip(self))]
    pub async fn tick(&mut self) -> Result<TickReport, NotificationError> {
        let now = self.clock.now().with_timezone(&Utc);
        let mut report = TickReport {
            pruned: self.sent.prune(now),
            ..TickReport::default()
        };

        let targets = self
            .store
            .reminder_targets(now, now + self.settings.lookahead, AppointmentStatus::upcoming())
            .await?;

        for target in targets {
            report.scanned += 1;

            let Some(window) = self.windows.classify(target.start_time - now) else {
                continue;
            };
            if self.sent.contains(target.appointment_id, window.label()) {
                report.already_sent += 1;
                continue;
            }
            let Some(chat_id) = target.chat_id else {
                debug!("Appointment {} has no chat to remind, skipping", target.appointment_id);
                report.skipped_no_recipient += 1;
                continue;
            };

            // Recorded before sending: a failed delivery is not retried.
            self.sent.record(target.appointment_id, window.label(), target.start_time);

            match self.deliver(&target, window, chat_id).await {
                Ok(()) => {
                    info!("Sent {} reminder for appointment {}", window.label(), target.appointment_id);
                    report.sent += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to send {} reminder for appointment {}: {}",
                        window.label(),
                        target.appointment_id,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        if report.is_quiet() {
            debug!(?report, "Reminder tick finished");
        } else {
            info!(?report, "Reminder tick finished");
        }

        Ok(report)
    }

    async fn deliver(
        &self,
        target: &ReminderTarget,
        window: &ReminderWindow,
        chat_id: i64,
    ) -> Result<(), NotificationError> {
        let live = self.notifier.resolve_recipient_language(chat_id).await;
        let language = Language::resolve(target.language.as_deref(), live.as_deref());
        let local_start = self.clock.to_local(target.start_time);

        if self.windows.is_innermost(window) {
            let prompt = join_prompt(language, target, local_start);
            return self.notifier.send_join_link(chat_id, target.appointment_id, &prompt).await;
        }

        let text = reminder_text(language, target, window, local_start);
        self.notifier.send_text(chat_id, &text).await
    }

    /// Ticks every poll interval until `shutdown` flips to `true` or its sender goes away.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Reminder scheduler started (poll every {}s, margin {}s)",
            self.settings.poll_interval.as_secs(),
            self.windows.margin().num_seconds()
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick().await {
                        error!("Reminder tick failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reminder scheduler stopped");
    }
}
