use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::services::messages::JoinPrompt;

/// Outbound channel to a patient's messenger chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), NotificationError>;

    /// Sends the patient's call link for the appointment along with the prompt text.
    async fn send_join_link(
        &self,
        chat_id: i64,
        appointment_id: Uuid,
        prompt: &JoinPrompt,
    ) -> Result<(), NotificationError>;

    /// Language the recipient picked in the messenger, if any.
    async fn resolve_recipient_language(&self, chat_id: i64) -> Option<String>;
}

/// Writes reminders to the log. Used when no bot token is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), NotificationError> {
        info!(chat_id, "Reminder (not delivered, no messenger configured): {}", text);
        Ok(())
    }

    async fn send_join_link(
        &self,
        chat_id: i64,
        appointment_id: Uuid,
        prompt: &JoinPrompt,
    ) -> Result<(), NotificationError> {
        info!(
            chat_id,
            %appointment_id,
            "Join link reminder (not delivered, no messenger configured): {}",
            prompt.text
        );
        Ok(())
    }

    async fn resolve_recipient_language(&self, _chat_id: i64) -> Option<String> {
        None
    }
}
