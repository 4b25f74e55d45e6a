use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use video_conferencing_cell::{JoinLinkBuilder, ParticipantRole};

use crate::error::NotificationError;
use crate::services::messages::JoinPrompt;
use crate::services::notifier::Notifier;

/// Telegram Bot API delivery through `sendMessage`.
pub struct TelegramNotifier {
    client: Client,
    api_base_url: String,
    token: String,
    links: JoinLinkBuilder,
    public_base_url: Option<String>,
    languages: RwLock<HashMap<i64, String>>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base_url", &self.api_base_url)
            .field("public_base_url", &self.public_base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(config: &AppConfig) -> Result<Self, NotificationError> {
        let token = config
            .telegram_bot_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| NotificationError::InvalidConfiguration("TELEGRAM_BOT_TOKEN is not set".to_string()))?;

        Ok(Self {
            client: Client::new(),
            api_base_url: config.telegram_api_base_url.trim_end_matches('/').to_string(),
            token,
            links: JoinLinkBuilder::from_config(config),
            public_base_url: config.public_base_url.clone(),
            languages: RwLock::new(HashMap::new()),
        })
    }

    /// Records the language a user picked in the bot.
    pub async fn remember_language(&self, chat_id: i64, code: &str) {
        self.languages.write().await.insert(chat_id, code.to_string());
    }

    async fn send_message(&self, body: Value) -> Result<(), NotificationError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base_url, self.token);
        debug!("Sending Telegram message to chat {}", body["chat_id"]);

        let response = self.client.post(&url).json(&body).send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() || payload["ok"] != Value::Bool(true) {
            let description = payload["description"].as_str().unwrap_or("no description");
            error!("Telegram API error {}: {}", status, description);
            return Err(NotificationError::DeliveryFailed(format!(
                "Telegram API error {}: {}",
                status, description
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text))]
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), NotificationError> {
        self.send_message(json!({
            "chat_id": chat_id,
            "text": text,
        }))
        .await
    }

    #[instrument(skip(self, prompt))]
    async fn send_join_link(
        &self,
        chat_id: i64,
        appointment_id: Uuid,
        prompt: &JoinPrompt,
    ) -> Result<(), NotificationError> {
        let link = self.links.for_appointment(appointment_id);

        // Inline buttons only take absolute URLs.
        let body = match &self.public_base_url {
            Some(base) => json!({
                "chat_id": chat_id,
                "text": prompt.text,
                "reply_markup": {
                    "inline_keyboard": [[{
                        "text": prompt.button,
                        "url": link.absolute(base, ParticipantRole::Patient),
                    }]]
                },
            }),
            None => json!({
                "chat_id": chat_id,
                "text": format!("{}\n{}", prompt.text, link.for_role(ParticipantRole::Patient)),
            }),
        };

        self.send_message(body).await
    }

    async fn resolve_recipient_language(&self, chat_id: i64) -> Option<String> {
        self.languages.read().await.get(&chat_id).cloned()
    }
}
