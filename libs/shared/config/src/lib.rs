use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub bind_address: String,
    pub public_base_url: Option<String>,
    pub video_room_path: String,
    pub scheduling_utc_offset_hours: i32,
    pub reminder_poll_interval_secs: u64,
    pub reminder_lookahead_hours: i64,
    pub reminder_window_margin_secs: i64,
    pub slot_step_minutes: i64,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: String,
    pub signaling_max_connection_secs: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            bind_address: "0.0.0.0:3000".to_string(),
            public_base_url: None,
            video_room_path: "/webrtc/room".to_string(),
            scheduling_utc_offset_hours: 5,
            reminder_poll_interval_secs: 60,
            reminder_lookahead_hours: 25,
            reminder_window_margin_secs: 300,
            slot_step_minutes: 30,
            telegram_bot_token: None,
            telegram_api_base_url: "https://api.telegram.org".to_string(),
            signaling_max_connection_secs: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, falling back to in-memory storage");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| defaults.bind_address.clone()),
            public_base_url: optional_var("PUBLIC_BASE_URL"),
            video_room_path: env::var("VIDEO_ROOM_PATH")
                .unwrap_or_else(|_| defaults.video_room_path.clone()),
            scheduling_utc_offset_hours: parsed_var(
                "SCHEDULING_UTC_OFFSET_HOURS",
                defaults.scheduling_utc_offset_hours,
            ),
            reminder_poll_interval_secs: parsed_var(
                "REMINDER_POLL_INTERVAL_SECS",
                defaults.reminder_poll_interval_secs,
            ),
            reminder_lookahead_hours: parsed_var(
                "REMINDER_LOOKAHEAD_HOURS",
                defaults.reminder_lookahead_hours,
            ),
            reminder_window_margin_secs: parsed_var(
                "REMINDER_WINDOW_MARGIN_SECS",
                defaults.reminder_window_margin_secs,
            ),
            slot_step_minutes: parsed_var("SLOT_STEP_MINUTES", defaults.slot_step_minutes),
            telegram_bot_token: optional_var("TELEGRAM_BOT_TOKEN"),
            telegram_api_base_url: env::var("TELEGRAM_API_BASE_URL")
                .unwrap_or_else(|_| defaults.telegram_api_base_url.clone()),
            signaling_max_connection_secs: optional_var("SIGNALING_MAX_CONNECTION_SECS")
                .and_then(|raw| match raw.parse() {
                    Ok(secs) => Some(secs),
                    Err(_) => {
                        warn!("SIGNALING_MAX_CONNECTION_SECS is not a number, ignoring");
                        None
                    }
                }),
        };

        if !config.is_database_configured() {
            warn!("Database not configured - appointments will not survive a restart");
        }

        if !config.is_telegram_configured() {
            warn!("TELEGRAM_BOT_TOKEN not set - reminders will only be logged");
        }

        config
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_service_role_key.is_empty()
    }

    pub fn is_telegram_configured(&self) -> bool {
        self.telegram_bot_token
            .as_deref()
            .map(|token| !token.is_empty())
            .unwrap_or(false)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = AppConfig::default();

        assert_eq!(config.scheduling_utc_offset_hours, 5);
        assert_eq!(config.reminder_poll_interval_secs, 60);
        assert_eq!(config.reminder_lookahead_hours, 25);
        assert_eq!(config.video_room_path, "/webrtc/room");
        assert!(!config.is_database_configured());
        assert!(!config.is_telegram_configured());
    }

    #[test]
    fn test_empty_telegram_token_is_not_configured() {
        let config = AppConfig {
            telegram_bot_token: Some(String::new()),
            ..AppConfig::default()
        };

        assert!(!config.is_telegram_configured());
    }
}
