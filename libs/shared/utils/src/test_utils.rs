use std::sync::Arc;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_service_role_key: String,
    pub public_base_url: Option<String>,
    pub telegram_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_service_role_key: String::new(),
            public_base_url: Some("https://clinic.test".to_string()),
            telegram_api_base_url: "http://localhost:9".to_string(),
        }
    }
}

impl TestConfig {
    /// Config pointing the Supabase client at a mock server.
    pub fn with_supabase(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            supabase_service_role_key: "test-service-role-key".to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_role_key: self.supabase_service_role_key.clone(),
            public_base_url: self.public_base_url.clone(),
            telegram_api_base_url: self.telegram_api_base_url.clone(),
            telegram_bot_token: Some("test-bot-token".to_string()),
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Shorthand for fixed UTC instants in tests.
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .unwrap_or_else(|| panic!("invalid test timestamp {year}-{month}-{day} {hour}:{minute}"))
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn schedule_row(schedule_id: Uuid, doctor_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> serde_json::Value {
        json!({
            "id": schedule_id,
            "doctor_id": doctor_id,
            "service_id": Uuid::new_v4(),
            "start_time": start,
            "end_time": end,
            "color": "#4f9dde",
            "is_visible": true
        })
    }

    pub fn timeslot_row(timeslot_id: Uuid, schedule_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>, booked: bool) -> serde_json::Value {
        json!({
            "id": timeslot_id,
            "schedule_id": schedule_id,
            "start_time": start,
            "end_time": end,
            "is_booked": booked,
            "created_at": "2025-06-01T00:00:00Z"
        })
    }

    pub fn appointment_row(appointment_id: Uuid, timeslot_id: Uuid, patient_id: Uuid, status: &str) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "timeslot_id": timeslot_id,
            "patient_id": patient_id,
            "status": status,
            "created_at": "2025-06-01T00:00:00Z",
            "updated_at": "2025-06-01T00:00:00Z"
        })
    }

    pub fn video_session_row(appointment_id: Uuid, room_name: &str, video_url: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment_id,
            "room_name": room_name,
            "video_url": video_url,
            "started_at": "2025-06-01T00:00:00Z",
            "ended_at": null
        })
    }

    pub fn telegram_ok_response() -> serde_json::Value {
        json!({
            "ok": true,
            "result": { "message_id": 1 }
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::with_supabase("http://localhost:54321");
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert!(app_config.is_database_configured());
        assert!(app_config.is_telegram_configured());
    }

    #[test]
    fn test_default_config_uses_memory_storage() {
        let app_config = TestConfig::default().to_app_config();
        assert!(!app_config.is_database_configured());
    }

    #[test]
    fn test_utc_helper() {
        let instant = utc(2025, 6, 3, 10, 30);
        assert_eq!(instant.to_rfc3339(), "2025-06-03T10:30:00+00:00");
    }
}
