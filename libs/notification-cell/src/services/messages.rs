use chrono::{DateTime, Duration, FixedOffset};

use appointment_cell::ReminderTarget;

use crate::services::windows::ReminderWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Ru,
    Kz,
    En,
}

impl Language {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "ru" => Some(Language::Ru),
            "kz" | "kk" => Some(Language::Kz),
            "en" => Some(Language::En),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::Ru => "ru",
            Language::Kz => "kz",
            Language::En => "en",
        }
    }

    /// The recipient's live choice wins over the stored one; anything unsupported
    /// falls through to Russian.
    pub fn resolve(stored: Option<&str>, live: Option<&str>) -> Self {
        live.and_then(Self::from_code)
            .or_else(|| stored.and_then(Self::from_code))
            .unwrap_or_default()
    }
}

fn russian_plural(n: i64, one: &'static str, few: &'static str, many: &'static str) -> &'static str {
    let tail = n % 100;
    if (11..=14).contains(&tail) {
        return many;
    }
    match n % 10 {
        1 => one,
        2..=4 => few,
        _ => many,
    }
}

/// "24 часа", "30 минут", "1 hour".
pub fn time_left(language: Language, lead: Duration) -> String {
    let minutes = lead.num_minutes();
    let (n, hours) = if minutes % 60 == 0 { (minutes / 60, true) } else { (minutes, false) };

    let unit = match (language, hours) {
        (Language::Ru, true) => russian_plural(n, "час", "часа", "часов"),
        (Language::Ru, false) => russian_plural(n, "минута", "минуты", "минут"),
        (Language::Kz, true) => "сағат",
        (Language::Kz, false) => "минут",
        (Language::En, true) if n == 1 => "hour",
        (Language::En, true) => "hours",
        (Language::En, false) if n == 1 => "minute",
        (Language::En, false) => "minutes",
    };

    format!("{} {}", n, unit)
}

pub fn format_local_time(start: DateTime<FixedOffset>) -> String {
    start.format("%d.%m.%Y %H:%M").to_string()
}

fn appointment_details(language: Language, target: &ReminderTarget, local_start: DateTime<FixedOffset>) -> String {
    let when = format_local_time(local_start);

    match language {
        Language::Ru => format!(
            "Врач: {}\nУслуга: {}\nВремя: {}",
            target.doctor_name, target.service_name, when
        ),
        Language::Kz => format!(
            "Дәрігер: {}\nҚызмет: {}\nУақыт: {}",
            target.doctor_name, target.service_name, when
        ),
        Language::En => format!(
            "Doctor: {}\nService: {}\nTime: {}",
            target.doctor_name, target.service_name, when
        ),
    }
}

/// Text reminder for every window except the innermost one.
pub fn reminder_text(
    language: Language,
    target: &ReminderTarget,
    window: &ReminderWindow,
    local_start: DateTime<FixedOffset>,
) -> String {
    let details = appointment_details(language, target, local_start);
    let left = time_left(language, window.target());

    match language {
        Language::Ru => format!(
            "🔔 Напоминание о записи к врачу\n\n{}\n\nДо приема осталось: {}",
            details, left
        ),
        Language::Kz => format!(
            "🔔 Дәрігерге жазылу туралы еске салу\n\n{}\n\nҚабылдауға дейін: {}",
            details, left
        ),
        Language::En => format!("🔔 Appointment reminder\n\n{}\n\nTime left: {}", details, left),
    }
}

/// Message and button caption sent with the join link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinPrompt {
    pub text: String,
    pub button: &'static str,
}

pub fn join_prompt(language: Language, target: &ReminderTarget, local_start: DateTime<FixedOffset>) -> JoinPrompt {
    let details = appointment_details(language, target, local_start);

    let (call_to_action, button) = match language {
        Language::Ru => (
            "Через 5 минут начнется прием. Пожалуйста, проверьте готовность оборудования и подключитесь к видеозвонку",
            "Подключиться",
        ),
        Language::Kz => (
            "5 минуттан кейін қабылдау басталады. Өтінеміз, дайындықты тексеріп, төмендегі сілтеме арқылы қосылыңыз:",
            "Қосылу",
        ),
        Language::En => (
            "Your appointment starts in 5 minutes. Please check your camera and microphone and join the video call",
            "Join call",
        ),
    };

    JoinPrompt {
        text: format!("{}\n\n{}", details, call_to_action),
        button,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use appointment_cell::AppointmentStatus;

    fn target() -> ReminderTarget {
        ReminderTarget {
            appointment_id: Uuid::new_v4(),
            status: AppointmentStatus::Booked,
            start_time: Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
            chat_id: Some(42),
            language: None,
            doctor_name: "Айгерим Садыкова".to_string(),
            service_name: "Консультация терапевта".to_string(),
        }
    }

    #[test]
    fn test_language_resolution() {
        assert_eq!(Language::resolve(Some("kz"), None), Language::Kz);
        assert_eq!(Language::resolve(Some("kz"), Some("en")), Language::En);
        assert_eq!(Language::resolve(Some("de"), Some("fr")), Language::Ru);
        assert_eq!(Language::resolve(None, None), Language::Ru);
    }

    #[test]
    fn test_time_left_phrases() {
        assert_eq!(time_left(Language::Ru, Duration::hours(24)), "24 часа");
        assert_eq!(time_left(Language::Ru, Duration::hours(6)), "6 часов");
        assert_eq!(time_left(Language::Ru, Duration::hours(1)), "1 час");
        assert_eq!(time_left(Language::Ru, Duration::minutes(30)), "30 минут");
        assert_eq!(time_left(Language::Kz, Duration::hours(24)), "24 сағат");
        assert_eq!(time_left(Language::En, Duration::hours(1)), "1 hour");
        assert_eq!(time_left(Language::En, Duration::minutes(30)), "30 minutes");
    }

    #[test]
    fn test_reminder_text_uses_local_time() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let target = target();
        let window = ReminderWindow::new(Duration::hours(6));

        let text = reminder_text(Language::Ru, &target, &window, target.start_time.with_timezone(&offset));

        assert!(text.contains("Врач: Айгерим Садыкова"));
        assert!(text.contains("Время: 14.03.2025 14:00"));
        assert!(text.ends_with("До приема осталось: 6 часов"));
    }

    #[test]
    fn test_join_prompt_carries_appointment_details() {
        let offset = FixedOffset::east_opt(5 * 3600).unwrap();
        let target = target();

        let prompt = join_prompt(Language::Kz, &target, target.start_time.with_timezone(&offset));

        assert_eq!(prompt.button, "Қосылу");
        assert!(prompt.text.contains("Дәрігер: Айгерим Садыкова"));
        assert!(prompt.text.contains("Қызмет: Консультация терапевта"));
        assert!(prompt.text.contains("Уақыт: 14.03.2025 14:00"));
        assert!(prompt.text.ends_with("қосылыңыз:"));
    }
}
