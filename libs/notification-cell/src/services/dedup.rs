use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// `(appointment, window)` pairs already fired, with the appointment start so entries
/// can be dropped once the appointment has begun. Lives only in memory.
#[derive(Debug, Default)]
pub struct SentReminders {
    entries: HashMap<(Uuid, String), DateTime<Utc>>,
}

impl SentReminders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, appointment_id: Uuid, window: &str) -> bool {
        self.entries.contains_key(&(appointment_id, window.to_string()))
    }

    /// Returns `false` when the pair was already recorded.
    pub fn record(&mut self, appointment_id: Uuid, window: &str, start_time: DateTime<Utc>) -> bool {
        self.entries
            .insert((appointment_id, window.to_string()), start_time)
            .is_none()
    }

    /// Drops entries whose appointment already started; returns how many went.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, start_time| *start_time >= now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_once() {
        let mut sent = SentReminders::new();
        let id = Uuid::new_v4();
        let start = Utc::now() + Duration::hours(1);

        assert!(sent.record(id, "1h", start));
        assert!(!sent.record(id, "1h", start));
        assert!(sent.record(id, "30m", start));
        assert!(sent.contains(id, "1h"));
        assert!(!sent.contains(Uuid::new_v4(), "1h"));
    }

    #[test]
    fn test_prune_drops_started_appointments() {
        let mut sent = SentReminders::new();
        let now = Utc::now();
        sent.record(Uuid::new_v4(), "5m", now - Duration::minutes(1));
        sent.record(Uuid::new_v4(), "5m", now + Duration::minutes(4));

        assert_eq!(sent.prune(now), 1);
        assert_eq!(sent.len(), 1);
    }
}
