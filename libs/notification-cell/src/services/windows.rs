use chrono::Duration;

use crate::error::NotificationError;

/// Lead times of the standard reminder set, outermost first.
pub const STANDARD_LEAD_MINUTES: [i64; 5] = [24 * 60, 6 * 60, 60, 30, 5];

/// One reminder, fired when the appointment is `target` away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderWindow {
    label: String,
    target: Duration,
}

impl ReminderWindow {
    pub fn new(target: Duration) -> Self {
        let minutes = target.num_minutes();
        let label = if minutes % 60 == 0 {
            format!("{}h", minutes / 60)
        } else {
            format!("{}m", minutes)
        };

        Self { label, target }
    }

    /// Stable key used for de-duplication: `24h`, `6h`, `1h`, `30m`, `5m`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    fn contains(&self, time_until: Duration, margin: Duration) -> bool {
        time_until >= self.target - margin && time_until <= self.target + margin
    }
}

/// The validated window set.
///
/// Every window is `2 * margin` wide and the margin is never below the poll interval,
/// so each window is observed by at least one tick. Windows never overlap, so a single
/// tick maps an appointment to at most one of them.
#[derive(Debug, Clone)]
pub struct ReminderWindows {
    windows: Vec<ReminderWindow>,
    margin: Duration,
}

impl ReminderWindows {
    pub fn new(
        lead_times: &[Duration],
        margin: Duration,
        poll_interval: Duration,
    ) -> Result<Self, NotificationError> {
        if lead_times.is_empty() {
            return Err(NotificationError::InvalidConfiguration(
                "at least one reminder window is required".to_string(),
            ));
        }
        if margin < poll_interval {
            return Err(NotificationError::InvalidConfiguration(format!(
                "window margin {}s is shorter than the poll interval {}s",
                margin.num_seconds(),
                poll_interval.num_seconds()
            )));
        }

        let mut windows: Vec<ReminderWindow> = lead_times.iter().map(|t| ReminderWindow::new(*t)).collect();
        windows.sort_by(|a, b| b.target.cmp(&a.target));

        if let Some(window) = windows.iter().find(|w| w.target <= Duration::zero()) {
            return Err(NotificationError::InvalidConfiguration(format!(
                "reminder window {} must lie before the appointment",
                window.label
            )));
        }

        for pair in windows.windows(2) {
            let gap = pair[0].target - pair[1].target;
            if margin * 2 > gap {
                return Err(NotificationError::InvalidConfiguration(format!(
                    "windows {} and {} overlap with a margin of {}s",
                    pair[0].label,
                    pair[1].label,
                    margin.num_seconds()
                )));
            }
        }

        Ok(Self { windows, margin })
    }

    /// 24h, 6h, 1h, 30m and 5m before the start.
    pub fn standard(margin: Duration, poll_interval: Duration) -> Result<Self, NotificationError> {
        let lead_times: Vec<Duration> = STANDARD_LEAD_MINUTES.iter().map(|m| Duration::minutes(*m)).collect();
        Self::new(&lead_times, margin, poll_interval)
    }

    pub fn classify(&self, time_until: Duration) -> Option<&ReminderWindow> {
        self.windows.iter().find(|w| w.contains(time_until, self.margin))
    }

    /// The window closest to the start; it carries the join link.
    pub fn is_innermost(&self, window: &ReminderWindow) -> bool {
        self.windows.last().is_some_and(|last| last == window)
    }

    pub fn margin(&self) -> Duration {
        self.margin
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReminderWindow> {
        self.windows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn standard() -> ReminderWindows {
        ReminderWindows::standard(Duration::minutes(5), Duration::seconds(60)).unwrap()
    }

    #[test]
    fn test_labels() {
        let windows = standard();
        let labels: Vec<&str> = windows.iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["24h", "6h", "1h", "30m", "5m"]);
    }

    #[test]
    fn test_classify_edges_are_inclusive() {
        let windows = standard();

        assert_eq!(windows.classify(Duration::hours(24) + Duration::minutes(5)).unwrap().label(), "24h");
        assert_eq!(windows.classify(Duration::hours(24) - Duration::minutes(5)).unwrap().label(), "24h");
        assert!(windows.classify(Duration::hours(24) + Duration::minutes(6)).is_none());
        assert_eq!(windows.classify(Duration::minutes(32)).unwrap().label(), "30m");
        assert_eq!(windows.classify(Duration::zero()).unwrap().label(), "5m");
        assert!(windows.classify(Duration::hours(3)).is_none());
    }

    #[test]
    fn test_innermost_is_smallest_lead_time() {
        let windows = standard();
        let five = windows.classify(Duration::minutes(5)).unwrap();
        let hour = windows.classify(Duration::hours(1)).unwrap();

        assert!(windows.is_innermost(five));
        assert!(!windows.is_innermost(hour));
    }

    #[test]
    fn test_margin_below_poll_interval_is_rejected() {
        let result = ReminderWindows::standard(Duration::seconds(30), Duration::seconds(60));
        assert_matches!(result, Err(NotificationError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_overlapping_windows_are_rejected() {
        // 30m and 5m are 25 minutes apart.
        let result = ReminderWindows::standard(Duration::minutes(13), Duration::seconds(60));
        assert_matches!(result, Err(NotificationError::InvalidConfiguration(message)) if message.contains("30m"));
    }

    #[test]
    fn test_custom_windows_are_sorted() {
        let windows = ReminderWindows::new(
            &[Duration::minutes(10), Duration::hours(2)],
            Duration::minutes(2),
            Duration::seconds(30),
        )
        .unwrap();

        let labels: Vec<&str> = windows.iter().map(|w| w.label()).collect();
        assert_eq!(labels, vec!["2h", "10m"]);
    }
}
