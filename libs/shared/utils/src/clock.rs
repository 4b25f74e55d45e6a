//! Canonical scheduling clock.
//!
//! Every component that compares "now" against stored appointment times takes a
//! [`SchedulingClock`] instead of calling `Utc::now()` directly. Stored times are
//! absolute instants; the clock's fixed offset is only used to render local times.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use tracing::warn;

pub trait SchedulingClock: Send + Sync {
    /// Current instant expressed in the scheduling zone.
    fn now(&self) -> DateTime<FixedOffset>;

    /// The zone all reminder and booking arithmetic is rendered in.
    fn offset(&self) -> FixedOffset;

    fn to_local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset())
    }
}

pub type SharedClock = Arc<dyn SchedulingClock>;

#[derive(Debug, Clone, Copy)]
pub struct FixedOffsetClock {
    offset: FixedOffset,
}

impl FixedOffsetClock {
    pub fn new(offset_hours: i32) -> Self {
        Self { offset: offset_from_hours(offset_hours) }
    }

    pub fn utc() -> Self {
        Self::new(0)
    }
}

impl SchedulingClock for FixedOffsetClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Clock that only moves when told to. Used by the scheduler simulations.
#[derive(Debug)]
pub struct ManualClock {
    offset: FixedOffset,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>, offset_hours: i32) -> Self {
        Self {
            offset: offset_from_hours(offset_hours),
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl SchedulingClock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        let now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        now.with_timezone(&self.offset)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn offset_from_hours(offset_hours: i32) -> FixedOffset {
    offset_hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| {
            warn!("Scheduling offset {}h out of range, using UTC", offset_hours);
            Utc.fix()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_renders_in_configured_offset() {
        let start = Utc.with_ymd_and_hms(2025, 6, 3, 7, 48, 0).unwrap();
        let clock = ManualClock::new(start, 5);

        let local = clock.now();
        assert_eq!(local.format("%d.%m.%Y %H:%M").to_string(), "03.06.2025 12:48");
        assert_eq!(local, start);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 6, 3, 7, 0, 0).unwrap();
        let clock = ManualClock::new(start, 0);

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), start + Duration::minutes(90));
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        let clock = FixedOffsetClock::new(48);
        assert_eq!(clock.offset().local_minus_utc(), 0);
    }
}
