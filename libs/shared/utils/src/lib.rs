pub mod clock;
pub mod test_utils;

pub use clock::{FixedOffsetClock, ManualClock, SchedulingClock, SharedClock};
