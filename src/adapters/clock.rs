use crate::domain::ports::Clock;
use chrono::{DateTime, FixedOffset, Utc};

/// Korea Standard Time, the timezone the cafeterias publish in.
pub const KST_OFFSET_HOURS: i32 = 9;

/// Wall clock pinned to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    offset: FixedOffset,
}

impl ZonedClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Falls back to KST when the offset is out of range.
    pub fn from_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(kst);
        Self::new(offset)
    }

    pub fn kst() -> Self {
        Self::new(kst())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_HOURS * 3600).expect("KST offset is in range")
}

impl Default for ZonedClock {
    fn default() -> Self {
        Self::kst()
    }
}

impl Clock for ZonedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}
