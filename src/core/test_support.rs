// 測試共用的假時鐘
use crate::domain::ports::Clock;
use chrono::{DateTime, FixedOffset, TimeDelta, TimeZone};
use std::sync::Mutex;

pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    /// Wall-clock time in UTC+9.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = kst
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .unwrap();
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }
}
