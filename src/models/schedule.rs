use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

const WINDOW_TICK: Duration = Duration::from_secs(60);

/// When the dedup broadcaster fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BroadcastSchedule {
    Interval(Duration),
    DailyWindow(DailyWindow),
}

impl BroadcastSchedule {
    pub fn tick(&self) -> Duration {
        match self {
            BroadcastSchedule::Interval(period) => *period,
            BroadcastSchedule::DailyWindow(_) => WINDOW_TICK,
        }
    }

    pub fn should_fire(&self, now: DateTime<Utc>) -> bool {
        match self {
            BroadcastSchedule::Interval(_) => true,
            BroadcastSchedule::DailyWindow(window) => window.contains(now),
        }
    }
}

/// Inclusive local-time window, compared at minute granularity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyWindow {
    pub timezone: Tz,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    pub fn parse(timezone: &str, start: &str, end: &str) -> Result<Self, Error> {
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|_| anyhow!("Unknown timezone '{}'", timezone))?;

        let start = NaiveTime::parse_from_str(start, "%H:%M")
            .map_err(|e| anyhow!("Invalid window start '{}': {}", start, e))?;
        let end = NaiveTime::parse_from_str(end, "%H:%M")
            .map_err(|e| anyhow!("Invalid window end '{}': {}", end, e))?;

        if end < start {
            return Err(anyhow!("Broadcast window must not wrap past midnight"));
        }

        Ok(Self {
            timezone,
            start,
            end,
        })
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        let minute = minute_of_day(local.hour(), local.minute());

        minute_of_day(self.start.hour(), self.start.minute()) <= minute
            && minute <= minute_of_day(self.end.hour(), self.end.minute())
    }
}

fn minute_of_day(hour: u32, minute: u32) -> u32 {
    hour * 60 + minute
}
