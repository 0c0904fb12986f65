use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use nightcharge_common::TimeOfDay;

use crate::traits::{DeviceClock, LocalTime};

#[derive(Debug, Clone, Copy)]
pub struct HostClock {
    timezone: Tz,
}

impl HostClock {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }
}

#[async_trait]
impl DeviceClock for HostClock {
    async fn now(&self) -> Result<LocalTime> {
        Ok(local_time_at(Utc::now(), self.timezone))
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|err| anyhow!("invalid timezone '{name}': {err}"))
}

pub fn local_time_at(now: DateTime<Utc>, timezone: Tz) -> LocalTime {
    let local = now.with_timezone(&timezone);
    LocalTime {
        time_of_day: TimeOfDay::from_seconds(local.num_seconds_from_midnight()),
        month: local.month(),
        unix_time: now.timestamp(),
    }
}

pub fn month_of(unix_time: i64, timezone: Tz) -> Option<u32> {
    Utc.timestamp_opt(unix_time, 0)
        .single()
        .map(|utc| utc.with_timezone(&timezone).month())
}
