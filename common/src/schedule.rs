use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

pub const SECONDS_PER_DAY: u32 = 86_400;

/// A wall-clock time within one day, stored as seconds since local midnight.
///
/// Always in `[0, 86400)`. Serialized as `"HH:MM"` (or `"HH:MM:SS"` when the
/// seconds are not zero) so config files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: Self = Self(0);

    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Option<Self> {
        if hour >= 24 || minute >= 60 || second >= 60 {
            return None;
        }
        Some(Self(hour * 3600 + minute * 60 + second))
    }

    /// Const constructor for fixed times; out-of-range input wraps around the day.
    pub const fn from_hm(hour: u32, minute: u32) -> Self {
        Self((hour * 3600 + minute * 60) % SECONDS_PER_DAY)
    }

    pub fn from_seconds(seconds: u32) -> Self {
        Self(seconds % SECONDS_PER_DAY)
    }

    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidTimeOfDay(value.to_string());
        let mut parts = value.trim().split(':');

        let mut next_field = |required: bool| -> Result<u32, ConfigError> {
            match parts.next() {
                Some(field) if !field.is_empty() && field.len() <= 2 => {
                    field.parse::<u32>().map_err(|_| invalid())
                }
                None if !required => Ok(0),
                _ => Err(invalid()),
            }
        };

        let hour = next_field(true)?;
        let minute = next_field(true)?;
        let second = next_field(false)?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Self::from_hms(hour, minute, second).ok_or_else(invalid)
    }

    pub fn seconds(self) -> u32 {
        self.0
    }

    pub fn hour(self) -> u32 {
        self.0 / 3600
    }

    pub fn minute(self) -> u32 {
        self.0 / 60 % 60
    }

    pub fn second(self) -> u32 {
        self.0 % 60
    }

    /// Minute resolution used by the daily trigger.
    pub fn minute_of_day(self) -> u32 {
        self.0 / 60
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.second() == 0 {
            write!(f, "{:02}:{:02}", self.hour(), self.minute())
        } else {
            write!(
                f,
                "{:02}:{:02}:{:02}",
                self.hour(),
                self.minute(),
                self.second()
            )
        }
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargingWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// Result of backward scheduling: when to switch on and for how long.
///
/// A zero duration means nothing gets scheduled this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChargePlan {
    pub start: TimeOfDay,
    #[serde(rename = "durationSecs")]
    pub duration_secs: u32,
    /// Set when the requested duration did not fit and was cut to the window.
    pub clamped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledAction {
    #[serde(rename = "switchId")]
    pub switch_id: u32,
    pub start: TimeOfDay,
    #[serde(rename = "durationSecs")]
    pub duration_secs: u32,
}

impl ChargingWindow {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn span_secs(&self) -> u32 {
        if self.wraps_midnight() {
            (SECONDS_PER_DAY - self.start.seconds()) + self.end.seconds()
        } else {
            self.end.seconds() - self.start.seconds()
        }
    }

    /// Half-open membership: the window start is inside, the end is not.
    pub fn contains(&self, time: TimeOfDay) -> bool {
        if self.wraps_midnight() {
            time >= self.start || time < self.end
        } else {
            self.start <= time && time < self.end
        }
    }

    /// Anchors the charge so it completes exactly at the window end.
    pub fn plan_backward(&self, required_secs: u32) -> ChargePlan {
        let span = self.span_secs();
        let clamped = required_secs > span;
        let duration = required_secs.min(span);

        if duration == 0 {
            return ChargePlan {
                start: self.end,
                duration_secs: 0,
                clamped,
            };
        }

        let candidate = TimeOfDay::from_seconds(
            (self.end.seconds() + SECONDS_PER_DAY - duration) % SECONDS_PER_DAY,
        );

        if self.contains(candidate) {
            return ChargePlan {
                start: candidate,
                duration_secs: duration,
                clamped,
            };
        }

        // Only reachable with a degenerate window; charge the whole window.
        ChargePlan {
            start: self.start,
            duration_secs: span,
            clamped: true,
        }
    }
}

impl fmt::Display for ChargingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl ChargePlan {
    pub fn is_idle(&self) -> bool {
        self.duration_secs == 0
    }

    pub fn end(&self) -> TimeOfDay {
        TimeOfDay::from_seconds(self.start.seconds() + self.duration_secs)
    }

    pub fn actions(&self, switch_ids: &[u32]) -> Vec<ScheduledAction> {
        if self.is_idle() {
            return Vec::new();
        }

        switch_ids
            .iter()
            .map(|&switch_id| ScheduledAction {
                switch_id,
                start: self.start,
                duration_secs: self.duration_secs,
            })
            .collect()
    }
}
