//! Schedule windows for event definitions.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// An inclusive `HH:MM-HH:MM` window within one local day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeRange {
    /// Window opening time.
    pub start: NaiveTime,
    /// Window closing time (inclusive, minute resolution).
    pub end: NaiveTime,
}

impl TimeRange {
    /// The whole day, `00:00-23:59`.
    #[must_use]
    pub fn all_day() -> Self {
        Self {
            start: NaiveTime::MIN,
            end: NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN),
        }
    }

    /// Whether `time` falls inside the window. Compared at minute resolution.
    #[must_use]
    pub fn contains(&self, time: NaiveTime) -> bool {
        let minute = NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time);
        self.start <= minute && minute <= self.end
    }
}

impl TryFrom<String> for TimeRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| format!("time range {value:?} must look like HH:MM-HH:MM"))?;
        let parse = |s: &str| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .map_err(|e| format!("invalid time {s:?} in range {value:?}: {e}"))
        };
        let range = Self {
            start: parse(start)?,
            end: parse(end)?,
        };
        if range.start > range.end {
            return Err(format!("time range {value:?} ends before it starts"));
        }
        Ok(range)
    }
}

impl From<TimeRange> for String {
    fn from(value: TimeRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

fn default_time_ranges() -> Vec<TimeRange> {
    vec![TimeRange::all_day()]
}

fn default_duration_minutes() -> u32 {
    30
}

/// When and how often a definition may start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    /// Allowed weekdays, `0` = Monday through `6` = Sunday. Empty means every day.
    #[serde(default)]
    pub days: Vec<u8>,
    /// Allowed local time windows.
    #[serde(default = "default_time_ranges")]
    pub time_ranges: Vec<TimeRange>,
    /// Minimum gap between the end of one run and the start of the next.
    #[serde(default)]
    pub cooldown_minutes: u32,
    /// Chance per tick of starting once every other check passes.
    /// Values of `1.0` or more always fire.
    #[serde(default)]
    pub probability: f64,
    /// Run length.
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
}

impl Schedule {
    /// Whether the local time falls on an allowed day and inside a window.
    #[must_use]
    pub fn is_open(&self, local: DateTime<FixedOffset>) -> bool {
        let weekday = u8::try_from(local.weekday().num_days_from_monday()).unwrap_or(u8::MAX);
        if !self.days.is_empty() && !self.days.contains(&weekday) {
            return false;
        }
        self.time_ranges.iter().any(|r| r.contains(local.time()))
    }

    /// Cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }

    /// Run length as a duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether a probability roll is needed at all.
    #[must_use]
    pub fn always_fires(&self) -> bool {
        self.probability >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn schedule(days: Vec<u8>, ranges: &[&str]) -> Schedule {
        Schedule {
            days,
            time_ranges: ranges
                .iter()
                .map(|r| TimeRange::try_from((*r).to_owned()).unwrap())
                .collect(),
            cooldown_minutes: 0,
            probability: 1.0,
            duration_minutes: 30,
        }
    }

    fn utc_plus_7(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(7 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_time_range_parses_and_displays() {
        let range = TimeRange::try_from("18:00-23:59".to_owned()).unwrap();

        assert_eq!(range.start, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(range.to_string(), "18:00-23:59");
    }

    #[test]
    fn test_time_range_rejects_garbage() {
        assert!(TimeRange::try_from("18:00".to_owned()).is_err());
        assert!(TimeRange::try_from("25:00-26:00".to_owned()).is_err());
        assert!(TimeRange::try_from("20:00-08:00".to_owned()).is_err());
    }

    #[test]
    fn test_window_end_is_inclusive_at_minute_resolution() {
        let sched = schedule(vec![], &["18:00-19:30"]);

        // 2026-01-15 is a Thursday.
        assert!(sched.is_open(utc_plus_7(2026, 1, 15, 19, 30)));
        assert!(sched.is_open(utc_plus_7(2026, 1, 15, 18, 0)));
        assert!(!sched.is_open(utc_plus_7(2026, 1, 15, 19, 31)));
        assert!(!sched.is_open(utc_plus_7(2026, 1, 15, 17, 59)));
    }

    #[test]
    fn test_weekday_filter() {
        // Saturday = 5, Sunday = 6.
        let sched = schedule(vec![5, 6], &["00:00-23:59"]);

        assert!(!sched.is_open(utc_plus_7(2026, 1, 15, 12, 0)));
        assert!(sched.is_open(utc_plus_7(2026, 1, 17, 12, 0)));
        assert!(sched.is_open(utc_plus_7(2026, 1, 18, 12, 0)));
    }
}
