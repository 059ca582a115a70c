//! Cadence parsing and next-fire computation.
//!
//! Schedule times are local wall-clock values:
//! - once: ISO datetime, `2026-03-01T09:00` (seconds optional, space allowed)
//! - daily / monthly: `HH:MM`
//! - weekly: `monday 10:30`
//!
//! Monthly has no native trigger. It fires daily at `HH:MM` and only
//! executes when the day of month is 1.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Once => "once",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, Self::Once)
    }
}

impl fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ScheduleError::UnknownKind(other.to_string())),
        }
    }
}

/// A parsed recurrence rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Once(NaiveDateTime),
    Daily(NaiveTime),
    Weekly(Weekday, NaiveTime),
    Monthly(NaiveTime),
}

fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

impl Cadence {
    pub fn parse(kind: ScheduleKind, spec: &str) -> Result<Self, ScheduleError> {
        let spec = spec.trim();
        let invalid = || ScheduleError::InvalidTime {
            kind: kind.to_string(),
            value: spec.to_string(),
        };
        match kind {
            ScheduleKind::Once => parse_datetime(spec).map(Self::Once).ok_or_else(invalid),
            ScheduleKind::Daily => parse_clock(spec).map(Self::Daily).ok_or_else(invalid),
            ScheduleKind::Monthly => parse_clock(spec).map(Self::Monthly).ok_or_else(invalid),
            ScheduleKind::Weekly => {
                let (day, time) = spec.split_once(char::is_whitespace).ok_or_else(invalid)?;
                let day = day.parse::<Weekday>().map_err(|_| invalid())?;
                let time = parse_clock(time.trim()).ok_or_else(invalid)?;
                Ok(Self::Weekly(day, time))
            }
        }
    }

    pub fn kind(&self) -> ScheduleKind {
        match self {
            Self::Once(_) => ScheduleKind::Once,
            Self::Daily(_) => ScheduleKind::Daily,
            Self::Weekly(..) => ScheduleKind::Weekly,
            Self::Monthly(_) => ScheduleKind::Monthly,
        }
    }

    /// First trigger when the job is registered at `now`.
    /// A one-shot keeps its own time even when it has already passed, so it
    /// fires on the next tick.
    pub fn first_fire(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Once(at) => Some(*at),
            _ => self.next_after(now),
        }
    }

    /// Next trigger strictly after `after`. `None` for one-shots.
    pub fn next_after(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        match *self {
            Self::Once(_) => None,
            Self::Daily(t) | Self::Monthly(t) => {
                let today = after.date().and_time(t);
                if today > after {
                    Some(today)
                } else {
                    today.checked_add_days(Days::new(1))
                }
            }
            Self::Weekly(day, t) => {
                let ahead = (7 + day.num_days_from_monday() - after.weekday().num_days_from_monday()) % 7;
                let candidate = after.date().and_time(t).checked_add_days(Days::new(ahead as u64))?;
                if candidate > after {
                    Some(candidate)
                } else {
                    candidate.checked_add_days(Days::new(7))
                }
            }
        }
    }

    /// Whether a trigger at `at` should actually run the job.
    pub fn should_execute(&self, at: NaiveDateTime) -> bool {
        match self {
            Self::Monthly(_) => at.day() == 1,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_kinds() {
        assert_eq!("Weekly".parse::<ScheduleKind>().unwrap(), ScheduleKind::Weekly);
        assert!(matches!("hourly".parse::<ScheduleKind>(), Err(ScheduleError::UnknownKind(_))));

        assert_eq!(
            Cadence::parse(ScheduleKind::Once, "2026-03-01T09:00").unwrap(),
            Cadence::Once(at(2026, 3, 1, 9, 0))
        );
        assert_eq!(
            Cadence::parse(ScheduleKind::Once, "2026-03-01 09:00:00").unwrap(),
            Cadence::Once(at(2026, 3, 1, 9, 0))
        );
        assert!(matches!(
            Cadence::parse(ScheduleKind::Weekly, "Monday 10:30").unwrap(),
            Cadence::Weekly(Weekday::Mon, _)
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for (kind, spec) in [
            (ScheduleKind::Once, "tomorrow"),
            (ScheduleKind::Daily, "25:00"),
            (ScheduleKind::Weekly, "10:30"),
            (ScheduleKind::Weekly, "someday 10:30"),
            (ScheduleKind::Monthly, ""),
        ] {
            let err = Cadence::parse(kind, spec).unwrap_err();
            assert!(matches!(err, ScheduleError::InvalidTime { .. }), "{kind} {spec}");
        }
    }

    #[test]
    fn test_daily_next() {
        let c = Cadence::parse(ScheduleKind::Daily, "09:00").unwrap();
        assert_eq!(c.next_after(at(2026, 3, 15, 8, 0)), Some(at(2026, 3, 15, 9, 0)));
        assert_eq!(c.next_after(at(2026, 3, 15, 9, 0)), Some(at(2026, 3, 16, 9, 0)));
    }

    #[test]
    fn test_weekly_next() {
        // 2026-03-15 is a Sunday.
        let c = Cadence::parse(ScheduleKind::Weekly, "monday 10:30").unwrap();
        assert_eq!(c.next_after(at(2026, 3, 15, 12, 0)), Some(at(2026, 3, 16, 10, 30)));
        assert_eq!(c.next_after(at(2026, 3, 16, 11, 0)), Some(at(2026, 3, 23, 10, 30)));
        assert_eq!(c.next_after(at(2026, 3, 16, 10, 0)), Some(at(2026, 3, 16, 10, 30)));
    }

    #[test]
    fn test_once_past_fires_first_then_never() {
        let c = Cadence::Once(at(2020, 1, 1, 0, 0));
        assert_eq!(c.first_fire(at(2026, 3, 15, 0, 0)), Some(at(2020, 1, 1, 0, 0)));
        assert_eq!(c.next_after(at(2026, 3, 15, 0, 0)), None);
    }

    #[test]
    fn test_monthly_executes_on_first_only() {
        let c = Cadence::parse(ScheduleKind::Monthly, "08:00").unwrap();
        assert_eq!(c.next_after(at(2026, 3, 15, 9, 0)), Some(at(2026, 3, 16, 8, 0)));
        assert!(!c.should_execute(at(2026, 3, 16, 8, 0)));
        assert!(c.should_execute(at(2026, 4, 1, 8, 0)));
    }
}
