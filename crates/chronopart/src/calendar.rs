//! Calendar arithmetic for partition periods.
//!
//! All partition planning is driven by two operations: rounding an instant
//! down to the start of its containing period ([`truncate`]) and stepping an
//! instant by whole periods ([`advance`]). Instants are civil datetimes;
//! boundaries cross the catalog interface as UNIX epoch seconds interpreted
//! as UTC ([`to_epoch`] / [`from_epoch`]).

use crate::error::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Partition period granularity.
///
/// Determines the truncation unit, the advancement step and the partition
/// name format.
///
/// # Examples
/// ```rust,ignore
/// use chronopart::calendar::Granularity;
///
/// let g: Granularity = serde_yaml::from_str("daily")?;
/// assert_eq!(g, Granularity::Daily);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One-hour partitions.
    Hourly,
    /// One-day partitions.
    Daily,
    /// One-week partitions, anchored to Monday.
    Weekly,
    /// One-month partitions.
    Monthly,
    /// One-year partitions.
    Yearly,
}

impl Granularity {
    /// Returns the lowercase configuration name of the granularity.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rounds an instant down to the start of its containing period.
///
/// Weekly truncation anchors to Monday (ISO weekday 1). Monthly and yearly
/// truncation land on day 1 and January 1 respectively, with time-of-day
/// zeroed in every case.
pub fn truncate(t: NaiveDateTime, granularity: Granularity) -> NaiveDateTime {
    let midnight = t.date().and_time(NaiveTime::MIN);
    match granularity {
        Granularity::Hourly => midnight + TimeDelta::hours(t.hour() as i64),
        Granularity::Daily => midnight,
        Granularity::Weekly => {
            midnight - TimeDelta::days(t.weekday().num_days_from_monday() as i64)
        }
        Granularity::Monthly => midnight - TimeDelta::days(t.day0() as i64),
        Granularity::Yearly => midnight - TimeDelta::days(t.ordinal0() as i64),
    }
}

/// Steps an instant by `periods` whole periods; `periods` may be negative.
///
/// Monthly and yearly steps clamp the day-of-month to the last valid day of
/// the target month (Jan 31 + 1 month is Feb 28, or Feb 29 in a leap year).
/// Because of that clamping, monthly and yearly steps are not exactly
/// reversible; callers needing reversibility must keep the pre-step instant.
pub fn advance(t: NaiveDateTime, granularity: Granularity, periods: i32) -> Result<NaiveDateTime> {
    let stepped = match granularity {
        Granularity::Hourly => t.checked_add_signed(TimeDelta::hours(periods as i64)),
        Granularity::Daily => t.checked_add_signed(TimeDelta::days(periods as i64)),
        Granularity::Weekly => t.checked_add_signed(TimeDelta::weeks(periods as i64)),
        Granularity::Monthly => shift_months(t, periods),
        Granularity::Yearly => shift_months(t, periods.saturating_mul(12)),
    };
    stepped.ok_or_else(|| {
        Error::DateOutOfRange(format!("{t} stepped by {periods} x {granularity}"))
    })
}

fn shift_months(t: NaiveDateTime, months: i32) -> Option<NaiveDateTime> {
    if months >= 0 {
        t.checked_add_months(Months::new(months as u32))
    } else {
        t.checked_sub_months(Months::new(months.unsigned_abs()))
    }
}

/// Converts a civil datetime to UNIX epoch seconds (UTC interpretation).
pub fn to_epoch(t: NaiveDateTime) -> i64 {
    t.and_utc().timestamp()
}

/// Converts UNIX epoch seconds back to a civil datetime.
///
/// Returns `None` for values outside the representable date range.
pub fn from_epoch(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|t| t.naive_utc())
}

/// Unit of a retention specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionUnit {
    /// Hours (`h`).
    Hours,
    /// Days (`d`).
    Days,
    /// Weeks (`w`).
    Weeks,
    /// Calendar months (`m`).
    Months,
    /// Calendar years (`y`).
    Years,
}

impl RetentionUnit {
    fn suffix(self) -> char {
        match self {
            Self::Hours => 'h',
            Self::Days => 'd',
            Self::Weeks => 'w',
            Self::Months => 'm',
            Self::Years => 'y',
        }
    }
}

/// A retention window parsed from `<digits><unit>`, e.g. `30d` or `12m`.
///
/// Month and year magnitudes are calendar-aware: the cutoff for `12m` is
/// twelve calendar months before now, not 360 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RetentionSpec {
    /// Number of units to retain.
    pub magnitude: u32,
    /// Unit of the retention window.
    pub unit: RetentionUnit,
}

impl RetentionSpec {
    /// Returns the retention cutoff: `now` minus the retention window.
    ///
    /// Rows with `clock` strictly older than the cutoff are past retention.
    pub fn cutoff(&self, now: NaiveDateTime) -> Result<NaiveDateTime> {
        let back = -(self.magnitude.min(i32::MAX as u32) as i32);
        match self.unit {
            RetentionUnit::Hours => advance(now, Granularity::Hourly, back),
            RetentionUnit::Days => advance(now, Granularity::Daily, back),
            RetentionUnit::Weeks => advance(now, Granularity::Weekly, back),
            RetentionUnit::Months => advance(now, Granularity::Monthly, back),
            RetentionUnit::Years => advance(now, Granularity::Yearly, back),
        }
    }
}

impl FromStr for RetentionSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidRetention {
            value: s.to_string(),
        };
        let (last, digits) = s.as_bytes().split_last().ok_or_else(invalid)?;
        let unit = match last {
            b'h' => RetentionUnit::Hours,
            b'd' => RetentionUnit::Days,
            b'w' => RetentionUnit::Weeks,
            b'm' => RetentionUnit::Months,
            b'y' => RetentionUnit::Years,
            _ => return Err(invalid()),
        };
        if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
            return Err(invalid());
        }
        let magnitude: u32 = s[..digits.len()].parse().map_err(|_| invalid())?;
        if magnitude == 0 {
            return Err(invalid());
        }
        Ok(Self { magnitude, unit })
    }
}

impl TryFrom<String> for RetentionSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RetentionSpec> for String {
    fn from(spec: RetentionSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for RetentionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.magnitude, self.unit.suffix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_truncate_hourly_daily() {
        let t = at(2024, 1, 10, 13, 45, 12);
        assert_eq!(truncate(t, Granularity::Hourly), at(2024, 1, 10, 13, 0, 0));
        assert_eq!(truncate(t, Granularity::Daily), at(2024, 1, 10, 0, 0, 0));
    }

    #[test]
    fn test_truncate_weekly_anchors_monday() {
        // 2024-01-10 is a Wednesday; the containing week starts Mon 2024-01-08.
        let t = at(2024, 1, 10, 13, 45, 12);
        assert_eq!(truncate(t, Granularity::Weekly), at(2024, 1, 8, 0, 0, 0));
        // A Monday truncates to itself.
        let monday = at(2024, 1, 8, 5, 0, 0);
        assert_eq!(truncate(monday, Granularity::Weekly), at(2024, 1, 8, 0, 0, 0));
    }

    #[test]
    fn test_truncate_monthly_yearly() {
        let t = at(2024, 3, 17, 8, 0, 0);
        assert_eq!(truncate(t, Granularity::Monthly), at(2024, 3, 1, 0, 0, 0));
        assert_eq!(truncate(t, Granularity::Yearly), at(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_truncate_is_idempotent() {
        let t = at(2024, 1, 10, 13, 45, 12);
        for g in [
            Granularity::Hourly,
            Granularity::Daily,
            Granularity::Weekly,
            Granularity::Monthly,
            Granularity::Yearly,
        ] {
            assert_eq!(truncate(truncate(t, g), g), truncate(t, g));
        }
    }

    #[test]
    fn test_advance_monthly_clamps_day() {
        let jan31 = at(2023, 1, 31, 0, 0, 0);
        assert_eq!(
            advance(jan31, Granularity::Monthly, 1).unwrap(),
            at(2023, 2, 28, 0, 0, 0)
        );
        let jan31_leap = at(2024, 1, 31, 0, 0, 0);
        assert_eq!(
            advance(jan31_leap, Granularity::Monthly, 1).unwrap(),
            at(2024, 2, 29, 0, 0, 0)
        );
    }

    #[test]
    fn test_advance_century_leap_rule() {
        // 1900 is not a leap year (divisible by 100 but not 400); 2000 is.
        assert_eq!(
            advance(at(1900, 1, 31, 0, 0, 0), Granularity::Monthly, 1).unwrap(),
            at(1900, 2, 28, 0, 0, 0)
        );
        assert_eq!(
            advance(at(2000, 1, 31, 0, 0, 0), Granularity::Monthly, 1).unwrap(),
            at(2000, 2, 29, 0, 0, 0)
        );
    }

    #[test]
    fn test_advance_negative_periods() {
        let t = at(2024, 1, 10, 0, 0, 0);
        assert_eq!(
            advance(t, Granularity::Daily, -10).unwrap(),
            at(2023, 12, 31, 0, 0, 0)
        );
        assert_eq!(
            advance(t, Granularity::Monthly, -12).unwrap(),
            at(2023, 1, 10, 0, 0, 0)
        );
    }

    #[test]
    fn test_advance_yearly_clamps_leap_day() {
        let feb29 = at(2024, 2, 29, 0, 0, 0);
        assert_eq!(
            advance(feb29, Granularity::Yearly, 1).unwrap(),
            at(2025, 2, 28, 0, 0, 0)
        );
    }

    #[test]
    fn test_epoch_roundtrip() {
        let t = at(2024, 1, 10, 12, 0, 0);
        assert_eq!(from_epoch(to_epoch(t)), Some(t));
    }

    #[test]
    fn test_retention_parse_valid() {
        let spec: RetentionSpec = "30d".parse().unwrap();
        assert_eq!(spec.magnitude, 30);
        assert_eq!(spec.unit, RetentionUnit::Days);
        assert_eq!("12m".parse::<RetentionSpec>().unwrap().unit, RetentionUnit::Months);
        assert_eq!("1y".parse::<RetentionSpec>().unwrap().unit, RetentionUnit::Years);
        assert_eq!("48h".parse::<RetentionSpec>().unwrap().magnitude, 48);
        assert_eq!("2w".parse::<RetentionSpec>().unwrap().unit, RetentionUnit::Weeks);
    }

    #[test]
    fn test_retention_parse_rejects_bad_input() {
        for bad in ["7", "d", "", "30x", "d30", "3.5d", "30dd", "-5d", "0d"] {
            assert!(
                matches!(
                    bad.parse::<RetentionSpec>(),
                    Err(Error::InvalidRetention { .. })
                ),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_retention_cutoff_days() {
        let now = at(2024, 1, 15, 10, 30, 0);
        let spec: RetentionSpec = "14d".parse().unwrap();
        assert_eq!(spec.cutoff(now).unwrap(), at(2024, 1, 1, 10, 30, 0));
    }

    #[test]
    fn test_retention_cutoff_months_is_calendar_aware() {
        let now = at(2024, 3, 31, 0, 0, 0);
        let spec: RetentionSpec = "1m".parse().unwrap();
        // One calendar month back from Mar 31 clamps to Feb 29 (leap year).
        assert_eq!(spec.cutoff(now).unwrap(), at(2024, 2, 29, 0, 0, 0));
    }

    #[test]
    fn test_retention_display_roundtrip() {
        let spec: RetentionSpec = "365d".parse().unwrap();
        assert_eq!(spec.to_string(), "365d");
    }
}
