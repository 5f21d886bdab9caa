//! Turns captured date fragments into absolute timestamps.
//!
//! Fields the pattern does not capture are taken from "now" in the
//! configured timezone, so `{month}/{day}` yields a date in the current year.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use regex::Regex;
use thiserror::Error;

use crate::pattern::compiler::{DAY, HOUR, MINUTE, MONTH, SECOND, YEAR};

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PubDateError {
    #[error("date format pattern is missing")]
    MissingPattern,

    #[error("pub-date string is empty")]
    EmptyDate,

    #[error("pub-date {raw:?} does not match pattern {pattern}")]
    NoMatch { pattern: String, raw: String },

    #[error("cannot parse {field} from {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("pub-date {raw:?} is not a valid calendar date")]
    InvalidDate { raw: String },
}

/// Trim ASCII and Unicode whitespace, including the full-width space U+3000.
pub fn trim_all_spaces(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '\u{3000}')
}

/// Month from a number, an abbreviated name or a full English name.
pub fn parse_month(s: &str) -> Option<u32> {
    if let Ok(month) = s.parse::<u32>() {
        return Some(month);
    }
    let number = |i: usize| i as u32 + 1;
    MONTHS
        .iter()
        .position(|name| name[..3].eq_ignore_ascii_case(s))
        .or_else(|| MONTHS.iter().position(|name| name.eq_ignore_ascii_case(s)))
        .map(number)
}

/// Carry months outside 1..=12 into the year.
fn carry_months(year: i32, month: u32) -> Option<(i32, u32)> {
    let months = i64::from(year) * 12 + i64::from(month) - 1;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    Some((year, months.rem_euclid(12) as u32 + 1))
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    (28..=31)
        .rev()
        .find(|&day| NaiveDate::from_ymd_opt(year, month, day).is_some())
        .unwrap_or(28)
}

#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    timezone: FixedOffset,
}

impl DateNormalizer {
    pub fn new(timezone: FixedOffset) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> FixedOffset {
        self.timezone
    }

    pub fn normalize(
        &self,
        pattern: Option<&Regex>,
        raw: &str,
    ) -> Result<DateTime<FixedOffset>, PubDateError> {
        self.normalize_at(pattern, raw, Utc::now())
    }

    pub fn normalize_at(
        &self,
        pattern: Option<&Regex>,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<DateTime<FixedOffset>, PubDateError> {
        let pattern = pattern.ok_or(PubDateError::MissingPattern)?;
        if trim_all_spaces(raw).is_empty() {
            return Err(PubDateError::EmptyDate);
        }

        let now = now.with_timezone(&self.timezone);
        let mut year = now.year();
        let mut month = now.month();
        let mut day = now.day();
        let mut hour = now.hour();
        let mut minute = now.minute();
        let mut second = now.second();

        let mut day_captured = false;

        let caps = pattern
            .captures(raw)
            .ok_or_else(|| PubDateError::NoMatch {
                pattern: pattern.as_str().to_string(),
                raw: raw.to_string(),
            })?;

        for name in pattern.capture_names().flatten() {
            let Some(value) = caps.name(name).map(|m| trim_all_spaces(m.as_str())) else {
                continue;
            };
            let invalid = |field: &'static str| PubDateError::InvalidField {
                field,
                value: value.to_string(),
            };
            match name {
                YEAR => year = value.parse().map_err(|_| invalid(YEAR))?,
                MONTH => month = parse_month(value).ok_or_else(|| invalid(MONTH))?,
                DAY => {
                    day = value.parse().map_err(|_| invalid(DAY))?;
                    day_captured = true;
                }
                HOUR => hour = value.parse().map_err(|_| invalid(HOUR))?,
                MINUTE => minute = value.parse().map_err(|_| invalid(MINUTE))?,
                SECOND => second = value.parse().map_err(|_| invalid(SECOND))?,
                _ => {}
            }
        }

        let invalid_date = || PubDateError::InvalidDate {
            raw: raw.to_string(),
        };

        // Out-of-range captured fields roll over into the next unit. A day
        // seeded from now is clamped instead, so "2024-02" read on the 30th
        // stays in February.
        let (year, month) = carry_months(year, month).ok_or_else(invalid_date)?;
        if !day_captured {
            day = day.min(last_day_of_month(year, month));
        }

        let offset = Duration::days(i64::from(day) - 1)
            + Duration::hours(i64::from(hour))
            + Duration::minutes(i64::from(minute))
            + Duration::seconds(i64::from(second));

        self.timezone
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .and_then(|start| start.checked_add_signed(offset))
            .ok_or_else(invalid_date)
    }
}
