//! Temporal scalars: input validation and external string forms.
//!
//! External representations:
//!
//! | kind          | form                                  |
//! |---------------|---------------------------------------|
//! | DateTime      | `2024-03-01T10:15:30.000Z` (UTC, ms)  |
//! | LocalDateTime | `2024-03-01T10:15:30[.fraction]`      |
//! | Date          | `2024-03-01`                          |
//! | Time          | `10:15:30[.fraction](Z\|+hh:mm)`      |
//! | LocalTime     | `10:15:30[.fraction]`                 |
//! | Duration      | `P1Y2M3DT4H5M6.5S`, zero is `PT0S`    |

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use nom::{
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt, recognize},
    sequence::{pair, preceded, terminated},
    IResult, Parser,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::ShapeError;
use crate::schema_model::ScalarKind;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// A store duration: calendar months and days kept apart from clock time,
/// as the store does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IsoDuration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

impl IsoDuration {
    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0 && self.seconds == 0 && self.nanos == 0
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }
        let mut out = String::from("P");
        let (years, months) = (self.months / 12, self.months % 12);
        if years != 0 {
            out.push_str(&format!("{}Y", years));
        }
        if months != 0 {
            out.push_str(&format!("{}M", months));
        }
        if self.days != 0 {
            out.push_str(&format!("{}D", self.days));
        }

        let total = self.seconds as i128 * NANOS_PER_SECOND + self.nanos as i128;
        if total != 0 {
            out.push('T');
            let sign = if total < 0 { "-" } else { "" };
            let total = total.abs();
            let hours = total / (3600 * NANOS_PER_SECOND);
            let minutes = (total / (60 * NANOS_PER_SECOND)) % 60;
            let seconds = (total / NANOS_PER_SECOND) % 60;
            let fraction = total % NANOS_PER_SECOND;
            if hours != 0 {
                out.push_str(&format!("{}{}H", sign, hours));
            }
            if minutes != 0 {
                out.push_str(&format!("{}{}M", sign, minutes));
            }
            if seconds != 0 || fraction != 0 {
                out.push_str(&format!("{}{}", sign, seconds));
                if fraction != 0 {
                    let digits = format!("{:09}", fraction);
                    out.push('.');
                    out.push_str(digits.trim_end_matches('0'));
                }
                out.push('S');
            }
        }
        f.write_str(&out)
    }
}

fn number(input: &str) -> IResult<&str, i64> {
    map_res(digit1, str::parse::<i64>).parse(input)
}

fn unit(designator: char) -> impl Fn(&str) -> IResult<&str, Option<i64>> {
    move |input| opt(terminated(number, char(designator))).parse(input)
}

/// Seconds with an optional fraction of up to nine digits.
fn seconds(input: &str) -> IResult<&str, Option<(i64, i32)>> {
    opt(terminated(
        map_res(
            pair(digit1, opt(preceded(char('.'), recognize(digit1)))),
            |(whole, fraction): (&str, Option<&str>)| -> Result<(i64, i32), std::num::ParseIntError> {
                let whole = whole.parse::<i64>()?;
                let nanos = match fraction {
                    Some(f) => {
                        let mut digits: String = f.chars().take(9).collect();
                        while digits.len() < 9 {
                            digits.push('0');
                        }
                        digits.parse::<i32>()?
                    }
                    None => 0,
                };
                Ok((whole, nanos))
            },
        ),
        char('S'),
    ))
    .parse(input)
}

type DatePart = (Option<i64>, Option<i64>, Option<i64>, Option<i64>);
type TimePart = (Option<i64>, Option<i64>, Option<(i64, i32)>);

fn time_part(input: &str) -> IResult<&str, TimePart> {
    preceded(char('T'), (unit('H'), unit('M'), seconds)).parse(input)
}

fn duration(input: &str) -> IResult<&str, (DatePart, Option<TimePart>)> {
    preceded(
        tag("P"),
        (
            (unit('Y'), unit('M'), unit('W'), unit('D')),
            opt(time_part),
        ),
    )
    .parse(input)
}

/// Parse an ISO-8601 duration such as `P1Y2M10DT2H30M` or `PT1.5S`.
///
/// Weeks fold into days; years fold into months.
pub fn parse_iso_duration(input: &str) -> Result<IsoDuration, ShapeError> {
    let invalid = || ShapeError::InvalidDuration {
        value: input.to_string(),
    };
    let (_, ((years, months, weeks, days), time)) =
        all_consuming(duration).parse(input).map_err(|_| invalid())?;

    let date_empty = years.is_none() && months.is_none() && weeks.is_none() && days.is_none();
    let time_empty = match &time {
        None => true,
        Some((h, m, s)) => {
            if h.is_none() && m.is_none() && s.is_none() {
                // a bare `T` designator
                return Err(invalid());
            }
            false
        }
    };
    if date_empty && time_empty {
        return Err(invalid());
    }

    let (hours, minutes, secs) = time.unwrap_or((None, None, None));
    let (secs, nanos) = secs.unwrap_or((0, 0));
    Ok(IsoDuration {
        months: years.unwrap_or(0) * 12 + months.unwrap_or(0),
        days: weeks.unwrap_or(0) * 7 + days.unwrap_or(0),
        seconds: hours.unwrap_or(0) * 3600 + minutes.unwrap_or(0) * 60 + secs,
        nanos,
    })
}

pub fn parse_datetime(value: &str) -> Result<DateTime<FixedOffset>, ShapeError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| invalid_temporal("DateTime", value))
}

pub fn parse_local_datetime(value: &str) -> Result<NaiveDateTime, ShapeError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| invalid_temporal("LocalDateTime", value))
}

pub fn parse_date(value: &str) -> Result<NaiveDate, ShapeError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| invalid_temporal("Date", value))
}

/// Offset time: `10:15:30Z` or `10:15:30.5+01:00`.
pub fn parse_time(value: &str) -> Result<(NaiveTime, FixedOffset), ShapeError> {
    let normalized = match value.strip_suffix('Z') {
        Some(rest) => format!("1970-01-01T{}+00:00", rest),
        None => format!("1970-01-01T{}", value),
    };
    DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%:z")
        .map(|dt| (dt.time(), *dt.offset()))
        .map_err(|_| invalid_temporal("Time", value))
}

pub fn parse_local_time(value: &str) -> Result<NaiveTime, ShapeError> {
    NaiveTime::parse_from_str(value, "%H:%M:%S%.f").map_err(|_| invalid_temporal("LocalTime", value))
}

fn invalid_temporal(kind: &str, value: &str) -> ShapeError {
    ShapeError::InvalidTemporal {
        kind: kind.to_string(),
        value: value.to_string(),
    }
}

/// Whether a request literal is acceptable input for a temporal kind.
pub fn is_valid_temporal_input(kind: &ScalarKind, value: &str) -> bool {
    match kind {
        ScalarKind::DateTime => parse_datetime(value).is_ok(),
        ScalarKind::LocalDateTime => parse_local_datetime(value).is_ok(),
        ScalarKind::Date => parse_date(value).is_ok(),
        ScalarKind::Time => parse_time(value).is_ok(),
        ScalarKind::LocalTime => parse_local_time(value).is_ok(),
        ScalarKind::Duration => parse_iso_duration(value).is_ok(),
        _ => false,
    }
}

pub fn format_datetime(value: &DateTime<FixedOffset>) -> String {
    value
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

pub fn format_local_datetime(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

pub fn format_date(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub fn format_time(time: &NaiveTime, offset: &FixedOffset) -> String {
    let clock = time.format("%H:%M:%S%.f").to_string();
    if offset.local_minus_utc() == 0 {
        format!("{}Z", clock)
    } else {
        format!("{}{}", clock, offset)
    }
}

pub fn format_local_time(value: &NaiveTime) -> String {
    value.format("%H:%M:%S%.f").to_string()
}
