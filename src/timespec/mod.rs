pub mod parser;
pub mod target;
pub mod units;

use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::timespec::units::Millis;

/// What a run counts down to. Built once from the command line.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeSpec {
    Relative(Millis),
    TimeOfDay {
        hour: u32,
        minute: u32,
        second: u32,
    },
    DateTime {
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    },
}

impl TimeSpec {
    pub fn is_wall_clock(&self) -> bool {
        !matches!(self, TimeSpec::Relative(_))
    }

    /// Hour, minute and second of a wall-clock target; later loop
    /// iterations recur at this time of day.
    pub fn clock_time(&self) -> Option<(u32, u32, u32)> {
        match *self {
            TimeSpec::Relative(_) => None,
            TimeSpec::TimeOfDay {
                hour,
                minute,
                second,
            }
            | TimeSpec::DateTime {
                hour,
                minute,
                second,
                ..
            } => Some((hour, minute, second)),
        }
    }
}

impl fmt::Display for TimeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TimeSpec::Relative(ms) => write!(f, "{ms}"),
            TimeSpec::TimeOfDay {
                hour,
                minute,
                second,
            } => write!(f, "{hour:02}:{minute:02}:{second:02}"),
            TimeSpec::DateTime {
                year,
                month,
                day,
                hour,
                minute,
                second,
            } => write!(
                f,
                "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}"
            ),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ResolveError {
    #[error("invalid time of day {hour:02}:{minute:02}:{second:02}")]
    InvalidTime { hour: u32, minute: u32, second: u32 },
    #[error("invalid calendar date {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("local time {0} cannot be represented on this clock")]
    Unrepresentable(NaiveDateTime),
    #[error("target {0} is not in the future")]
    NotInFuture(NaiveDateTime),
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("expected HH:MM[:SS] or YYYY-MM-DD [HH:MM[:SS]], got '{0}'")]
pub struct AtParseError(pub String);

/// Parses the value of `--at`: `HH:MM[:SS]`, `YYYY-MM-DD`, or a date
/// followed by a time (separated by whitespace or `T`). A bare date means
/// midnight. Range checks happen at resolution time.
pub fn parse_at(expr: &str) -> Result<TimeSpec, AtParseError> {
    let malformed = || AtParseError(expr.to_string());
    let trimmed = expr.trim();

    let (date_part, time_part) =
        match trimmed.split_once(|c: char| c.is_whitespace() || c == 'T') {
            Some((date, time)) => (date, Some(time.trim())),
            None => (trimmed, None),
        };

    if !date_part.contains('-') {
        if time_part.is_some() {
            return Err(malformed());
        }
        let (hour, minute, second) = parse_clock(date_part).ok_or_else(malformed)?;
        return Ok(TimeSpec::TimeOfDay {
            hour,
            minute,
            second,
        });
    }

    let date = split_numbers(date_part, '-').ok_or_else(malformed)?;
    let &[year, month, day] = date.as_slice() else {
        return Err(malformed());
    };
    let year = i32::try_from(year).map_err(|_| malformed())?;
    let (hour, minute, second) = match time_part {
        Some(text) => parse_clock(text).ok_or_else(malformed)?,
        None => (0, 0, 0),
    };

    Ok(TimeSpec::DateTime {
        year,
        month,
        day,
        hour,
        minute,
        second,
    })
}

/// `HH:MM` or `HH:MM:SS`, digits only.
pub(crate) fn parse_clock(text: &str) -> Option<(u32, u32, u32)> {
    let fields = split_numbers(text, ':')?;
    match *fields.as_slice() {
        [hour, minute] => Some((hour, minute, 0)),
        [hour, minute, second] => Some((hour, minute, second)),
        _ => None,
    }
}

/// True for tokens shaped like a calendar date, e.g. `2030-1-1`.
pub(crate) fn looks_like_date(text: &str) -> bool {
    split_numbers(text, '-').is_some_and(|fields| fields.len() == 3)
}

fn split_numbers(text: &str, separator: char) -> Option<Vec<u32>> {
    text.split(separator)
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            part.parse::<u32>().ok()
        })
        .collect()
}
