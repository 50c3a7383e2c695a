//! Cron expression compiler and matcher.
//!
//! The dialect has six whitespace-separated fields in this order:
//! `year month day-of-month day-of-week hour minute`. A field is a
//! comma-separated list of tokens: `*` (or an empty token list) for "any",
//! a plain value, an inclusive range `a-b`, or a progression `a/step` that
//! runs from `a` to the field maximum. The hour and minute fields may each
//! carry `|`-separated sub-expressions that are zipped pairwise, so
//! `0-9|10-23 30|0` fires at xx:30 during hours 0-9 and at xx:00 during
//! hours 10-23.
//!
//! Expressions compile into bitsets so matching an instant is a handful of
//! array lookups, done once per task per minute by the dispatcher.

use std::collections::HashSet;

use chrono::{Datelike, Timelike};
use thiserror::Error;

const MIN_YEAR: i32 = 1970;
const MAX_YEAR: i32 = 2099;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CronError {
    #[error("cron expression should have 6 fields, got {0}")]
    FieldCount(usize),

    #[error("{field}: invalid number in token '{token}'")]
    InvalidToken { field: &'static str, token: String },

    #[error("{field}: value {value} out of range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("{field}: invalid range {start}-{end}")]
    ReversedRange {
        field: &'static str,
        start: i32,
        end: i32,
    },

    #[error("{field}: step must be greater than zero")]
    ZeroStep { field: &'static str },

    #[error("{field}: no values in '{text}'")]
    EmptyField { field: &'static str, text: String },

    #[error("hour and minute sub-expression counts differ")]
    PartCountMismatch,

    #[error("minute has multiple sub-expressions but hour does not")]
    MinutePartsWithoutHour,
}

/// A compiled cron expression. Immutable once built; matching is O(1).
#[derive(Debug, Clone)]
pub struct CronExpr {
    /// `None` means any year; otherwise the finite set of matching years.
    years: Option<HashSet<i32>>,
    /// Index 1..=12.
    months: [bool; 13],
    /// Index 1..=31.
    days: [bool; 32],
    /// Index 1..=7 with Monday = 1 and Sunday = 7.
    weeks: [bool; 8],
    /// Joint hour/minute table; not an outer product of the two fields when
    /// `|` sub-expressions are present.
    hour_minute: [[bool; 60]; 24],
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(CronError::FieldCount(fields.len()));
        }

        let mut compiled = CronExpr {
            years: None,
            months: [false; 13],
            days: [false; 32],
            weeks: [false; 8],
            hour_minute: [[false; 60]; 24],
        };

        compiled.years = match parse_field("year", fields[0], MIN_YEAR, MAX_YEAR)? {
            FieldValues::Any => None,
            FieldValues::List(values) => Some(values.into_iter().collect()),
        };
        fill_bool_field("month", fields[1], 1, 12, &mut compiled.months)?;
        fill_bool_field("day", fields[2], 1, 31, &mut compiled.days)?;
        fill_bool_field("week", fields[3], 1, 7, &mut compiled.weeks)?;
        fill_hour_minute(&mut compiled.hour_minute, fields[4], fields[5])?;

        Ok(compiled)
    }

    /// Whether the expression fires at the given instant. Seconds are
    /// ignored; the dispatcher guarantees one probe per wall-clock minute.
    pub fn matches<T: Datelike + Timelike>(&self, t: &T) -> bool {
        if let Some(years) = &self.years {
            if !years.contains(&t.year()) {
                return false;
            }
        }
        if !self.months[t.month() as usize] {
            return false;
        }
        if !self.days[t.day() as usize] {
            return false;
        }
        // number_from_monday is already the Monday=1..Sunday=7 convention
        // the week field is compiled against.
        if !self.weeks[t.weekday().number_from_monday() as usize] {
            return false;
        }
        self.hour_minute[t.hour() as usize][t.minute() as usize]
    }
}

enum FieldValues {
    Any,
    List(Vec<i32>),
}

fn parse_field(
    name: &'static str,
    field: &str,
    min: i32,
    max: i32,
) -> Result<FieldValues, CronError> {
    let field = field.trim();
    if field == "*" || field.is_empty() {
        return Ok(FieldValues::Any);
    }

    let mut values = Vec::new();
    for token in field.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        // A token carrying '/' is a progression even when it also contains
        // '-'; the split on '/' wins.
        if let Some((start_text, step_text)) = token.split_once('/') {
            let start = parse_number(name, token, start_text)?;
            let step = parse_number(name, token, step_text)?;
            if step <= 0 {
                return Err(CronError::ZeroStep { field: name });
            }
            check_bounds(name, start, min, max)?;
            let mut value = start;
            while value <= max {
                values.push(value);
                value += step;
            }
            continue;
        }
        if let Some((start_text, end_text)) = token.split_once('-') {
            let start = parse_number(name, token, start_text)?;
            let end = parse_number(name, token, end_text)?;
            if start > end {
                return Err(CronError::ReversedRange {
                    field: name,
                    start,
                    end,
                });
            }
            check_bounds(name, start, min, max)?;
            check_bounds(name, end, min, max)?;
            values.extend(start..=end);
            continue;
        }
        let value = parse_number(name, token, token)?;
        check_bounds(name, value, min, max)?;
        values.push(value);
    }

    if values.is_empty() {
        return Err(CronError::EmptyField {
            field: name,
            text: field.to_string(),
        });
    }
    Ok(FieldValues::List(values))
}

fn parse_number(field: &'static str, token: &str, text: &str) -> Result<i32, CronError> {
    text.trim().parse().map_err(|_| CronError::InvalidToken {
        field,
        token: token.to_string(),
    })
}

fn check_bounds(field: &'static str, value: i32, min: i32, max: i32) -> Result<(), CronError> {
    if value < min || value > max {
        return Err(CronError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn fill_bool_field(
    name: &'static str,
    field: &str,
    min: i32,
    max: i32,
    target: &mut [bool],
) -> Result<(), CronError> {
    match parse_field(name, field, min, max)? {
        FieldValues::Any => {
            for value in min..=max {
                target[value as usize] = true;
            }
        }
        FieldValues::List(values) => {
            for value in values {
                target[value as usize] = true;
            }
        }
    }
    Ok(())
}

fn fill_hour_minute(
    target: &mut [[bool; 60]; 24],
    hour_field: &str,
    minute_field: &str,
) -> Result<(), CronError> {
    let hour_parts: Vec<&str> = hour_field.split('|').collect();
    let minute_parts: Vec<&str> = minute_field.split('|').collect();

    if hour_parts.len() > 1 {
        if minute_parts.len() != hour_parts.len() {
            return Err(CronError::PartCountMismatch);
        }
        for (hours, minutes) in hour_parts.iter().zip(&minute_parts) {
            fill_hour_minute_pair(target, hours, minutes)?;
        }
        return Ok(());
    }
    if minute_parts.len() > 1 {
        return Err(CronError::MinutePartsWithoutHour);
    }
    fill_hour_minute_pair(target, hour_field, minute_field)
}

fn fill_hour_minute_pair(
    target: &mut [[bool; 60]; 24],
    hour_field: &str,
    minute_field: &str,
) -> Result<(), CronError> {
    let hours = match parse_field("hour", hour_field, 0, 23)? {
        FieldValues::Any => (0..24).collect(),
        FieldValues::List(values) => values,
    };
    let minutes = match parse_field("minute", minute_field, 0, 59)? {
        FieldValues::Any => (0..60).collect(),
        FieldValues::List(values) => values,
    };
    for &hour in &hours {
        for &minute in &minutes {
            target[hour as usize][minute as usize] = true;
        }
    }
    Ok(())
}
