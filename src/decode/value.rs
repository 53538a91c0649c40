//! Parsers for the value encodings used in apcupsd reports

use std::num::ParseFloatError;
use std::time::{Duration, TryFromFloatSecsError};

use chrono::{DateTime, FixedOffset, NaiveDate};
use thiserror::Error;

/// Format of dates such as `BATTDATE`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format of timestamps in status fields and event lines
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

/// Reasons a single value fails to parse
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("expected value and unit, got {0} parts")]
    Parts(usize),

    #[error("invalid number: {0}")]
    Number(#[from] ParseFloatError),

    #[error("unexpected unit {0:?}")]
    Unit(String),

    #[error("invalid duration: {0}")]
    Duration(#[from] TryFromFloatSecsError),

    #[error("invalid date: {0}")]
    Date(#[from] chrono::ParseError),
}

/// Parses `<float> <unit>`, returning the number and the unit token
pub fn parse_float_and_unit(raw: &str) -> Result<(f64, &str), ValueError> {
    let parts: Vec<&str> = raw.split(' ').collect();
    if parts.len() != 2 {
        return Err(ValueError::Parts(parts.len()));
    }

    let value = parts[0].parse::<f64>()?;
    Ok((value, parts[1]))
}

/// Parses `<float> minutes` or `<float> seconds`
pub fn parse_duration(raw: &str) -> Result<Duration, ValueError> {
    let (value, unit) = parse_float_and_unit(raw)?;

    // scale as a float so fractional minutes survive the conversion
    let unit_lower = unit.to_lowercase();
    let scale = if unit_lower.contains("minute") {
        60.0
    } else if unit_lower.contains("second") {
        1.0
    } else {
        return Err(ValueError::Unit(unit.to_string()));
    };

    Ok(Duration::try_from_secs_f64(value * scale)?)
}

/// Parses a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValueError> {
    Ok(NaiveDate::parse_from_str(raw, DATE_FORMAT)?)
}

/// Parses a `YYYY-MM-DD HH:MM:SS ±ZZZZ` timestamp
pub fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>, ValueError> {
    Ok(DateTime::parse_from_str(raw, DATETIME_FORMAT)?)
}
