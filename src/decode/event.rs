use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::value::parse_datetime;
use crate::core::{Error, Result};

/// Separator between the timestamp and the message of an event line
pub const EVENT_SEPARATOR: &str = "  ";

/// A single entry of the apcupsd event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsEvent {
    pub timestamp: DateTime<FixedOffset>,
    pub message: String,
}

impl UpsEvent {
    /// Parses a `TIMESTAMP  MESSAGE` line
    pub fn parse(line: &str) -> Result<Self> {
        let (timestamp, message) = line.split_once(EVENT_SEPARATOR).ok_or_else(|| {
            Error::event(line, "expected timestamp and message separated by two spaces")
        })?;

        let timestamp = parse_datetime(timestamp.trim()).map_err(|e| Error::event(line, e))?;

        Ok(UpsEvent {
            timestamp,
            message: message.trim().to_string(),
        })
    }
}

/// Decodes the lines of an `events` response, oldest first
///
/// A single malformed line fails the whole batch.
pub fn decode_events<S: AsRef<str>>(lines: &[S]) -> Result<Vec<UpsEvent>> {
    lines.iter().map(|line| UpsEvent::parse(line.as_ref())).collect()
}
