use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::value::{parse_date, parse_datetime, parse_duration, parse_float_and_unit, ValueError};
use crate::core::{Error, Result};

/// Percentage of load or charge
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Percent(pub f64);

/// Voltage in volts
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Voltage(pub f64);

/// Power in watts
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wattage(pub f64);

/// Typed view of an apcupsd status report
///
/// Fields missing from the report keep their default value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsStatus {
    pub hostname: String,
    pub version: String,
    pub ups_name: String,
    pub model: String,
    pub driver: String,
    pub ups_mode: String,

    pub status: String,
    /// Remaining runtime on batteries
    #[serde(serialize_with = "crate::core::serde::serialize_duration")]
    #[serde(deserialize_with = "crate::core::serde::deserialize_duration")]
    pub time_left: Duration,
    pub load_percent: Percent,
    pub charge_percent: Percent,
    pub line_voltage: Voltage,
    /// Line voltage below which the UPS switches to batteries
    pub low_transfer_voltage: Voltage,
    /// Line voltage above which the UPS switches to batteries
    pub high_transfer_voltage: Voltage,
    pub battery_voltage: Voltage,
    pub nominal_battery_voltage: Voltage,
    pub nominal_input_voltage: Voltage,
    /// Max power the UPS is designed to supply
    pub nominal_wattage: Wattage,

    /// Date the batteries were last replaced
    pub battery_date: Option<NaiveDate>,
    pub last_time_on_battery: Option<DateTime<FixedOffset>>,
    pub last_time_off_battery: Option<DateTime<FixedOffset>>,
    pub last_self_test: Option<DateTime<FixedOffset>>,
}

/// Where a report value lands and how it is parsed
enum Slot {
    Text(fn(&mut UpsStatus) -> &mut String),
    Seconds(fn(&mut UpsStatus) -> &mut Duration),
    Number(fn(&mut UpsStatus) -> &mut f64),
    Date(fn(&mut UpsStatus) -> &mut Option<NaiveDate>),
    Timestamp(fn(&mut UpsStatus) -> &mut Option<DateTime<FixedOffset>>),
}

impl Slot {
    fn fill(&self, status: &mut UpsStatus, raw: &str) -> std::result::Result<(), ValueError> {
        match self {
            Slot::Text(field) => *field(status) = raw.to_string(),
            Slot::Seconds(field) => *field(status) = parse_duration(raw)?,
            // the unit token is only there for humans
            Slot::Number(field) => *field(status) = parse_float_and_unit(raw)?.0,
            Slot::Date(field) => *field(status) = Some(parse_date(raw)?),
            Slot::Timestamp(field) => *field(status) = Some(parse_datetime(raw)?),
        }
        Ok(())
    }
}

/// Report keys this decoder understands, in the order they are applied
const FIELDS: &[(&str, Slot)] = &[
    ("HOSTNAME", Slot::Text(|s| &mut s.hostname)),
    ("VERSION", Slot::Text(|s| &mut s.version)),
    ("UPSNAME", Slot::Text(|s| &mut s.ups_name)),
    ("MODEL", Slot::Text(|s| &mut s.model)),
    ("DRIVER", Slot::Text(|s| &mut s.driver)),
    ("UPSMODE", Slot::Text(|s| &mut s.ups_mode)),
    ("STATUS", Slot::Text(|s| &mut s.status)),
    ("TIMELEFT", Slot::Seconds(|s| &mut s.time_left)),
    ("LOADPCT", Slot::Number(|s| &mut s.load_percent.0)),
    ("BCHARGE", Slot::Number(|s| &mut s.charge_percent.0)),
    ("LINEV", Slot::Number(|s| &mut s.line_voltage.0)),
    ("LOTRANS", Slot::Number(|s| &mut s.low_transfer_voltage.0)),
    ("HITRANS", Slot::Number(|s| &mut s.high_transfer_voltage.0)),
    ("BATTV", Slot::Number(|s| &mut s.battery_voltage.0)),
    ("NOMBATTV", Slot::Number(|s| &mut s.nominal_battery_voltage.0)),
    ("NOMINV", Slot::Number(|s| &mut s.nominal_input_voltage.0)),
    ("NOMPOWER", Slot::Number(|s| &mut s.nominal_wattage.0)),
    ("BATTDATE", Slot::Date(|s| &mut s.battery_date)),
    ("XONBATT", Slot::Timestamp(|s| &mut s.last_time_on_battery)),
    ("XOFFBATT", Slot::Timestamp(|s| &mut s.last_time_off_battery)),
    ("LASTSTEST", Slot::Timestamp(|s| &mut s.last_self_test)),
];

/// Splits `KEY : value` lines into a map, later keys replacing earlier ones
fn key_values<S: AsRef<str>>(lines: &[S]) -> HashMap<&str, &str> {
    let mut out = HashMap::with_capacity(lines.len());

    for line in lines {
        match line.as_ref().split_once(':') {
            Some((key, value)) => {
                out.insert(key.trim(), value.trim());
            }
            None => trace!(line = line.as_ref(), "skipping status line without key"),
        }
    }

    out
}

/// Decodes the lines of a `status` response
pub fn decode_status<S: AsRef<str>>(lines: &[S]) -> Result<UpsStatus> {
    let values = key_values(lines);
    let mut status = UpsStatus::default();

    for (key, slot) in FIELDS {
        if let Some(raw) = values.get(*key) {
            slot.fill(&mut status, raw)
                .map_err(|e| Error::field(*key, *raw, e))?;
        }
    }

    Ok(status)
}
