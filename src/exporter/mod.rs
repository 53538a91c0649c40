//! Prometheus metrics for the UPS status
//!
//! Every field of [`UpsStatus`] is published as a gauge through the
//! `metrics` facade. Gauges are declared once as [`Gauge`] constants in
//! [`gauge_defs`] so names and help text live in one place. Descriptions
//! mostly come from the apcupsd manual:
//! <http://www.apcupsd.org/manual/manual.html#status-report-fields>
//!
//! # Example
//!
//! ```rust,ignore
//! use apcmetrics::exporter::{describe_metrics, StatusGauges};
//!
//! describe_metrics();
//! let mut gauges = StatusGauges::new();
//! gauges.record(&status);
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use chrono::NaiveDate;
use metrics::{describe_gauge, gauge, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_util::MetricKindMask;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::core::{BuildInfo, Error, Result};
use crate::decode::UpsStatus;
use crate::network::NisClient;

/// A gauge declaration with its metadata
#[derive(Debug, Clone, Copy)]
pub struct Gauge {
    /// The metric name (e.g., "apc_load_percent")
    pub name: &'static str,
    /// Help text of the metric
    pub description: &'static str,
    /// The unit of measurement (optional)
    pub unit: Option<Unit>,
    /// Label keys this gauge is recorded with
    pub labels: &'static [&'static str],
}

impl Gauge {
    /// Creates a new gauge with the given name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Sets the help text
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this gauge's description with the metrics recorder
    pub fn describe(&self) {
        match self.unit {
            Some(unit) => {
                describe_gauge!(self.name, unit, self.description);
            }
            None => {
                describe_gauge!(self.name, self.description);
            }
        }
    }

    /// Sets an unlabeled gauge
    fn set(&self, value: f64) {
        gauge!(self.name).set(value);
    }
}

/// All gauges published by the exporter
pub mod gauge_defs {
    use super::Gauge;
    use metrics::Unit;

    pub const BUILD_INFO: Gauge = Gauge::new("apcmetrics_build_info")
        .with_description("Build information of the exporter")
        .with_labels(&["version", "branch", "revision"]);

    pub const INFO: Gauge = Gauge::new("apc_info")
        .with_description("Info about the UPS")
        .with_labels(&["hostname", "version", "ups_name", "model", "driver", "ups_mode"]);

    pub const STATUS: Gauge = Gauge::new("apc_status")
        .with_description("Current status of the UPS")
        .with_labels(&["status"]);

    pub const TIME_LEFT: Gauge = Gauge::new("apc_time_left")
        .with_description("Remaining runtime left on the batteries in seconds")
        .with_unit(Unit::Seconds);

    pub const LOAD_PERCENT: Gauge = Gauge::new("apc_load_percent")
        .with_description("Percentage of load capacity")
        .with_unit(Unit::Percent);

    pub const CHARGE_PERCENT: Gauge = Gauge::new("apc_charge_percent")
        .with_description("Percentage of charge of the batteries")
        .with_unit(Unit::Percent);

    pub const LINE_VOLTAGE: Gauge =
        Gauge::new("apc_line_voltage").with_description("Current line voltage");

    pub const LOW_TRANSFER_VOLTAGE: Gauge = Gauge::new("apc_low_transfer_voltage")
        .with_description("Line voltage below which the UPS will switch to batteries");

    pub const HIGH_TRANSFER_VOLTAGE: Gauge = Gauge::new("apc_high_transfer_voltage")
        .with_description("Line voltage above which the UPS will switch to batteries");

    pub const BATTERY_VOLTAGE: Gauge =
        Gauge::new("apc_battery_voltage").with_description("Battery voltage");

    pub const NOMINAL_BATTERY_VOLTAGE: Gauge =
        Gauge::new("apc_nominal_battery_voltage").with_description("Nominal battery voltage");

    pub const NOMINAL_INPUT_VOLTAGE: Gauge =
        Gauge::new("apc_nominal_input_voltage").with_description("Nominal input voltage");

    pub const NOMINAL_WATTAGE: Gauge = Gauge::new("apc_nominal_wattage")
        .with_description("Max power the UPS is designed to supply");

    pub const BATTERY_DATE: Gauge = Gauge::new("apc_battery_date")
        .with_description("Date the batteries were last replaced as a UNIX timestamp");

    pub const LAST_TIME_ON_BATTERY: Gauge = Gauge::new("apc_last_time_on_battery")
        .with_description("Last transfer on to batteries as a UNIX timestamp");

    pub const LAST_TIME_OFF_BATTERY: Gauge = Gauge::new("apc_last_time_off_battery")
        .with_description("Last transfer off of batteries as a UNIX timestamp");

    pub const LAST_SELF_TEST: Gauge = Gauge::new("apc_last_self_test")
        .with_description("Last self test as a UNIX timestamp");

    /// Every gauge, build info included
    pub const ALL: &[Gauge] = &[
        BUILD_INFO,
        INFO,
        STATUS,
        TIME_LEFT,
        LOAD_PERCENT,
        CHARGE_PERCENT,
        LINE_VOLTAGE,
        LOW_TRANSFER_VOLTAGE,
        HIGH_TRANSFER_VOLTAGE,
        BATTERY_VOLTAGE,
        NOMINAL_BATTERY_VOLTAGE,
        NOMINAL_INPUT_VOLTAGE,
        NOMINAL_WATTAGE,
        BATTERY_DATE,
        LAST_TIME_ON_BATTERY,
        LAST_TIME_OFF_BATTERY,
        LAST_SELF_TEST,
    ];
}

/// Registers descriptions of all gauges
pub fn describe_metrics() {
    for g in gauge_defs::ALL {
        g.describe();
    }
}

/// Publishes the build info gauge
pub fn record_build_info(info: &BuildInfo) {
    gauge!(
        gauge_defs::BUILD_INFO.name,
        "version" => info.version.clone(),
        "branch" => info.branch.clone(),
        "revision" => info.revision.clone()
    )
    .set(1.0);
}

fn date_timestamp(date: Option<NaiveDate>) -> f64 {
    date.and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() as f64)
        .unwrap_or(0.0)
}

type InfoLabels = [(&'static str, String); 6];

fn info_labels(status: &UpsStatus) -> InfoLabels {
    [
        ("hostname", status.hostname.clone()),
        ("version", status.version.clone()),
        ("ups_name", status.ups_name.clone()),
        ("model", status.model.clone()),
        ("driver", status.driver.clone()),
        ("ups_mode", status.ups_mode.clone()),
    ]
}

/// Publishes status reports, remembering which labelled series are live
///
/// `apc_info` and `apc_status` carry their values in labels, so a new label
/// set is a new series. The series of the previous report is set to 0 when
/// its labels change, leaving exactly one series at 1.
#[derive(Debug, Clone, Default)]
pub struct StatusGauges {
    info: Option<InfoLabels>,
    status: Option<String>,
}

impl StatusGauges {
    /// Creates a publisher with no series recorded yet
    pub fn new() -> Self {
        StatusGauges::default()
    }

    /// Publishes every field of a decoded status report
    ///
    /// Missing dates are published as 0.
    pub fn record(&mut self, status: &UpsStatus) {
        use gauge_defs::*;

        let info = info_labels(status);
        if let Some(old) = self.info.take().filter(|old| *old != info) {
            gauge!(INFO.name, &old).set(0.0);
        }
        gauge!(INFO.name, &info).set(1.0);
        self.info = Some(info);

        if let Some(old) = self.status.take().filter(|old| *old != status.status) {
            gauge!(STATUS.name, "status" => old).set(0.0);
        }
        gauge!(STATUS.name, "status" => status.status.clone()).set(1.0);
        self.status = Some(status.status.clone());

        TIME_LEFT.set(status.time_left.as_secs_f64());
        LOAD_PERCENT.set(status.load_percent.0);
        CHARGE_PERCENT.set(status.charge_percent.0);
        LINE_VOLTAGE.set(status.line_voltage.0);
        LOW_TRANSFER_VOLTAGE.set(status.low_transfer_voltage.0);
        HIGH_TRANSFER_VOLTAGE.set(status.high_transfer_voltage.0);
        BATTERY_VOLTAGE.set(status.battery_voltage.0);
        NOMINAL_BATTERY_VOLTAGE.set(status.nominal_battery_voltage.0);
        NOMINAL_INPUT_VOLTAGE.set(status.nominal_input_voltage.0);
        NOMINAL_WATTAGE.set(status.nominal_wattage.0);

        BATTERY_DATE.set(date_timestamp(status.battery_date));
        for (g, ts) in [
            (LAST_TIME_ON_BATTERY, status.last_time_on_battery),
            (LAST_TIME_OFF_BATTERY, status.last_time_off_battery),
            (LAST_SELF_TEST, status.last_self_test),
        ] {
            g.set(ts.map(|t| t.timestamp() as f64).unwrap_or(0.0));
        }
    }
}

/// Prometheus recorder builder whose gauges stop being served once they go
/// `expiry` without an update
pub fn exporter_builder(expiry: Duration) -> PrometheusBuilder {
    PrometheusBuilder::new().idle_timeout(MetricKindMask::GAUGE, Some(expiry))
}

/// Installs the Prometheus recorder and serves it over HTTP
///
/// Must be called from within a Tokio runtime. The listener answers on
/// every path.
pub fn install_exporter(listen: SocketAddr, expiry: Duration) -> Result<()> {
    exporter_builder(expiry)
        .with_http_listener(listen)
        .install()
        .map_err(|e| Error::config(format!("Failed to start metrics exporter on {}: {}", listen, e)))?;

    info!(address = %listen, expiry = ?expiry, "serving Prometheus metrics");
    Ok(())
}

/// Fetches the UPS status and republishes it as gauges
#[derive(Debug, Clone)]
pub struct StatusCollector {
    client: NisClient,
    timeout: Duration,
    build_info: BuildInfo,
    gauges: StatusGauges,
}

impl StatusCollector {
    /// Creates a collector; every fetch is bounded by `timeout`
    pub fn new(client: NisClient, timeout: Duration, build_info: BuildInfo) -> Self {
        StatusCollector {
            client,
            timeout,
            build_info,
            gauges: StatusGauges::new(),
        }
    }

    /// Registers the gauge descriptions and returns them
    pub fn describe(&self) -> &'static [Gauge] {
        describe_metrics();
        gauge_defs::ALL
    }

    /// Longest gap between two successful refreshes at `interval`
    ///
    /// Gauges older than this belong to a failed refresh and should expire.
    pub fn expiry(&self, interval: Duration) -> Duration {
        interval + self.timeout
    }

    /// Fetches a fresh status and records it
    ///
    /// Build info is republished on every call, whatever the outcome. On
    /// failure no status gauge is touched, so the previous values expire.
    pub async fn collect(&mut self) -> Result<UpsStatus> {
        record_build_info(&self.build_info);

        let deadline = Instant::now() + self.timeout;
        let status = self.client.status(Some(deadline)).await?;
        self.gauges.record(&status);
        debug!(status = %status.status, "recorded UPS status");
        Ok(status)
    }

    /// Collects every `interval` forever
    ///
    /// Failures are logged and the next tick tries again.
    pub async fn run(&mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.collect().await {
                error!(error = %e, address = self.client.address(), "unable to determine UPS status");
            }
        }
    }
}
