//! apcmetrics - APC UPS metrics exporter for Prometheus
//!
//! Talks to apcupsd over its network information server and either prints
//! the current status or events as JSON, or serves them as Prometheus
//! metrics.

use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use apcmetrics::core::{BuildInfo, Config};
use apcmetrics::exporter::{install_exporter, StatusCollector};
use apcmetrics::{NisClient, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// apcmetrics: APC UPS metrics exporter for Prometheus
#[derive(Parser, Debug)]
#[command(name = "apcmetrics", version, about, long_about = None)]
struct Cli {
    /// Address and port of the apcupsd daemon to connect to
    #[arg(long, global = true, default_value = "localhost:3551")]
    ups_address: String,

    /// Max time in seconds a request to the apcupsd daemon may take
    #[arg(long, global = true, default_value_t = 5.0)]
    ups_timeout: f64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Export Prometheus metrics via HTTP
    Metrics {
        /// Address and port to expose Prometheus metrics on; every path
        /// answers with the metrics
        #[arg(long, default_value = "0.0.0.0:9780")]
        web_listen_address: SocketAddr,

        /// Seconds between refreshes of the UPS status
        #[arg(long, default_value_t = 15.0)]
        refresh_interval: f64,
    },

    /// Display the current status of the UPS as JSON
    Status,

    /// Display recent UPS events as JSON
    Events,
}

fn seconds(value: f64, flag: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| apcmetrics::Error::config(format!("invalid --{} {}: {}", flag, value, e)))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string(value)?;
    println!("{}", out);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config {
        address: cli.ups_address,
        timeout: seconds(cli.ups_timeout, "ups-timeout")?,
    };
    let client = NisClient::from_config(&config);

    match cli.command {
        Commands::Metrics {
            web_listen_address,
            refresh_interval,
        } => {
            let interval = seconds(refresh_interval, "refresh-interval")?;
            if interval.is_zero() {
                return Err(apcmetrics::Error::config("--refresh-interval must be positive"));
            }

            let mut collector = StatusCollector::new(client, config.timeout, BuildInfo::current());
            install_exporter(web_listen_address, collector.expiry(interval))?;
            collector.describe();
            collector.run(interval).await;
            Ok(())
        }
        Commands::Status => {
            let status = client.status(Some(config.deadline())).await?;
            print_json(&status)
        }
        Commands::Events => {
            let events = client.events(Some(config.deadline())).await?;
            print_json(&events)
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let command = format!("{:?}", cli.command);

    if let Err(e) = run(cli).await {
        error!(error = %e, command = %command, "command failed");
        process::exit(1);
    }
}
