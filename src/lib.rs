//! apcmetrics: client and exporter for the apcupsd network information server
//!
//! apcupsd answers `status` and `events` commands over a small
//! length-prefixed TCP protocol. This library speaks that protocol, decodes
//! the loosely structured text it returns into typed records, and can
//! republish the status as Prometheus gauges.
//!
//! ```no_run
//! use apcmetrics::NisClient;
//! use std::time::Duration;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> apcmetrics::Result<()> {
//!     let client = NisClient::new("localhost:3551");
//!     let status = client.status(Some(Instant::now() + Duration::from_secs(5))).await?;
//!     println!("{} {:?}", status.status, status.time_left);
//!     Ok(())
//! }
//! ```
pub mod core;
pub mod decode;
pub mod exporter;
pub mod network;
pub mod protocol;

// Re-export commonly used items
pub use crate::core::{Config, Error, Result};
pub use crate::decode::{decode_events, decode_status, UpsEvent, UpsStatus};
pub use crate::network::NisClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
