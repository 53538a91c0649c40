use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Connection settings for the apcupsd daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address and port of the apcupsd NIS server
    pub address: String,
    /// Max time a single request may take, dial included
    #[serde(serialize_with = "super::serde::serialize_duration")]
    #[serde(deserialize_with = "super::serde::deserialize_duration")]
    pub timeout: Duration,
}

impl Config {
    /// Creates a config for the given daemon address with the default timeout
    pub fn new(address: impl Into<String>) -> Self {
        Config {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Absolute deadline for a request starting now
    pub fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            address: format!("localhost:{}", super::DEFAULT_PORT),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Build information, fixed at process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Release version
    pub version: String,
    /// VCS branch the binary was built from
    pub branch: String,
    /// VCS revision the binary was built from
    pub revision: String,
}

impl BuildInfo {
    /// Build info for this binary.
    ///
    /// Branch and revision come from the `APCMETRICS_BRANCH` and
    /// `APCMETRICS_REVISION` environment variables at compile time.
    pub fn current() -> Self {
        BuildInfo {
            version: crate::VERSION.to_string(),
            branch: option_env!("APCMETRICS_BRANCH").unwrap_or("unknown").to_string(),
            revision: option_env!("APCMETRICS_REVISION").unwrap_or("unknown").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.address, "localhost:3551");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_json() {
        let config: Config =
            serde_json::from_str(r#"{"address":"ups.local:3551","timeout":2.5}"#).unwrap();
        assert_eq!(config.address, "ups.local:3551");
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_config_deadline() {
        let config = Config::new("127.0.0.1:3551");
        let before = Instant::now();
        let deadline = config.deadline();
        assert!(deadline >= before + config.timeout);
    }

    #[test]
    fn test_build_info_current() {
        let info = BuildInfo::current();
        assert_eq!(info.version, crate::VERSION);
        assert!(!info.branch.is_empty());
    }
}
