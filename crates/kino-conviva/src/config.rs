//! Bridge configuration

use crate::{platform::DeviceMetadata, Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Ad tracking strategy selected at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdTrackingMode {
    /// Ad start/end at break granularity on the content session
    #[default]
    Basic,
    /// Basic plus pod start/end custom events
    AdBreaks,
    /// A dedicated ad session per ad
    AdInsights,
}

/// Bridge configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvivaConfig {
    /// Raise SDK log output to debug
    pub debug_logging: bool,
    /// Gateway URL override, for test environments
    pub gateway_url: Option<String>,
    /// Device description passed to the SDK
    pub device_metadata: Option<DeviceMetadata>,
    /// Ad tracking strategy
    pub ad_tracking: AdTrackingMode,
    /// Grace window before a stall is reported as buffering (milliseconds)
    pub stall_grace_period_ms: u64,
    /// Default application name when no override is set
    pub application_name: Option<String>,
}

impl Default for ConvivaConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            gateway_url: None,
            device_metadata: None,
            ad_tracking: AdTrackingMode::Basic,
            stall_grace_period_ms: 100,
            application_name: None,
        }
    }
}

impl ConvivaConfig {
    /// Parse configuration from JSON, filling unset fields with defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ConvivaConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.gateway_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::InvalidConfig(format!(
                    "gateway_url must be an http(s) URL, got {url}"
                )));
            }
        }
        Ok(())
    }

    pub fn stall_grace_period(&self) -> Duration {
        Duration::from_millis(self.stall_grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConvivaConfig::default();
        assert!(!config.debug_logging);
        assert_eq!(config.ad_tracking, AdTrackingMode::Basic);
        assert_eq!(config.stall_grace_period(), Duration::from_millis(100));
    }

    #[test]
    fn test_from_partial_json() {
        let config = ConvivaConfig::from_json(
            r#"{
                "debug_logging": true,
                "ad_tracking": "ad_insights",
                "gateway_url": "https://test.example.com"
            }"#,
        )
        .unwrap();
        assert!(config.debug_logging);
        assert_eq!(config.ad_tracking, AdTrackingMode::AdInsights);
        assert_eq!(config.stall_grace_period_ms, 100);
    }

    #[test]
    fn test_rejects_bad_gateway() {
        let err = ConvivaConfig::from_json(r#"{"gateway_url": "ftp://nope"}"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = ConvivaConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.error_code(), "JSON");
    }
}
