//! Platform shims handed to the analytics client
//!
//! The SDK expects a system interface for logging, timers, HTTP and storage.
//! Timers, HTTP and storage belong to the host; this module carries the parts
//! the bridge owns: logging into `tracing`, settings, and device metadata.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// SDK log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SdkLogLevel {
    Debug,
    Info,
    Warning,
    Error,
    None,
}

/// Logging capability required by the SDK
pub trait LoggingInterface: Send + Sync {
    fn log(&self, message: &str, level: SdkLogLevel);
}

/// Forwards SDK log lines to `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingLogger;

impl LoggingInterface for TracingLogger {
    fn log(&self, message: &str, level: SdkLogLevel) {
        match level {
            SdkLogLevel::Debug => debug!(target: "conviva_sdk", "{}", message),
            SdkLogLevel::Info => info!(target: "conviva_sdk", "{}", message),
            SdkLogLevel::Warning => warn!(target: "conviva_sdk", "{}", message),
            SdkLogLevel::Error => error!(target: "conviva_sdk", "{}", message),
            SdkLogLevel::None => {}
        }
    }
}

/// SDK system settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemSettings {
    pub log_level: SdkLogLevel,
    pub allow_uncaught_exceptions: bool,
}

impl SystemSettings {
    pub fn new(debug_logging: bool) -> Self {
        Self {
            log_level: if debug_logging {
                SdkLogLevel::Debug
            } else {
                SdkLogLevel::Error
            },
            allow_uncaught_exceptions: false,
        }
    }
}

/// Device category reported to the SDK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceCategory {
    Android,
    Apple,
    Chromecast,
    Desktop,
    Kaios,
    Lg,
    Playstation,
    Roku,
    Samsung,
    SetTopBox,
    SmartTv,
    Tivo,
    Web,
    Windows,
    Xbox,
}

/// Device description supplied by the host application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMetadata {
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub device_type: Option<String>,
    pub version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub category: Option<DeviceCategory>,
    pub screen_resolution: Option<(u32, u32)>,
}

/// Device category for the SDK; hosts that supply no metadata or no category
/// are reported as [`DeviceCategory::Web`].
pub fn device_category(metadata: Option<&DeviceMetadata>) -> DeviceCategory {
    metadata
        .and_then(|m| m.category)
        .unwrap_or(DeviceCategory::Web)
}

/// Everything the client factory receives besides its settings
#[derive(Clone)]
pub struct SystemInterface {
    pub logger: Arc<dyn LoggingInterface>,
    pub settings: SystemSettings,
    pub device: Option<DeviceMetadata>,
    pub device_category: DeviceCategory,
}

impl SystemInterface {
    pub fn new(debug_logging: bool, device: Option<DeviceMetadata>) -> Self {
        let device_category = device_category(device.as_ref());
        Self {
            logger: Arc::new(TracingLogger),
            settings: SystemSettings::new(debug_logging),
            device,
            device_category,
        }
    }
}

impl std::fmt::Debug for SystemInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemInterface")
            .field("settings", &self.settings)
            .field("device", &self.device)
            .field("device_category", &self.device_category)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_category_without_metadata() {
        assert_eq!(device_category(None), DeviceCategory::Web);
    }

    #[test]
    fn test_device_category_without_category() {
        let metadata = DeviceMetadata {
            brand: Some("Acme".into()),
            ..Default::default()
        };
        assert_eq!(device_category(Some(&metadata)), DeviceCategory::Web);
    }

    #[test]
    fn test_device_category_from_metadata() {
        let metadata = DeviceMetadata {
            category: Some(DeviceCategory::SmartTv),
            ..Default::default()
        };
        assert_eq!(device_category(Some(&metadata)), DeviceCategory::SmartTv);
    }

    #[test]
    fn test_system_settings_log_level() {
        assert_eq!(SystemSettings::new(true).log_level, SdkLogLevel::Debug);
        assert_eq!(SystemSettings::new(false).log_level, SdkLogLevel::Error);
    }

    #[test]
    fn test_system_interface_resolves_category() {
        let system = SystemInterface::new(false, None);
        assert_eq!(system.device_category, DeviceCategory::Web);
        system.logger.log("logger smoke test", SdkLogLevel::Info);
    }
}
