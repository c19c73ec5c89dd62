//! Error types for Kino Conviva

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Bridge error types
#[derive(Error, Debug)]
pub enum Error {
    // Session errors
    #[error("{0}")]
    Configuration(String),

    // Construction errors
    #[error("Analytics client unavailable: {0}")]
    ClientUnavailable(String),

    #[error("Player source already loaded; the bridge must be created before a source is loaded")]
    SourceAlreadyLoaded,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Driver errors
    #[error("Bridge task is no longer running")]
    BridgeClosed,
}

impl Error {
    /// Error raised when a session is forced without a resolvable asset name
    pub fn missing_asset_name() -> Self {
        Error::Configuration(
            "Asset name is missing. Load a player source with a title first or set \
             asset_name via update_content_metadata"
                .to_string(),
        )
    }

    /// Returns the error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "CONFIGURATION",
            Error::ClientUnavailable(_) => "CLIENT_UNAVAILABLE",
            Error::SourceAlreadyLoaded => "SOURCE_ALREADY_LOADED",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::BridgeClosed => "BRIDGE_CLOSED",
        }
    }
}
