//! Analytics client contract
//!
//! The analytics SDK is an external stateful API. These traits describe the
//! calls the bridge makes into it; a host wires them to the real SDK and tests
//! wire them to recording doubles.

use crate::{
    ad_position::AdPosition,
    metadata::ContentMetadata,
    normalize::Attributes,
    platform::SystemInterface,
    Result,
};
use serde::{Deserialize, Serialize};

/// Opaque session handle issued by the analytics client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey(pub i64);

impl SessionKey {
    /// Sentinel meaning "no session"; also the application-scope channel
    pub const NONE: SessionKey = SessionKey(-2);

    pub fn is_valid(&self) -> bool {
        *self != Self::NONE
    }
}

impl Default for SessionKey {
    fn default() -> Self {
        Self::NONE
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Player states understood by the analytics client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Stopped,
    Playing,
    Buffering,
    Paused,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "STOPPED"),
            PlayerState::Playing => write!(f, "PLAYING"),
            PlayerState::Buffering => write!(f, "BUFFERING"),
            PlayerState::Paused => write!(f, "PAUSED"),
        }
    }
}

/// Playback metrics reported through a player state manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackMetric {
    PlayerState(PlayerState),
    /// Kilobits per second
    Bitrate(u64),
    /// Seek target in milliseconds, `-1` when unknown (time shift)
    SeekStarted(i64),
    SeekEnded,
    AudioLanguage(String),
    SubtitlesLanguage(String),
    ClosedCaptionsLanguage(String),
}

impl PlaybackMetric {
    /// Vendor metric name
    pub fn name(&self) -> &'static str {
        match self {
            PlaybackMetric::PlayerState(_) => "Conviva.playback_state",
            PlaybackMetric::Bitrate(_) => "Conviva.playback_bitrate",
            PlaybackMetric::SeekStarted(_) => "Conviva.playback_seek_started",
            PlaybackMetric::SeekEnded => "Conviva.playback_seek_ended",
            PlaybackMetric::AudioLanguage(_) => "Conviva.audioLanguage",
            PlaybackMetric::SubtitlesLanguage(_) => "Conviva.subtitleLanguage",
            PlaybackMetric::ClosedCaptionsLanguage(_) => "Conviva.closedCaptionLanguage",
        }
    }
}

/// How ads are stitched relative to content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdStream {
    Content,
    Separate,
}

/// Which player renders the ad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdPlayer {
    Content,
    Separate,
}

/// Severity of a reported playback error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Fatal,
    Warning,
}

/// Settings handed to the client factory
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub customer_key: String,
    pub gateway_url: Option<String>,
}

/// Builds analytics clients. Fails when the SDK is not available to the host.
pub trait AnalyticsClientFactory {
    fn create_client(
        &self,
        settings: &ClientSettings,
        system: SystemInterface,
    ) -> Result<Box<dyn AnalyticsClient>>;
}

/// Per-session player state manager
pub trait PlayerStateManager: Send {
    fn set_player_type(&mut self, player_type: &str);
    fn set_player_version(&mut self, version: &str);
    fn report_metric(&mut self, metric: PlaybackMetric);
}

/// Session API of the analytics client
pub trait AnalyticsClient: Send {
    /// Create a content session; returns [`SessionKey::NONE`] on failure
    fn create_session(&mut self, metadata: &ContentMetadata) -> SessionKey;

    /// Create an ad session linked to a content session
    fn create_ad_session(&mut self, content: SessionKey, metadata: &ContentMetadata) -> SessionKey;

    fn update_content_metadata(&mut self, key: SessionKey, metadata: &ContentMetadata);

    fn player_state_manager(&mut self) -> Box<dyn PlayerStateManager>;
    fn release_player_state_manager(&mut self, manager: Box<dyn PlayerStateManager>);

    fn attach_player(&mut self, key: SessionKey, manager: &dyn PlayerStateManager);
    fn detach_player(&mut self, key: SessionKey);

    fn ad_start(
        &mut self,
        key: SessionKey,
        stream: AdStream,
        player: AdPlayer,
        position: AdPosition,
    );
    fn ad_end(&mut self, key: SessionKey);

    fn send_custom_event(&mut self, key: SessionKey, name: &str, attributes: &Attributes);
    fn report_error(&mut self, key: SessionKey, message: &str, severity: ErrorSeverity);

    fn cleanup_session(&mut self, key: SessionKey);

    /// Release the client and its system interface
    fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_sentinel() {
        assert!(!SessionKey::NONE.is_valid());
        assert!(!SessionKey::default().is_valid());
        assert!(SessionKey(0).is_valid());
        assert!(SessionKey(17).is_valid());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(
            PlaybackMetric::PlayerState(PlayerState::Buffering).name(),
            "Conviva.playback_state"
        );
        assert_eq!(PlaybackMetric::SeekStarted(-1).name(), "Conviva.playback_seek_started");
        assert_eq!(
            PlaybackMetric::ClosedCaptionsLanguage("en".into()).name(),
            "Conviva.closedCaptionLanguage"
        );
    }
}
