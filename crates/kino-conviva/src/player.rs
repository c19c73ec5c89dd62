//! Player collaborator contract
//!
//! The bridge never drives playback. It reads the player's query surface and
//! consumes the player's event stream as [`PlayerEvent`] values.

use serde::{Deserialize, Serialize};

/// Synchronous query surface of the observed player
pub trait Player: Send + Sync {
    /// Currently loaded source, if any
    fn source(&self) -> Option<SourceConfig>;

    /// Content duration in seconds (`f64::INFINITY` for live)
    fn duration(&self) -> f64;

    /// Whether the loaded stream is live
    fn is_live(&self) -> bool;

    /// Rendering technology, e.g. `html5` or `native`
    fn player_type(&self) -> String;

    /// Streaming format, e.g. `hls`, `dash` or `progressive`
    fn stream_type(&self) -> String;

    fn is_playing(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn is_stalled(&self) -> bool;
    fn has_ended(&self) -> bool;

    /// Player configuration relevant to analytics tagging
    fn config(&self) -> PlaybackConfig;

    /// Player version string
    fn version(&self) -> String;

    /// Framework name reported with every session
    fn framework_name(&self) -> String {
        "Kino Player".to_string()
    }
}

/// Source description as loaded into the player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub title: Option<String>,
    pub hls: Option<String>,
    pub dash: Option<String>,
    pub progressive: Option<String>,
    pub vr: Option<VrConfig>,
}

impl SourceConfig {
    /// Stream URL the player will use, in HLS, DASH, progressive order
    pub fn url(&self) -> Option<&str> {
        self.hls
            .as_deref()
            .or(self.dash.as_deref())
            .or(self.progressive.as_deref())
    }
}

/// VR settings of a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VrConfig {
    pub content_type: String,
}

/// Player configuration subset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub autoplay: bool,
    pub preload: Option<String>,
}

/// An ad break as announced by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdBreak {
    pub id: String,
    /// Scheduled content time in seconds; may be infinite for post-rolls
    pub schedule_time: f64,
    #[serde(default)]
    pub ads: Vec<Ad>,
}

impl AdBreak {
    /// Summed duration of ads with a known duration
    pub fn known_duration(&self) -> Option<f64> {
        let durations: Vec<f64> = self.ads.iter().filter_map(|ad| ad.duration).collect();
        if durations.is_empty() {
            None
        } else {
            Some(durations.iter().sum())
        }
    }
}

/// A single ad within an ad break
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ad {
    pub id: String,
    pub title: Option<String>,
    pub ad_system: Option<String>,
    pub creative_id: Option<String>,
    pub media_file_url: Option<String>,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Media bitrate in bits per second
    pub bitrate: Option<u64>,
    pub is_linear: bool,
}

/// Video quality reported on quality changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoQuality {
    pub id: String,
    /// Bits per second
    pub bitrate: u64,
    pub frame_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Audio track description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTrackInfo {
    pub id: String,
    pub lang: String,
    pub label: Option<String>,
}

/// Subtitle or caption track description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrackInfo {
    pub id: String,
    pub lang: String,
    pub kind: SubtitleKind,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleKind {
    Subtitles,
    Captions,
}

/// Events emitted by the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerEvent {
    Play { time: f64 },
    Playing { time: f64 },
    Paused { time: f64 },
    TimeChanged { time: f64 },
    StallStarted,
    StallEnded,
    PlaybackFinished,
    Seek { position: f64, seek_target: f64 },
    Seeked,
    TimeShift { position: f64, target: f64 },
    TimeShifted,
    VideoPlaybackQualityChanged {
        source_quality: Option<VideoQuality>,
        target_quality: VideoQuality,
    },
    AudioChanged {
        source_audio: Option<AudioTrackInfo>,
        target_audio: AudioTrackInfo,
    },
    SubtitleEnabled { subtitle: SubtitleTrackInfo },
    SubtitleDisabled { subtitle: SubtitleTrackInfo },
    Muted,
    Unmuted,
    ViewModeChanged { from: String, to: String },
    CastStarted { device_name: Option<String> },
    CastStopped,
    AdBreakStarted { ad_break: AdBreak },
    AdBreakFinished { ad_break: AdBreak },
    AdStarted { ad: Ad },
    AdFinished { ad: Ad },
    AdSkipped { ad: Ad },
    AdError { code: u32, message: String },
    SourceUnloaded,
    Error { code: u32, name: String, message: Option<String> },
    Destroy,
    /// Any player event without a dedicated handler
    Custom {
        name: String,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl PlayerEvent {
    /// Event name used for logs and custom analytics events
    pub fn name(&self) -> &str {
        match self {
            PlayerEvent::Play { .. } => "play",
            PlayerEvent::Playing { .. } => "playing",
            PlayerEvent::Paused { .. } => "paused",
            PlayerEvent::TimeChanged { .. } => "time_changed",
            PlayerEvent::StallStarted => "stall_started",
            PlayerEvent::StallEnded => "stall_ended",
            PlayerEvent::PlaybackFinished => "playback_finished",
            PlayerEvent::Seek { .. } => "seek",
            PlayerEvent::Seeked => "seeked",
            PlayerEvent::TimeShift { .. } => "time_shift",
            PlayerEvent::TimeShifted => "time_shifted",
            PlayerEvent::VideoPlaybackQualityChanged { .. } => "video_playback_quality_changed",
            PlayerEvent::AudioChanged { .. } => "audio_changed",
            PlayerEvent::SubtitleEnabled { .. } => "subtitle_enabled",
            PlayerEvent::SubtitleDisabled { .. } => "subtitle_disabled",
            PlayerEvent::Muted => "muted",
            PlayerEvent::Unmuted => "unmuted",
            PlayerEvent::ViewModeChanged { .. } => "view_mode_changed",
            PlayerEvent::CastStarted { .. } => "cast_started",
            PlayerEvent::CastStopped => "cast_stopped",
            PlayerEvent::AdBreakStarted { .. } => "ad_break_started",
            PlayerEvent::AdBreakFinished { .. } => "ad_break_finished",
            PlayerEvent::AdStarted { .. } => "ad_started",
            PlayerEvent::AdFinished { .. } => "ad_finished",
            PlayerEvent::AdSkipped { .. } => "ad_skipped",
            PlayerEvent::AdError { .. } => "ad_error",
            PlayerEvent::SourceUnloaded => "source_unloaded",
            PlayerEvent::Error { .. } => "error",
            PlayerEvent::Destroy => "destroy",
            PlayerEvent::Custom { name, .. } => name.as_str(),
        }
    }
}

impl std::fmt::Display for PlayerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_url_precedence() {
        let source = SourceConfig {
            dash: Some("https://cdn.example.com/a.mpd".into()),
            progressive: Some("https://cdn.example.com/a.mp4".into()),
            ..Default::default()
        };
        assert_eq!(source.url(), Some("https://cdn.example.com/a.mpd"));
        assert_eq!(SourceConfig::default().url(), None);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = PlayerEvent::ViewModeChanged {
            from: "inline".into(),
            to: "fullscreen".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "view_mode_changed");
        assert_eq!(value["to"], "fullscreen");
    }

    #[test]
    fn test_event_deserializes_from_json() {
        let event: PlayerEvent = serde_json::from_str(
            r#"{"type":"ad_break_started","ad_break":{"id":"b1","schedule_time":0.0}}"#,
        )
        .unwrap();
        match event {
            PlayerEvent::AdBreakStarted { ad_break } => {
                assert_eq!(ad_break.id, "b1");
                assert!(ad_break.ads.is_empty());
            }
            other => panic!("unexpected event {other}"),
        }
    }

    #[test]
    fn test_ad_break_known_duration() {
        let ad_break = AdBreak {
            id: "b".into(),
            schedule_time: 0.0,
            ads: vec![
                Ad { id: "a".into(), duration: Some(15.0), ..Default::default() },
                Ad { id: "b".into(), duration: None, ..Default::default() },
                Ad { id: "c".into(), duration: Some(10.0), ..Default::default() },
            ],
        };
        assert_eq!(ad_break.known_duration(), Some(25.0));
    }
}
