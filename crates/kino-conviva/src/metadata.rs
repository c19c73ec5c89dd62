//! Content metadata assembly
//!
//! Two records feed every build: metadata derived from the player and
//! overrides supplied by the application. Fields fall into three tiers:
//!
//! - write-once: asset name, locked by the first build of a session
//! - pre-first-frame: viewer id, stream type, application name, duration and
//!   custom tags, frozen once playback has started
//! - always-mutable: stream URL, default resource and encoded frame rate

use crate::normalize::Attributes;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Vendor key names for reserved metadata fields
pub mod keys {
    pub const ASSET_NAME: &str = "Conviva.assetName";
    pub const ENCODED_FRAME_RATE: &str = "Conviva.encodedFrameRate";
    pub const DURATION: &str = "Conviva.duration";
    pub const DEFAULT_RESOURCE: &str = "Conviva.defaultResource";
    pub const STREAM_URL: &str = "Conviva.streamUrl";
    pub const STREAM_TYPE: &str = "Conviva.streamType";
    pub const VIEWER_ID: &str = "Conviva.viewerId";
    pub const APPLICATION_NAME: &str = "Conviva.applicationName";
    pub const FRAMEWORK_NAME: &str = "Conviva.frameworkName";
    pub const FRAMEWORK_VERSION: &str = "Conviva.frameworkVersion";
}

/// Live or on-demand stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Live,
    Vod,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamType::Live => write!(f, "LIVE"),
            StreamType::Vod => write!(f, "VOD"),
        }
    }
}

/// Application supplied metadata. Unset fields leave derived values alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentMetadataOverrides {
    pub asset_name: Option<String>,
    pub viewer_id: Option<String>,
    pub stream_type: Option<StreamType>,
    pub application_name: Option<String>,
    pub custom: Option<Attributes>,
    /// Seconds
    pub duration: Option<f64>,
    pub encoded_frame_rate: Option<f64>,
    pub default_resource: Option<String>,
    pub stream_url: Option<String>,
}

impl ContentMetadataOverrides {
    /// Merge `other` into `self`; fields set in `other` win
    pub fn merge(&mut self, other: ContentMetadataOverrides) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.asset_name, other.asset_name);
        take(&mut self.viewer_id, other.viewer_id);
        take(&mut self.stream_type, other.stream_type);
        take(&mut self.application_name, other.application_name);
        take(&mut self.custom, other.custom);
        take(&mut self.duration, other.duration);
        take(&mut self.encoded_frame_rate, other.encoded_frame_rate);
        take(&mut self.default_resource, other.default_resource);
        take(&mut self.stream_url, other.stream_url);
    }

    /// Whether any pre-first-frame field is set
    fn touches_frozen_fields(&self) -> bool {
        self.viewer_id.is_some()
            || self.stream_type.is_some()
            || self.application_name.is_some()
            || self.custom.is_some()
            || self.duration.is_some()
    }
}

/// Metadata computed from the player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedMetadata {
    pub asset_name: Option<String>,
    pub stream_url: Option<String>,
    pub stream_type: Option<StreamType>,
    pub application_name: Option<String>,
    pub duration: Option<f64>,
    pub encoded_frame_rate: Option<f64>,
    /// Diagnostic tags; these win over application tags on key collision
    pub custom: Attributes,
    pub framework_name: Option<String>,
    pub framework_version: Option<String>,
}

/// Resolved metadata for one build
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub asset_name: Option<String>,
    pub viewer_id: Option<String>,
    pub stream_type: Option<StreamType>,
    pub application_name: Option<String>,
    pub duration: Option<f64>,
    pub custom: Attributes,
    pub stream_url: Option<String>,
    pub default_resource: Option<String>,
    pub encoded_frame_rate: Option<f64>,
    pub framework_name: Option<String>,
    pub framework_version: Option<String>,
}

impl ContentMetadata {
    /// Flatten into the vendor key/value map. Custom tags are applied last and
    /// may shadow reserved keys.
    pub fn to_vendor_map(&self) -> Attributes {
        let mut map = Attributes::new();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v);
            }
        };

        put(keys::ASSET_NAME, self.asset_name.clone());
        put(keys::ENCODED_FRAME_RATE, self.encoded_frame_rate.and_then(whole));
        put(keys::DURATION, self.duration.and_then(whole));
        put(keys::DEFAULT_RESOURCE, self.default_resource.clone());
        put(keys::STREAM_URL, self.stream_url.clone());
        put(keys::STREAM_TYPE, self.stream_type.map(|t| t.to_string()));
        put(keys::VIEWER_ID, self.viewer_id.clone());
        put(keys::APPLICATION_NAME, self.application_name.clone());
        put(keys::FRAMEWORK_NAME, self.framework_name.clone());
        put(keys::FRAMEWORK_VERSION, self.framework_version.clone());

        for (key, value) in &self.custom {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// Integer rendering for vendor numeric fields; non-finite and non-positive
/// values are omitted
fn whole(value: f64) -> Option<String> {
    if value.is_finite() && value > 0.0 {
        Some(format!("{}", value.round() as i64))
    } else {
        None
    }
}

/// Pre-first-frame values as last computed before the freeze
#[derive(Debug, Clone, Default)]
struct PreFirstFrame {
    viewer_id: Option<String>,
    stream_type: Option<StreamType>,
    application_name: Option<String>,
    duration: Option<f64>,
    custom: Attributes,
}

/// Merges derived metadata and overrides honoring the mutability tiers
#[derive(Debug, Clone, Default)]
pub struct ContentMetadataBuilder {
    overrides: ContentMetadataOverrides,
    derived: DerivedMetadata,
    playback_started: bool,
    asset_name: Option<String>,
    snapshot: PreFirstFrame,
}

impl ContentMetadataBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge application overrides. Pre-first-frame fields set after playback
    /// started are kept for the next session only.
    pub fn set_overrides(&mut self, overrides: ContentMetadataOverrides) {
        if self.playback_started && overrides.touches_frozen_fields() {
            warn!(
                "Playback has started; only stream_url, default_resource and encoded_frame_rate \
                 apply to the current session, other fields take effect on the next session"
            );
        }
        self.overrides.merge(overrides);
    }

    pub fn overrides(&self) -> &ContentMetadataOverrides {
        &self.overrides
    }

    /// Replace the player-derived record
    pub fn set_derived(&mut self, derived: DerivedMetadata) {
        self.derived = derived;
    }

    /// Freeze write-once and pre-first-frame fields for this session
    pub fn set_playback_started(&mut self) {
        self.playback_started = true;
    }

    /// Asset name the next build would use
    pub fn resolved_asset_name(&self) -> Option<&str> {
        self.asset_name
            .as_deref()
            .or(self.overrides.asset_name.as_deref())
            .or(self.derived.asset_name.as_deref())
    }

    /// Resolve the current metadata
    pub fn build(&mut self) -> ContentMetadata {
        if !self.playback_started {
            if self.asset_name.is_none() {
                self.asset_name = self
                    .overrides
                    .asset_name
                    .clone()
                    .or_else(|| self.derived.asset_name.clone());
            }

            let o = &self.overrides;
            let d = &self.derived;
            self.snapshot = PreFirstFrame {
                viewer_id: o.viewer_id.clone(),
                stream_type: o.stream_type.or(d.stream_type),
                application_name: o
                    .application_name
                    .clone()
                    .or_else(|| d.application_name.clone()),
                duration: o.duration.or(d.duration),
                custom: merge_custom_tags(o.custom.as_ref(), &d.custom),
            };
        }

        let o = &self.overrides;
        let d = &self.derived;
        ContentMetadata {
            asset_name: self.asset_name.clone(),
            viewer_id: self.snapshot.viewer_id.clone(),
            stream_type: self.snapshot.stream_type,
            application_name: self.snapshot.application_name.clone(),
            duration: self.snapshot.duration,
            custom: self.snapshot.custom.clone(),
            stream_url: o.stream_url.clone().or_else(|| d.stream_url.clone()),
            default_resource: o.default_resource.clone(),
            encoded_frame_rate: o.encoded_frame_rate.or(d.encoded_frame_rate),
            framework_name: d.framework_name.clone(),
            framework_version: d.framework_version.clone(),
        }
    }

    /// Clear per-session state. Overrides survive for the next session.
    pub fn reset(&mut self) {
        self.derived = DerivedMetadata::default();
        self.playback_started = false;
        self.asset_name = None;
        self.snapshot = PreFirstFrame::default();
    }
}

/// Application tags first, derived tags on top
fn merge_custom_tags(application: Option<&Attributes>, derived: &Attributes) -> Attributes {
    let mut tags = application.cloned().unwrap_or_default();
    tags.extend(derived.iter().map(|(k, v)| (k.clone(), v.clone())));
    tags
}
