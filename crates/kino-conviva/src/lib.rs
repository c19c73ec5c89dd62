//! Kino Conviva - Player analytics bridge for Kino
//!
//! This crate relays a video player's event stream into a Conviva-style
//! analytics session API:
//! - Content session lifecycle driven by player events
//! - Metadata with write-once, pre-first-frame and always-mutable fields
//! - Ad break classification and pluggable ad tracking
//! - Playback state, metric and custom event forwarding
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Kino Conviva                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │   Player events ──► ┌──────────────┐                            │
//! │                     │    Bridge    │  stall deadline            │
//! │   API calls ──────► │    Driver    │◄──────────┐                │
//! │                     └──────┬───────┘           │                │
//! │                            │                   │                │
//! │                     ┌──────┴───────┐    ┌──────┴───────┐        │
//! │                     │   Session    │───►│  Ad Tracker  │        │
//! │                     │ Coordinator  │    └──────────────┘        │
//! │                     └──┬────────┬──┘                            │
//! │                        │        │                               │
//! │  ┌──────────────┐  ┌───┴────┐ ┌─┴────────────┐                  │
//! │  │  Normalizer  │  │Metadata│ │  Analytics   │                  │
//! │  └──────────────┘  │Builder │ │   Client     │                  │
//! │                    └────────┘ └──────────────┘                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod config;
pub mod platform;
pub mod player;
pub mod client;
pub mod metadata;
pub mod ad_position;
pub mod normalize;
pub mod ad_tracking;
pub mod coordinator;
pub mod driver;

pub use error::{Error, Result};
pub use config::{AdTrackingMode, ConvivaConfig};
pub use platform::{device_category, DeviceCategory, DeviceMetadata, SystemInterface};
pub use player::{Ad, AdBreak, Player, PlayerEvent, SourceConfig};
pub use client::{
    AnalyticsClient, AnalyticsClientFactory, ErrorSeverity, PlaybackMetric, PlayerState,
    PlayerStateManager, SessionKey,
};
pub use metadata::{ContentMetadata, ContentMetadataBuilder, ContentMetadataOverrides, StreamType};
pub use ad_position::AdPosition;
pub use normalize::{flatten, Attributes};
pub use ad_tracking::AdTracker;
pub use coordinator::{CastMetadata, PlaybackPhase, SessionCoordinator};
pub use driver::BridgeHandle;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Kino Conviva initialized");
}
