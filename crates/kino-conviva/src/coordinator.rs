//! Session Coordinator - maps player events onto analytics sessions
//!
//! Coordinates:
//! - Content session create/update/teardown
//! - Ad break reporting and the active ad tracking strategy
//! - Playback state reporting with ad suppression
//! - The stall grace window
//! - Metric and custom event forwarding

use crate::{
    ad_position::AdPosition,
    ad_tracking::{tracker_for, AdContext, AdEndReason, AdTracker},
    client::{
        AdPlayer, AdStream, AnalyticsClient, AnalyticsClientFactory, ClientSettings, ErrorSeverity,
        PlaybackMetric, PlayerState, PlayerStateManager, SessionKey,
    },
    config::ConvivaConfig,
    metadata::{
        ContentMetadata, ContentMetadataBuilder, ContentMetadataOverrides, DerivedMetadata,
        StreamType,
    },
    normalize::{flatten_serializable, Attributes},
    platform::SystemInterface,
    player::{AdBreak, Player, PlayerEvent, SubtitleKind},
    Error, Result, VERSION,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, trace, warn};

/// Message type carried by cast metadata payloads
pub const CAST_METADATA_TYPE: &str = "conviva";

/// Derived playback classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackPhase {
    Idle,
    Playing,
    AdActive,
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::AdActive => write!(f, "ad-active"),
        }
    }
}

/// Content metadata exchanged between a cast sender and receiver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub content_metadata: ContentMetadataOverrides,
}

/// Coordinator state snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub session: SessionKey,
    pub ad_session: Option<SessionKey>,
    pub phase: PlaybackPhase,
    pub released: bool,
}

/// Translates one player's events into analytics session calls
pub struct SessionCoordinator {
    player: Arc<dyn Player>,
    /// `None` when construction failed; the instance is then inert
    client: Option<Box<dyn AnalyticsClient>>,
    config: ConvivaConfig,
    metadata: ContentMetadataBuilder,
    /// Metadata last sent for the content session
    last_metadata: Option<ContentMetadata>,
    session_key: SessionKey,
    player_state_manager: Option<Box<dyn PlayerStateManager>>,
    ad_tracker: Box<dyn AdTracker>,
    has_first_frame: bool,
    is_ad_active: bool,
    current_ad_break: Option<AdBreak>,
    current_ad_position: Option<AdPosition>,
    ad_start_reported: bool,
    encoded_frame_rate: Option<f64>,
    /// Deadline of the pending stall re-evaluation
    stall_check: Option<Instant>,
    released: bool,
}

impl SessionCoordinator {
    /// Create a coordinator for `player`.
    ///
    /// Must be called before a source is loaded. If the source is already
    /// loaded or the factory cannot provide a client, the failure is logged
    /// and the returned coordinator ignores every call.
    pub fn new(
        player: Arc<dyn Player>,
        factory: &dyn AnalyticsClientFactory,
        customer_key: impl Into<String>,
        config: ConvivaConfig,
    ) -> Self {
        let mut coordinator = Self {
            player,
            client: None,
            ad_tracker: tracker_for(config.ad_tracking),
            config,
            metadata: ContentMetadataBuilder::new(),
            last_metadata: None,
            session_key: SessionKey::NONE,
            player_state_manager: None,
            has_first_frame: false,
            is_ad_active: false,
            current_ad_break: None,
            current_ad_position: None,
            ad_start_reported: false,
            encoded_frame_rate: None,
            stall_check: None,
            released: false,
        };

        if coordinator.player.source().is_some() {
            error!(error = %Error::SourceAlreadyLoaded, "Analytics bridge not initialized");
            return coordinator;
        }

        let settings = ClientSettings {
            customer_key: customer_key.into(),
            gateway_url: coordinator.config.gateway_url.clone(),
        };
        let system = SystemInterface::new(
            coordinator.config.debug_logging,
            coordinator.config.device_metadata.clone(),
        );

        match factory.create_client(&settings, system) {
            Ok(client) => {
                coordinator.client = Some(client);
                info!(
                    version = VERSION,
                    ad_tracking = ?coordinator.config.ad_tracking,
                    "Analytics bridge initialized"
                );
            }
            Err(e) => {
                error!(error = %e, code = e.error_code(), "Analytics bridge not initialized");
            }
        }

        coordinator
    }

    /// Whether construction produced a usable client
    pub fn is_constructed(&self) -> bool {
        self.client.is_some()
    }

    pub fn is_session_active(&self) -> bool {
        self.session_key.is_valid()
    }

    pub fn session_key(&self) -> SessionKey {
        self.session_key
    }

    pub fn phase(&self) -> PlaybackPhase {
        if self.is_ad_active {
            PlaybackPhase::AdActive
        } else if self.has_first_frame {
            PlaybackPhase::Playing
        } else {
            PlaybackPhase::Idle
        }
    }

    pub fn current_ad_position(&self) -> Option<AdPosition> {
        self.current_ad_position
    }

    pub fn status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            session: self.session_key,
            ad_session: self.ad_tracker.ad_session(),
            phase: self.phase(),
            released: self.released,
        }
    }

    fn is_operational(&self) -> bool {
        !self.released && self.client.is_some()
    }

    // =========================================================================
    // Public API
    // =========================================================================

    /// Merge application metadata. Reaches the client immediately when a
    /// session is active, otherwise on the next session.
    pub fn update_content_metadata(&mut self, overrides: ContentMetadataOverrides) {
        if !self.is_operational() {
            debug!("Bridge inactive, metadata update ignored");
            return;
        }
        self.metadata.set_overrides(overrides);
        self.update_session();
    }

    /// Start a session before playback begins.
    ///
    /// Fails with [`Error::Configuration`] when no asset name can be resolved
    /// from the source or from overrides.
    #[instrument(skip(self))]
    pub fn initialize_session(&mut self) -> Result<()> {
        if !self.is_operational() {
            debug!("Bridge inactive, session not initialized");
            return Ok(());
        }
        if self.is_session_active() {
            debug!(session = %self.session_key, "Session already active");
            return Ok(());
        }

        self.refresh_derived();
        if self.metadata.resolved_asset_name().is_none() {
            return Err(Error::missing_asset_name());
        }

        self.internal_initialize_session();
        Ok(())
    }

    /// Send an event on the application channel; needs no session
    pub fn send_custom_application_event(&mut self, name: &str, attributes: Option<Attributes>) {
        if !self.is_operational() {
            return;
        }
        if let Some(client) = self.client.as_deref_mut() {
            client.send_custom_event(SessionKey::NONE, name, &attributes.unwrap_or_default());
        }
    }

    /// Send an event on the content session; ignored without one
    pub fn send_custom_playback_event(&mut self, name: &str, attributes: Option<Attributes>) {
        if !self.is_operational() {
            return;
        }
        if !self.is_session_active() {
            debug!(event = name, "No active session, custom playback event dropped");
            return;
        }
        if let Some(client) = self.client.as_deref_mut() {
            client.send_custom_event(self.session_key, name, &attributes.unwrap_or_default());
        }
    }

    /// Report an error on the content session, optionally ending it
    pub fn report_playback_deficiency(
        &mut self,
        message: &str,
        severity: ErrorSeverity,
        end_session: bool,
    ) {
        if !self.is_operational() {
            return;
        }
        if !self.is_session_active() {
            debug!(deficiency = message, "No active session, playback deficiency not reported");
            return;
        }
        if let Some(client) = self.client.as_deref_mut() {
            client.report_error(self.session_key, message, severity);
        }
        if end_session {
            self.end_session();
        }
    }

    /// Apply metadata received from a cast sender
    pub fn handle_cast_metadata_event(&mut self, metadata: CastMetadata) {
        if metadata.kind != CAST_METADATA_TYPE {
            debug!(kind = %metadata.kind, "Ignoring cast metadata of another type");
            return;
        }
        self.update_content_metadata(metadata.content_metadata);
    }

    /// Payload a cast sender forwards to the receiver's coordinator
    pub fn cast_metadata(&self) -> CastMetadata {
        CastMetadata {
            kind: CAST_METADATA_TYPE.to_string(),
            content_metadata: self.metadata.overrides().clone(),
        }
    }

    /// Tear everything down. Further calls are no-ops.
    #[instrument(skip(self))]
    pub fn release(&mut self) {
        if self.released {
            debug!("Bridge already released");
            return;
        }

        self.end_session();
        self.with_ad_tracker(|tracker, ctx| tracker.reset(ctx));
        self.released = true;
        self.is_ad_active = false;
        self.current_ad_break = None;
        self.current_ad_position = None;

        if let Some(mut client) = self.client.take() {
            client.release();
            info!("Analytics bridge released");
        }
    }

    // =========================================================================
    // Timer
    // =========================================================================

    /// Deadline of the pending stall check, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.stall_check
    }

    /// Fire the stall check when its deadline has passed
    pub fn handle_timeout(&mut self, now: Instant) {
        match self.stall_check {
            Some(deadline) if now >= deadline => {
                self.stall_check = None;
                trace!("Stall grace period elapsed");
                self.report_playback_state();
            }
            _ => {}
        }
    }

    fn schedule_stall_check(&mut self) {
        self.stall_check = Some(Instant::now() + self.config.stall_grace_period());
    }

    fn cancel_stall_check(&mut self) {
        if self.stall_check.take().is_some() {
            trace!("Pending stall check cancelled");
        }
    }

    // =========================================================================
    // Player events
    // =========================================================================

    /// Feed one player event
    pub fn handle_event(&mut self, event: PlayerEvent) {
        if !self.is_operational() {
            trace!(event = %event, "Bridge inactive, event ignored");
            return;
        }
        debug!(event = %event, session = %self.session_key, "Player event");

        match event {
            PlayerEvent::Play { .. } => self.on_play(),
            PlayerEvent::Playing { .. } => self.on_playing(),
            PlayerEvent::Paused { .. } | PlayerEvent::StallEnded => {
                self.cancel_stall_check();
                self.report_playback_state();
            }
            PlayerEvent::TimeChanged { .. } => {}
            PlayerEvent::StallStarted => self.schedule_stall_check(),
            PlayerEvent::PlaybackFinished => {
                self.report_playback_state();
                self.end_session();
            }
            PlayerEvent::Seek { seek_target, .. } => {
                self.report_metric(PlaybackMetric::SeekStarted((seek_target * 1000.0) as i64));
            }
            PlayerEvent::TimeShift { .. } => self.report_metric(PlaybackMetric::SeekStarted(-1)),
            PlayerEvent::Seeked | PlayerEvent::TimeShifted => {
                self.report_metric(PlaybackMetric::SeekEnded);
            }
            PlayerEvent::VideoPlaybackQualityChanged { target_quality, .. } => {
                if target_quality.frame_rate.is_some() {
                    self.encoded_frame_rate = target_quality.frame_rate;
                }
                self.report_metric(PlaybackMetric::Bitrate(target_quality.bitrate / 1000));
                self.update_session();
            }
            PlayerEvent::AudioChanged { target_audio, .. } => {
                self.report_metric(PlaybackMetric::AudioLanguage(target_audio.lang));
            }
            PlayerEvent::SubtitleEnabled { subtitle } => {
                self.report_metric(language_metric(subtitle.kind, subtitle.lang));
            }
            PlayerEvent::SubtitleDisabled { subtitle } => {
                self.report_metric(language_metric(subtitle.kind, "off".to_string()));
            }
            PlayerEvent::AdBreakStarted { ad_break } => self.on_ad_break_started(ad_break),
            PlayerEvent::AdBreakFinished { .. } => self.on_ad_break_finished(),
            PlayerEvent::AdStarted { ad } => {
                self.with_ad_tracker(|tracker, ctx| tracker.on_ad_start(ctx, &ad));
            }
            PlayerEvent::AdFinished { .. } => {
                self.with_ad_tracker(|tracker, ctx| tracker.on_ad_end(ctx, AdEndReason::Finished));
            }
            PlayerEvent::AdSkipped { .. } => {
                self.with_ad_tracker(|tracker, ctx| tracker.on_ad_end(ctx, AdEndReason::Skipped));
            }
            PlayerEvent::AdError { code, message } => {
                let reason = AdEndReason::Error(format!("{code} {message}"));
                self.with_ad_tracker(|tracker, ctx| tracker.on_ad_end(ctx, reason));
                if self.is_ad_active {
                    self.on_ad_break_finished();
                }
            }
            PlayerEvent::SourceUnloaded => {
                if self.is_ad_active {
                    // Some player versions unload the source around ad playback
                    debug!("Source unloaded during ad, session kept");
                } else {
                    self.end_session();
                }
            }
            PlayerEvent::Error { code, name, message } => {
                let message = match message {
                    Some(detail) => format!("{code} {name}: {detail}"),
                    None => format!("{code} {name}"),
                };
                self.on_error(&message);
            }
            PlayerEvent::Destroy => self.release(),
            PlayerEvent::Muted
            | PlayerEvent::Unmuted
            | PlayerEvent::ViewModeChanged { .. }
            | PlayerEvent::CastStarted { .. }
            | PlayerEvent::CastStopped
            | PlayerEvent::Custom { .. } => self.forward_custom_event(&event),
        }
    }

    fn on_play(&mut self) {
        if !self.is_session_active() {
            self.internal_initialize_session();
        }
        self.report_playback_state();
    }

    fn on_playing(&mut self) {
        self.cancel_stall_check();
        if self.is_session_active() {
            // Last chance for pre-first-frame fields before the freeze
            self.update_session();
            self.has_first_frame = true;
            self.metadata.set_playback_started();
        }
        self.report_playback_state();
    }

    fn on_error(&mut self, message: &str) {
        if !self.is_session_active() {
            // Capture startup failures
            self.internal_initialize_session();
        }
        warn!(error = message, "Player error");
        self.report_playback_deficiency(message, ErrorSeverity::Fatal, true);

        // The player will not finish a break it failed in
        if self.is_ad_active {
            self.close_ad_break();
        }
    }

    fn on_ad_break_started(&mut self, ad_break: AdBreak) {
        let position = AdPosition::classify(ad_break.schedule_time, self.player.duration());
        self.is_ad_active = true;
        self.cancel_stall_check();
        self.current_ad_position = Some(position);
        info!(ad_break = %ad_break.id, position = %position, "Ad break started");

        if self.is_session_active() {
            if position == AdPosition::Postroll && !self.has_first_frame {
                debug!("Post-roll before first frame, ending content session");
                self.end_session();
            } else {
                self.report_ad_start(position);
            }
        } else {
            debug!("No content session, ad start deferred");
        }

        self.with_ad_tracker(|tracker, ctx| tracker.on_ad_break_start(ctx, &ad_break, position));
        self.current_ad_break = Some(ad_break);
    }

    fn on_ad_break_finished(&mut self) {
        self.close_ad_break();
        self.report_playback_state();
    }

    fn close_ad_break(&mut self) {
        self.with_ad_tracker(|tracker, ctx| tracker.on_ad_break_end(ctx));

        if self.ad_start_reported && self.is_session_active() {
            if let Some(client) = self.client.as_deref_mut() {
                client.ad_end(self.session_key);
            }
        }
        self.ad_start_reported = false;
        self.is_ad_active = false;
        self.current_ad_position = None;
        let ad_break = self.current_ad_break.take();
        info!(ad_break = ?ad_break.as_ref().map(|b| b.id.as_str()), "Ad break finished");
    }

    fn report_ad_start(&mut self, position: AdPosition) {
        if let Some(client) = self.client.as_deref_mut() {
            client.ad_start(self.session_key, AdStream::Separate, AdPlayer::Content, position);
            self.ad_start_reported = true;
        }
    }

    /// Report a break that opened before the session existed
    fn report_deferred_ad_start(&mut self, position: AdPosition) {
        debug!(position = %position, "Reporting deferred ad start");
        self.report_ad_start(position);
        if let Some(ad_break) = self.current_ad_break.clone() {
            self.with_ad_tracker(|tracker, ctx| {
                tracker.on_ad_break_start(ctx, &ad_break, position)
            });
        }
    }

    fn forward_custom_event(&mut self, event: &PlayerEvent) {
        let attributes = flatten_serializable(event);
        let name = event.name();

        let routed = self
            .with_ad_tracker(|tracker, ctx| tracker.report_custom_event(ctx, name, &attributes))
            .unwrap_or(false);
        if routed {
            return;
        }

        if !self.is_session_active() {
            debug!(event = name, "No active session, custom event dropped");
            return;
        }
        if let Some(client) = self.client.as_deref_mut() {
            client.send_custom_event(self.session_key, name, &attributes);
        }
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    fn internal_initialize_session(&mut self) {
        if self.is_session_active() {
            return;
        }

        self.refresh_derived();
        let metadata = self.metadata.build();

        let Some(client) = self.client.as_deref_mut() else {
            return;
        };
        let key = client.create_session(&metadata);
        if !key.is_valid() {
            error!(asset = ?metadata.asset_name, "Could not create analytics session");
            return;
        }

        let mut manager = client.player_state_manager();
        manager.set_player_type(&self.player.framework_name());
        manager.set_player_version(&self.player.version());
        client.attach_player(key, manager.as_ref());

        info!(session = %key, asset = ?metadata.asset_name, "Analytics session created");
        self.session_key = key;
        self.player_state_manager = Some(manager);
        self.last_metadata = Some(metadata);

        if self.is_ad_active && !self.ad_start_reported {
            if let Some(position) = self.current_ad_position {
                if position != AdPosition::Postroll {
                    self.report_deferred_ad_start(position);
                }
            }
        }
    }

    fn update_session(&mut self) {
        if !self.is_session_active() {
            return;
        }

        self.refresh_derived();
        let metadata = self.metadata.build();
        if let Some(client) = self.client.as_deref_mut() {
            client.update_content_metadata(self.session_key, &metadata);
        }
        self.last_metadata = Some(metadata);
    }

    fn end_session(&mut self) {
        if !self.is_session_active() {
            return;
        }

        self.cancel_stall_check();
        self.with_ad_tracker(|tracker, ctx| tracker.reset(ctx));

        let key = std::mem::replace(&mut self.session_key, SessionKey::NONE);
        let manager = self.player_state_manager.take();
        let ad_open = std::mem::take(&mut self.ad_start_reported);

        if let Some(client) = self.client.as_deref_mut() {
            if ad_open {
                client.ad_end(key);
            }
            client.detach_player(key);
            client.cleanup_session(key);
            if let Some(manager) = manager {
                client.release_player_state_manager(manager);
            }
        }

        self.has_first_frame = false;
        self.metadata.reset();
        self.last_metadata = None;
        info!(session = %key, "Analytics session ended");
    }

    /// Recompute the player-derived metadata record
    fn refresh_derived(&mut self) {
        let source = self.player.source();
        let config = self.player.config();
        let duration = self.player.duration();

        let mut custom = Attributes::new();
        custom.insert("playerType".into(), self.player.player_type());
        custom.insert("streamType".into(), self.player.stream_type());
        custom.insert("integrationVersion".into(), VERSION.to_string());
        custom.insert("autoplay".into(), config.autoplay.to_string());
        if let Some(preload) = config.preload {
            custom.insert("preload".into(), preload);
        }
        if let Some(vr) = source.as_ref().and_then(|s| s.vr.as_ref()) {
            custom.insert("vrContentType".into(), vr.content_type.clone());
        }

        self.metadata.set_derived(DerivedMetadata {
            asset_name: source.as_ref().and_then(|s| s.title.clone()),
            stream_url: source.as_ref().and_then(|s| s.url().map(str::to_string)),
            stream_type: Some(if self.player.is_live() {
                StreamType::Live
            } else {
                StreamType::Vod
            }),
            application_name: self.config.application_name.clone(),
            duration: (duration.is_finite() && duration > 0.0).then_some(duration),
            encoded_frame_rate: self.encoded_frame_rate,
            custom,
            framework_name: Some(self.player.framework_name()),
            framework_version: Some(self.player.version()),
        });
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Player state by priority: stalled, paused, playing, ended
    fn evaluate_player_state(&self) -> Option<PlayerState> {
        if self.player.is_stalled() {
            Some(PlayerState::Buffering)
        } else if self.player.is_paused() {
            Some(PlayerState::Paused)
        } else if self.player.is_playing() {
            Some(PlayerState::Playing)
        } else if self.player.has_ended() {
            Some(PlayerState::Stopped)
        } else {
            None
        }
    }

    fn report_playback_state(&mut self) {
        let Some(state) = self.evaluate_player_state() else {
            trace!("Player state unknown, not reported");
            return;
        };

        if self.is_ad_active {
            if !self.ad_tracker.report_player_state(state) {
                trace!(state = %state, "Content player state suppressed during ad");
            }
            return;
        }

        if !self.is_session_active() {
            return;
        }
        if let Some(manager) = self.player_state_manager.as_mut() {
            debug!(state = %state, "Reporting player state");
            manager.report_metric(PlaybackMetric::PlayerState(state));
        }
    }

    fn report_metric(&mut self, metric: PlaybackMetric) {
        if !self.is_session_active() {
            trace!(metric = metric.name(), "No active session, metric dropped");
            return;
        }
        if let Some(manager) = self.player_state_manager.as_mut() {
            manager.report_metric(metric);
        }
    }

    /// Run `f` against the ad tracker with a context borrowed from `self`
    fn with_ad_tracker<R>(
        &mut self,
        f: impl FnOnce(&mut dyn AdTracker, &mut AdContext<'_>) -> R,
    ) -> Option<R> {
        let client = self.client.as_deref_mut()?;
        let mut ctx = AdContext {
            client,
            content_session: self.session_key,
            content_metadata: self.last_metadata.as_ref(),
        };
        Some(f(self.ad_tracker.as_mut(), &mut ctx))
    }
}

fn language_metric(kind: SubtitleKind, lang: String) -> PlaybackMetric {
    match kind {
        SubtitleKind::Subtitles => PlaybackMetric::SubtitlesLanguage(lang),
        SubtitleKind::Captions => PlaybackMetric::ClosedCaptionsLanguage(lang),
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("session_key", &self.session_key)
            .field("phase", &self.phase())
            .field("current_ad_position", &self.current_ad_position)
            .field("stall_check", &self.stall_check)
            .field("released", &self.released)
            .finish()
    }
}
