//! Ad tracking strategies
//!
//! The coordinator always reports ad start/end on the content session at
//! break granularity. A strategy adds whatever per-break or per-ad reporting
//! its mode requires. Exactly one strategy is active per coordinator.

use crate::{
    ad_position::AdPosition,
    client::{
        AnalyticsClient, ErrorSeverity, PlaybackMetric, PlayerState, PlayerStateManager, SessionKey,
    },
    config::AdTrackingMode,
    metadata::ContentMetadata,
    normalize::Attributes,
    player::{Ad, AdBreak},
};
use tracing::{debug, error, info};

/// Custom event names for pod tracking
pub const POD_START: &str = "Conviva.PodStart";
pub const POD_END: &str = "Conviva.PodEnd";
pub const AD_SKIPPED: &str = "Conviva.AdSkipped";

/// Collaborators a strategy may use while handling one callback
pub struct AdContext<'a> {
    pub client: &'a mut dyn AnalyticsClient,
    /// Content session, possibly [`SessionKey::NONE`]
    pub content_session: SessionKey,
    /// Metadata last sent for the content session
    pub content_metadata: Option<&'a ContentMetadata>,
}

/// Why an ad stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdEndReason {
    Finished,
    Skipped,
    Error(String),
}

/// Ad tracking capability
pub trait AdTracker: Send {
    fn on_ad_break_start(
        &mut self,
        ctx: &mut AdContext<'_>,
        ad_break: &AdBreak,
        position: AdPosition,
    );
    fn on_ad_break_end(&mut self, ctx: &mut AdContext<'_>);
    fn on_ad_start(&mut self, ctx: &mut AdContext<'_>, ad: &Ad);
    fn on_ad_end(&mut self, ctx: &mut AdContext<'_>, reason: AdEndReason);

    /// Route a player state to the ad session. Returns `false` when no ad
    /// session consumed it.
    fn report_player_state(&mut self, state: PlayerState) -> bool;

    /// Key of the live ad session, if any
    fn ad_session(&self) -> Option<SessionKey>;

    fn is_ad_session_active(&self) -> bool {
        self.ad_session().is_some()
    }

    /// Send a custom event on the ad session. Returns `false` without one.
    fn report_custom_event(
        &mut self,
        ctx: &mut AdContext<'_>,
        name: &str,
        attributes: &Attributes,
    ) -> bool {
        match self.ad_session() {
            Some(key) => {
                ctx.client.send_custom_event(key, name, attributes);
                true
            }
            None => false,
        }
    }

    /// End anything still open; called before the content session goes away
    fn reset(&mut self, ctx: &mut AdContext<'_>);
}

/// Build the strategy for a mode
pub fn tracker_for(mode: AdTrackingMode) -> Box<dyn AdTracker> {
    match mode {
        AdTrackingMode::Basic => Box::new(BasicAdTracker),
        AdTrackingMode::AdBreaks => Box::new(AdBreakTracker::default()),
        AdTrackingMode::AdInsights => Box::new(AdInsightsTracker::default()),
    }
}

/// Break-level start/end only
#[derive(Debug, Default)]
pub struct BasicAdTracker;

impl AdTracker for BasicAdTracker {
    fn on_ad_break_start(
        &mut self,
        _ctx: &mut AdContext<'_>,
        _ad_break: &AdBreak,
        _position: AdPosition,
    ) {
    }
    fn on_ad_break_end(&mut self, _ctx: &mut AdContext<'_>) {}
    fn on_ad_start(&mut self, _ctx: &mut AdContext<'_>, _ad: &Ad) {}
    fn on_ad_end(&mut self, _ctx: &mut AdContext<'_>, _reason: AdEndReason) {}

    fn report_player_state(&mut self, _state: PlayerState) -> bool {
        false
    }

    fn ad_session(&self) -> Option<SessionKey> {
        None
    }

    fn reset(&mut self, _ctx: &mut AdContext<'_>) {}
}

/// Pod start/end custom events on the content session
#[derive(Debug, Default)]
pub struct AdBreakTracker {
    pod_index: u32,
    open_pod: Option<Attributes>,
}

impl AdBreakTracker {
    fn close_pod(&mut self, ctx: &mut AdContext<'_>) {
        if let Some(attributes) = self.open_pod.take() {
            if ctx.content_session.is_valid() {
                ctx.client.send_custom_event(ctx.content_session, POD_END, &attributes);
            }
        }
    }
}

impl AdTracker for AdBreakTracker {
    fn on_ad_break_start(
        &mut self,
        ctx: &mut AdContext<'_>,
        ad_break: &AdBreak,
        position: AdPosition,
    ) {
        if !ctx.content_session.is_valid() {
            debug!(ad_break = %ad_break.id, "No content session, pod start not reported");
            return;
        }
        self.close_pod(ctx);

        self.pod_index += 1;
        let mut attributes = Attributes::new();
        attributes.insert("podPosition".into(), position.pod_label().into());
        attributes.insert("podIndex".into(), self.pod_index.to_string());
        attributes.insert("absoluteIndex".into(), "1".into());
        if let Some(duration) = ad_break.known_duration() {
            attributes.insert("podDuration".into(), format!("{}", duration.round() as i64));
        }

        ctx.client.send_custom_event(ctx.content_session, POD_START, &attributes);
        self.open_pod = Some(attributes);
    }

    fn on_ad_break_end(&mut self, ctx: &mut AdContext<'_>) {
        self.close_pod(ctx);
    }

    fn on_ad_start(&mut self, _ctx: &mut AdContext<'_>, _ad: &Ad) {}
    fn on_ad_end(&mut self, _ctx: &mut AdContext<'_>, _reason: AdEndReason) {}

    fn report_player_state(&mut self, _state: PlayerState) -> bool {
        false
    }

    fn ad_session(&self) -> Option<SessionKey> {
        None
    }

    fn reset(&mut self, ctx: &mut AdContext<'_>) {
        self.close_pod(ctx);
    }
}

struct ActiveAd {
    key: SessionKey,
    manager: Box<dyn PlayerStateManager>,
}

/// One ad session per ad, with its own player state manager
#[derive(Default)]
pub struct AdInsightsTracker {
    position: Option<AdPosition>,
    active: Option<ActiveAd>,
}

impl AdInsightsTracker {
    fn ad_metadata(&self, ad: &Ad, content: Option<&ContentMetadata>) -> ContentMetadata {
        let mut custom = Attributes::new();
        custom.insert("c3.ad.id".into(), ad.id.clone());
        custom.insert("c3.ad.technology".into(), "Client Side".into());
        custom.insert("c3.ad.isSlate".into(), "false".into());
        custom.insert("c3.ad.mediaFileApiFramework".into(), "NA".into());
        custom.insert("c3.ad.adStitcher".into(), "NA".into());
        custom.insert(
            "c3.ad.system".into(),
            ad.ad_system.clone().unwrap_or_else(|| "NA".into()),
        );
        custom.insert(
            "c3.ad.creativeId".into(),
            ad.creative_id.clone().unwrap_or_else(|| "NA".into()),
        );
        if let Some(position) = self.position {
            custom.insert("c3.ad.position".into(), position.to_string());
        }

        ContentMetadata {
            asset_name: Some(ad.title.clone().unwrap_or_else(|| ad.id.clone())),
            viewer_id: content.and_then(|c| c.viewer_id.clone()),
            stream_type: content.and_then(|c| c.stream_type),
            application_name: content.and_then(|c| c.application_name.clone()),
            duration: ad.duration,
            custom,
            stream_url: ad.media_file_url.clone(),
            default_resource: None,
            encoded_frame_rate: None,
            framework_name: content.and_then(|c| c.framework_name.clone()),
            framework_version: content.and_then(|c| c.framework_version.clone()),
        }
    }

    fn end_active(&mut self, ctx: &mut AdContext<'_>, reason: AdEndReason) {
        let Some(active) = self.active.take() else {
            return;
        };

        match &reason {
            AdEndReason::Error(message) => {
                ctx.client.report_error(active.key, message, ErrorSeverity::Fatal);
            }
            AdEndReason::Skipped => {
                ctx.client.send_custom_event(active.key, AD_SKIPPED, &Attributes::new());
            }
            AdEndReason::Finished => {}
        }

        ctx.client.detach_player(active.key);
        ctx.client.cleanup_session(active.key);
        ctx.client.release_player_state_manager(active.manager);
        info!(ad_session = %active.key, reason = ?reason, "Ad session ended");
    }
}

impl AdTracker for AdInsightsTracker {
    fn on_ad_break_start(
        &mut self,
        _ctx: &mut AdContext<'_>,
        _ad_break: &AdBreak,
        position: AdPosition,
    ) {
        self.position = Some(position);
    }

    fn on_ad_break_end(&mut self, ctx: &mut AdContext<'_>) {
        self.end_active(ctx, AdEndReason::Finished);
        self.position = None;
    }

    fn on_ad_start(&mut self, ctx: &mut AdContext<'_>, ad: &Ad) {
        // A previous ad that never reported its end
        self.end_active(ctx, AdEndReason::Finished);

        if !ctx.content_session.is_valid() {
            debug!(ad = %ad.id, "No content session, ad session not created");
            return;
        }

        let metadata = self.ad_metadata(ad, ctx.content_metadata);
        let key = ctx.client.create_ad_session(ctx.content_session, &metadata);
        if !key.is_valid() {
            error!(ad = %ad.id, "Could not create ad session");
            return;
        }

        let mut manager = ctx.client.player_state_manager();
        if let Some(content) = ctx.content_metadata {
            if let Some(name) = &content.framework_name {
                manager.set_player_type(name);
            }
            if let Some(version) = &content.framework_version {
                manager.set_player_version(version);
            }
        }
        ctx.client.attach_player(key, manager.as_ref());
        manager.report_metric(PlaybackMetric::PlayerState(PlayerState::Playing));
        if let Some(bitrate) = ad.bitrate {
            manager.report_metric(PlaybackMetric::Bitrate(bitrate / 1000));
        }

        info!(ad_session = %key, ad = %ad.id, "Ad session started");
        self.active = Some(ActiveAd { key, manager });
    }

    fn on_ad_end(&mut self, ctx: &mut AdContext<'_>, reason: AdEndReason) {
        self.end_active(ctx, reason);
    }

    fn report_player_state(&mut self, state: PlayerState) -> bool {
        match self.active.as_mut() {
            Some(active) => {
                active.manager.report_metric(PlaybackMetric::PlayerState(state));
                true
            }
            None => false,
        }
    }

    fn ad_session(&self) -> Option<SessionKey> {
        self.active.as_ref().map(|a| a.key)
    }

    fn reset(&mut self, ctx: &mut AdContext<'_>) {
        self.end_active(ctx, AdEndReason::Finished);
        self.position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_for_mode() {
        assert!(!tracker_for(AdTrackingMode::Basic).is_ad_session_active());
        assert!(!tracker_for(AdTrackingMode::AdBreaks).is_ad_session_active());
        assert!(!tracker_for(AdTrackingMode::AdInsights).is_ad_session_active());
    }

    #[test]
    fn test_ad_metadata_uses_title_then_id() {
        let tracker = AdInsightsTracker {
            position: Some(AdPosition::Midroll),
            active: None,
        };
        let ad = Ad {
            id: "ad-7".into(),
            duration: Some(15.0),
            media_file_url: Some("https://ads.example.com/7.mp4".into()),
            ..Default::default()
        };
        let metadata = tracker.ad_metadata(&ad, None);
        assert_eq!(metadata.asset_name.as_deref(), Some("ad-7"));
        assert_eq!(metadata.custom["c3.ad.position"], "MIDROLL");
        assert_eq!(metadata.custom["c3.ad.system"], "NA");
        assert_eq!(metadata.duration, Some(15.0));

        let titled = Ad { title: Some("Spot".into()), ..ad };
        assert_eq!(tracker.ad_metadata(&titled, None).asset_name.as_deref(), Some("Spot"));
    }

    #[test]
    fn test_basic_tracker_never_consumes_state() {
        let mut tracker = BasicAdTracker;
        assert!(!tracker.report_player_state(PlayerState::Playing));
    }
}
