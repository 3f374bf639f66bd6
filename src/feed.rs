//! What one effect instance knows about the playback service: the latest
//! accepted snapshot, the analysis and artwork for the current track.

use crate::analysis::AudioAnalysis;
use crate::clock::{PlaybackClock, PlaybackSnapshot};
use crate::service::NowPlaying;
use image::RgbImage;
use log::debug;
use std::sync::Arc;
use std::time::Instant;

/// Result of offering a now-playing report to a feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    pub accepted: bool,
    /// The report names a different track than before; fetch its analysis.
    pub track_changed: bool,
    /// The report names different artwork than before; fetch it.
    pub artwork_changed: bool,
}

#[derive(Default)]
pub struct PlaybackFeed {
    clock: PlaybackClock,
    track_id: Option<String>,
    is_track: bool,
    last_service_timestamp: Option<u64>,
    analysis: Option<Arc<AudioAnalysis>>,
    artwork_url: Option<String>,
    artwork: Option<Arc<RgbImage>>,
    /// Bumped on every track change so effects can drop bar continuity.
    session: u64,
}

impl PlaybackFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_id(&self) -> Option<&str> {
        self.track_id.as_deref()
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn has_snapshot(&self) -> bool {
        self.clock.snapshot().is_some()
    }

    /// The current item is a track, so it has a musical analysis.
    pub fn is_track(&self) -> bool {
        self.is_track
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    /// Seconds into the current track at `now`.
    pub fn position(&self, now: Instant) -> f64 {
        self.clock.estimate(now)
    }

    /// Analysis for the current track; absent for non-musical items.
    pub fn analysis(&self) -> Option<&AudioAnalysis> {
        if self.is_track {
            self.analysis.as_deref()
        } else {
            None
        }
    }

    pub fn artwork_url(&self) -> Option<&str> {
        self.artwork_url.as_deref()
    }

    pub fn artwork(&self) -> Option<&RgbImage> {
        self.artwork.as_deref()
    }

    /// Take a now-playing report sampled at `now`. Reports not newer than
    /// the last accepted one are dropped.
    pub fn accept(&mut self, now_playing: &NowPlaying, now: Instant) -> FeedUpdate {
        if let Some(last) = self.last_service_timestamp {
            if now_playing.service_timestamp_ms <= last {
                debug!(
                    "[REFRESH] Dropping stale report ({} <= {})",
                    now_playing.service_timestamp_ms, last
                );
                return FeedUpdate::default();
            }
        }
        self.last_service_timestamp = Some(now_playing.service_timestamp_ms);

        let track_changed = self.track_id.as_deref() != Some(now_playing.track_id.as_str());
        if track_changed {
            debug!("[REFRESH] Track -> {}", now_playing.track_id);
            self.track_id = Some(now_playing.track_id.clone());
            self.analysis = None;
            self.session += 1;
        }
        self.is_track = now_playing.has_analysis();

        let artwork_changed = self.artwork_url != now_playing.artwork_url;
        if artwork_changed {
            self.artwork_url = now_playing.artwork_url.clone();
            self.artwork = None;
        }

        self.clock.publish(PlaybackSnapshot {
            track_id: now_playing.track_id.clone(),
            progress_ms: now_playing.progress_ms,
            is_playing: now_playing.is_playing,
            sampled_at: now,
        });

        FeedUpdate {
            accepted: true,
            track_changed: track_changed && self.is_track,
            artwork_changed: artwork_changed && self.artwork_url.is_some(),
        }
    }

    /// Install an analysis fetched for `track_id`. Returns false and discards
    /// it when the feed has moved on to another track.
    pub fn publish_analysis(&mut self, track_id: &str, analysis: impl Into<Arc<AudioAnalysis>>) -> bool {
        if self.track_id.as_deref() != Some(track_id) {
            debug!("[REFRESH] Discarding analysis for {}, no longer playing", track_id);
            return false;
        }
        self.analysis = Some(analysis.into());
        true
    }

    pub fn publish_artwork(&mut self, url: &str, artwork: impl Into<Arc<RgbImage>>) -> bool {
        if self.artwork_url.as_deref() != Some(url) {
            return false;
        }
        self.artwork = Some(artwork.into());
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::analysis::tests::steady_track;
    use crate::service::ItemKind;
    use std::time::Duration;

    pub(crate) fn report(track_id: &str, progress_ms: u64, service_timestamp_ms: u64) -> NowPlaying {
        NowPlaying {
            track_id: track_id.to_string(),
            kind: ItemKind::Track,
            progress_ms,
            is_playing: true,
            service_timestamp_ms,
            artwork_url: None,
        }
    }

    /// A feed already playing `analysis` from position `progress_ms` at `now`.
    pub(crate) fn playing_feed(analysis: AudioAnalysis, progress_ms: u64, now: Instant) -> PlaybackFeed {
        let mut feed = PlaybackFeed::new();
        feed.accept(&report("track", progress_ms, 1), now);
        feed.publish_analysis("track", analysis);
        feed
    }

    #[test]
    fn test_stale_report_is_rejected() {
        let now = Instant::now();
        let mut feed = PlaybackFeed::new();
        assert!(feed.accept(&report("a", 1_000, 100), now).accepted);

        let stale = feed.accept(&report("a", 50_000, 100), now);
        assert!(!stale.accepted);
        let older = feed.accept(&report("b", 50_000, 99), now);
        assert!(!older.accepted);
        assert_eq!(feed.track_id(), Some("a"));
        assert_eq!(feed.position(now), 1.0);

        assert!(feed.accept(&report("a", 2_000, 101), now).accepted);
        assert_eq!(feed.position(now), 2.0);
    }

    #[test]
    fn test_track_change_clears_analysis_and_bumps_session() {
        let now = Instant::now();
        let mut feed = playing_feed(steady_track(2, 2.0, 120.0, 4), 0, now);
        assert!(feed.analysis().is_some());
        let session = feed.session();

        let same = feed.accept(&report("track", 500, 2), now);
        assert!(!same.track_changed);
        assert!(feed.analysis().is_some());

        let changed = feed.accept(&report("next", 0, 3), now + Duration::from_millis(10));
        assert!(changed.track_changed);
        assert!(feed.analysis().is_none());
        assert_eq!(feed.session(), session + 1);
    }

    #[test]
    fn test_late_analysis_for_old_track_is_discarded() {
        let now = Instant::now();
        let mut feed = PlaybackFeed::new();
        feed.accept(&report("a", 0, 1), now);
        feed.accept(&report("b", 0, 2), now);
        assert!(!feed.publish_analysis("a", steady_track(1, 1.0, 120.0, 4)));
        assert!(feed.analysis().is_none());
        assert!(feed.publish_analysis("b", steady_track(1, 1.0, 120.0, 4)));
        assert!(feed.analysis().is_some());
    }

    #[test]
    fn test_episode_has_no_analysis() {
        let now = Instant::now();
        let mut feed = PlaybackFeed::new();
        let mut episode = report("ep", 0, 1);
        episode.kind = ItemKind::Episode;
        let update = feed.accept(&episode, now);
        assert!(update.accepted);
        assert!(!update.track_changed);
        feed.publish_analysis("ep", steady_track(1, 1.0, 120.0, 4));
        assert!(feed.analysis().is_none());
        assert!(feed.has_snapshot());
    }

    #[test]
    fn test_artwork_follows_url() {
        let now = Instant::now();
        let mut feed = PlaybackFeed::new();
        let mut with_art = report("a", 0, 1);
        with_art.artwork_url = Some("one.png".to_string());
        assert!(feed.accept(&with_art, now).artwork_changed);
        assert!(!feed.publish_artwork("two.png", RgbImage::new(1, 1)));
        assert!(feed.publish_artwork("one.png", RgbImage::new(1, 1)));
        assert!(feed.artwork().is_some());

        with_art.service_timestamp_ms = 2;
        assert!(!feed.accept(&with_art, now).artwork_changed);
        assert!(feed.artwork().is_some());
    }
}
