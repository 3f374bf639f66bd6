//! The playback-service seam: who is playing what, and the analysis for it.

use crate::analysis::AudioAnalysis;
use anyhow::Result;
use image::RgbImage;
use std::future::Future;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemKind {
    Track,
    Episode,
    Other,
}

/// One currently-playing report from the service.
#[derive(Clone, Debug, PartialEq)]
pub struct NowPlaying {
    pub track_id: String,
    pub kind: ItemKind,
    pub progress_ms: u64,
    pub is_playing: bool,
    /// Service-side report time; older or equal reports are stale.
    pub service_timestamp_ms: u64,
    pub artwork_url: Option<String>,
}

impl NowPlaying {
    /// Only tracks carry a musical analysis.
    pub fn has_analysis(&self) -> bool {
        self.kind == ItemKind::Track
    }
}

/// An already-authenticated connection to the playback service.
///
/// Calls may suspend on network I/O. They run on the refresh worker, never
/// on a frame thread and never while an effect's state is locked.
pub trait PlaybackService: Send + Sync + 'static {
    fn currently_playing(&self) -> impl Future<Output = Result<Option<NowPlaying>>> + Send;

    fn audio_analysis(
        &self,
        track_id: &str,
    ) -> impl Future<Output = Result<Option<AudioAnalysis>>> + Send;

    /// Decoded cover art for `url`, if the service provides it.
    fn artwork(&self, _url: &str) -> impl Future<Output = Result<Option<RgbImage>>> + Send {
        async { Ok(None) }
    }
}

/// Plays back a stored analysis as if the track started when the service was
/// created, looping at the end.
pub struct ReplayService {
    track_id: String,
    analysis: Arc<AudioAnalysis>,
    started_at: Instant,
    artwork: Option<(String, RgbImage)>,
}

impl ReplayService {
    pub fn new(track_id: impl Into<String>, analysis: AudioAnalysis) -> Self {
        Self {
            track_id: track_id.into(),
            analysis: Arc::new(analysis),
            started_at: Instant::now(),
            artwork: None,
        }
    }

    pub fn with_artwork(mut self, url: impl Into<String>, image: RgbImage) -> Self {
        self.artwork = Some((url.into(), image));
        self
    }

    fn progress_ms(&self) -> u64 {
        let elapsed = self.started_at.elapsed().as_millis() as u64;
        let duration_ms = (self.analysis.duration() * 1000.0) as u64;
        if duration_ms == 0 {
            elapsed
        } else {
            elapsed % duration_ms
        }
    }
}

impl PlaybackService for ReplayService {
    async fn currently_playing(&self) -> Result<Option<NowPlaying>> {
        let service_timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Ok(Some(NowPlaying {
            track_id: self.track_id.clone(),
            kind: ItemKind::Track,
            progress_ms: self.progress_ms(),
            is_playing: true,
            service_timestamp_ms,
            artwork_url: self.artwork.as_ref().map(|(url, _)| url.clone()),
        }))
    }

    async fn audio_analysis(&self, track_id: &str) -> Result<Option<AudioAnalysis>> {
        if track_id == self.track_id {
            Ok(Some(self.analysis.as_ref().clone()))
        } else {
            Ok(None)
        }
    }

    async fn artwork(&self, url: &str) -> Result<Option<RgbImage>> {
        Ok(self
            .artwork
            .as_ref()
            .filter(|(u, _)| u == url)
            .map(|(_, image)| image.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::steady_track;

    #[test]
    fn test_replay_reports_its_track() {
        let service = ReplayService::new("abc", steady_track(4, 2.0, 120.0, 4));
        let now_playing = pollster::block_on(service.currently_playing()).unwrap().unwrap();
        assert_eq!(now_playing.track_id, "abc");
        assert!(now_playing.is_playing);
        assert!(now_playing.has_analysis());
        assert!(now_playing.progress_ms < 8_000);

        let analysis = pollster::block_on(service.audio_analysis("abc")).unwrap();
        assert_eq!(analysis.map(|a| a.bars.len()), Some(4));
        assert!(pollster::block_on(service.audio_analysis("other")).unwrap().is_none());
    }

    #[test]
    fn test_replay_artwork_matches_url() {
        let image = RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let service = ReplayService::new("abc", steady_track(1, 2.0, 120.0, 4))
            .with_artwork("cover.png", image);
        assert!(pollster::block_on(service.artwork("cover.png")).unwrap().is_some());
        assert!(pollster::block_on(service.artwork("other.png")).unwrap().is_none());
    }
}
