//! Lighting modes and the per-frame render step of each.

pub mod artwork;
pub mod pitch;
pub mod tempo;
pub mod volume;

use crate::config::EngineConfig;
use crate::device::FrameOutput;
use crate::feed::PlaybackFeed;
use crate::geometry::DeviceGeometry;
use crate::model::Color;
use rand::RngCore;
use std::fmt;
use std::time::{Duration, Instant};

pub use artwork::ArtworkEffect;
pub use pitch::PitchEffect;
pub use tempo::{TempoEffect, TempoStyle};
pub use volume::VolumeEffect;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum LightingMode {
    AlbumArtwork,
    PitchVisualizer,
    VolumeVisualizer,
    Pinwheel,
    Ripple,
    Flash,
}

impl LightingMode {
    pub const ALL: [LightingMode; 6] = [
        LightingMode::AlbumArtwork,
        LightingMode::PitchVisualizer,
        LightingMode::VolumeVisualizer,
        LightingMode::Pinwheel,
        LightingMode::Ripple,
        LightingMode::Flash,
    ];

    pub fn is_artwork(self) -> bool {
        self == LightingMode::AlbumArtwork
    }

    pub fn frame_interval(self, config: &EngineConfig) -> Duration {
        if self.is_artwork() {
            Duration::from_millis(config.artwork_interval_ms)
        } else {
            Duration::from_millis(config.frame_interval_ms)
        }
    }

    /// Frames between now-playing requests under the countdown policy.
    pub fn refresh_countdown(self, config: &EngineConfig) -> u32 {
        if self.is_artwork() {
            config.refresh.artwork_countdown_frames
        } else {
            config.refresh.countdown_frames
        }
    }
}

impl fmt::Display for LightingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LightingMode::AlbumArtwork => "Album Artwork",
            LightingMode::PitchVisualizer => "Pitch Visualizer",
            LightingMode::VolumeVisualizer => "Volume Visualizer",
            LightingMode::Pinwheel => "Pinwheel",
            LightingMode::Ripple => "Ripple",
            LightingMode::Flash => "Flash",
        };
        f.write_str(name)
    }
}

/// The engine settings effects read while rendering.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSettings {
    /// Frame rate beat fades are sized for.
    pub fade_rate_hz: f64,
    pub idle_color: Color,
    pub volume_color: Color,
    pub pitch_threshold: f32,
    pub pitch_fade_frames: u32,
    pub loudness_floor_db: f32,
}

impl EffectSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            fade_rate_hz: config.fade_rate_hz,
            idle_color: config.idle_color,
            volume_color: config.volume_color,
            pitch_threshold: config.pitch_threshold,
            pitch_fade_frames: config.pitch_fade_frames,
            loudness_floor_db: config.loudness_floor_db,
        }
    }
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Everything one render call may look at.
pub struct TickContext<'a> {
    pub now: Instant,
    pub feed: &'a PlaybackFeed,
    pub geometry: &'a DeviceGeometry,
    pub rng: &'a mut dyn RngCore,
}

pub enum Effect {
    Tempo(TempoEffect),
    Pitch(PitchEffect),
    Volume(VolumeEffect),
    Artwork(ArtworkEffect),
}

impl Effect {
    pub fn new(
        mode: LightingMode,
        settings: &EffectSettings,
        geometry: &DeviceGeometry,
        rng: &mut dyn RngCore,
    ) -> Self {
        match mode {
            LightingMode::AlbumArtwork => Effect::Artwork(ArtworkEffect::new(settings)),
            LightingMode::PitchVisualizer => Effect::Pitch(PitchEffect::new(settings, geometry)),
            LightingMode::VolumeVisualizer => Effect::Volume(VolumeEffect::new(settings, geometry)),
            LightingMode::Pinwheel => {
                Effect::Tempo(TempoEffect::new(TempoStyle::Pinwheel, settings, geometry, rng))
            }
            LightingMode::Ripple => {
                Effect::Tempo(TempoEffect::new(TempoStyle::Ripple, settings, geometry, rng))
            }
            LightingMode::Flash => {
                Effect::Tempo(TempoEffect::new(TempoStyle::Flash, settings, geometry, rng))
            }
        }
    }

    /// Produce this tick's frame. Musical effects show the idle color and do
    /// not advance while there is no snapshot or no analysis.
    pub fn render(&mut self, ctx: &mut TickContext<'_>, idle_color: Color) -> FrameOutput {
        if let Effect::Artwork(effect) = self {
            return effect.render(ctx);
        }

        let feed = ctx.feed;
        let Some(analysis) = feed.analysis().filter(|_| feed.has_snapshot()) else {
            return FrameOutput::Uniform(idle_color);
        };

        match self {
            Effect::Tempo(effect) => effect.render(ctx, analysis),
            Effect::Pitch(effect) => effect.render(ctx, analysis),
            Effect::Volume(effect) => effect.render(ctx, analysis),
            Effect::Artwork(effect) => effect.render(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::tests::steady_track;
    use crate::feed::tests::playing_feed;
    use crate::geometry::tests::grid;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_mode_timing() {
        let config = EngineConfig::default();
        assert_eq!(LightingMode::Pinwheel.frame_interval(&config), Duration::from_millis(33));
        assert_eq!(LightingMode::AlbumArtwork.frame_interval(&config), Duration::from_millis(500));
        assert_eq!(LightingMode::Flash.refresh_countdown(&config), 60);
        assert_eq!(LightingMode::AlbumArtwork.refresh_countdown(&config), 40);
    }

    #[test]
    fn test_musical_modes_idle_without_analysis() {
        let geometry = grid(3, 3);
        let settings = EffectSettings::default();
        let mut rng = StdRng::seed_from_u64(1);
        let feed = PlaybackFeed::new();
        for mode in LightingMode::ALL.into_iter().filter(|m| !m.is_artwork()) {
            let mut effect = Effect::new(mode, &settings, &geometry, &mut rng);
            let mut ctx = TickContext { now: Instant::now(), feed: &feed, geometry: &geometry, rng: &mut rng };
            assert_eq!(
                effect.render(&mut ctx, settings.idle_color),
                FrameOutput::Uniform(Color::IDLE_GREEN),
                "{}",
                mode
            );
        }
    }

    #[test]
    fn test_musical_modes_draw_with_analysis() {
        let geometry = grid(4, 4);
        let settings = EffectSettings::default();
        let mut rng = StdRng::seed_from_u64(2);
        let now = Instant::now();
        let feed = playing_feed(steady_track(4, 2.0, 120.0, 4), 100, now);
        for mode in [LightingMode::Pinwheel, LightingMode::Flash, LightingMode::VolumeVisualizer] {
            let mut effect = Effect::new(mode, &settings, &geometry, &mut rng);
            let mut ctx = TickContext { now, feed: &feed, geometry: &geometry, rng: &mut rng };
            assert!(matches!(effect.render(&mut ctx, settings.idle_color), FrameOutput::Zones(_)), "{}", mode);
        }
    }
}
