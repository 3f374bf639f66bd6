//! Beat-driven effects: Pinwheel, Ripple and Flash.

use super::{EffectSettings, TickContext};
use crate::analysis::AudioAnalysis;
use crate::device::FrameOutput;
use crate::fade::{FadeStyle, FadeoutBuffer};
use crate::geometry::{BeatPartition, DeviceGeometry};
use crate::model::Color;
use crate::tracker::{BeatTracker, DEFAULT_FADEOUT_FRAMES, DEFAULT_METER};
use log::{debug, trace};
use rand::RngCore;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempoStyle {
    /// Light the angular sector of the current beat, sweeping round the bar.
    Pinwheel,
    /// Grow a disc from the center over each beat.
    Ripple,
    /// Flash the whole array on every beat.
    Flash,
}

impl TempoStyle {
    /// Pinwheel fades span two beats so neighbouring sectors overlap.
    pub fn fade_beats(self) -> u32 {
        match self {
            TempoStyle::Pinwheel => 2,
            TempoStyle::Ripple | TempoStyle::Flash => 1,
        }
    }
}

pub struct TempoEffect {
    style: TempoStyle,
    tracker: BeatTracker,
    fade: FadeoutBuffer,
    partition: BeatPartition,
    group_colors: Vec<Color>,
    radial: Vec<f64>,
    frame: Vec<Color>,
    seen_session: u64,
}

impl TempoEffect {
    pub fn new(
        style: TempoStyle,
        settings: &EffectSettings,
        geometry: &DeviceGeometry,
        rng: &mut dyn RngCore,
    ) -> Self {
        let tracker = BeatTracker::new(settings.fade_rate_hz, style.fade_beats(), Color::random(rng));
        let radial = match style {
            TempoStyle::Ripple => geometry.radial_distances(),
            _ => Vec::new(),
        };

        let mut effect = Self {
            style,
            tracker,
            fade: FadeoutBuffer::new(FadeStyle::Opacity, DEFAULT_FADEOUT_FRAMES),
            partition: BeatPartition::default(),
            group_colors: Vec::new(),
            radial,
            frame: vec![Color::BLACK; geometry.zone_count()],
            seen_session: 0,
        };
        if style == TempoStyle::Pinwheel {
            effect.reset_partitions(DEFAULT_METER, geometry, rng);
        }
        effect
    }

    pub fn partition(&self) -> &BeatPartition {
        &self.partition
    }

    pub fn tracker(&self) -> &BeatTracker {
        &self.tracker
    }

    fn reset_partitions(&mut self, meter: u32, geometry: &DeviceGeometry, rng: &mut dyn RngCore) {
        self.partition = geometry.angular_partition(meter);
        self.group_colors = (0..meter).map(|_| Color::random(rng)).collect();
        debug!(
            "[ENGINE] Repartitioned {} zones into {} groups for meter {}",
            geometry.zone_count(),
            self.partition.groups.len(),
            meter
        );
    }

    pub fn render(&mut self, ctx: &mut TickContext<'_>, analysis: &AudioAnalysis) -> FrameOutput {
        if ctx.feed.session() != self.seen_session {
            self.seen_session = ctx.feed.session();
            self.tracker.mark_session_dirty();
        }

        let t = ctx.feed.position(ctx.now);
        let Some(tick) = self.tracker.advance(t, analysis, &mut *ctx.rng) else {
            trace!("[ENGINE] Nothing to draw at {:.3}s", t);
            return FrameOutput::Hold;
        };

        if tick.meter_changed && self.style == TempoStyle::Pinwheel {
            self.reset_partitions(tick.meter, ctx.geometry, &mut *ctx.rng);
        }
        if tick.tempo_changed {
            self.fade.set_total_frames(tick.fadeout_frames);
        }

        match self.style {
            TempoStyle::Pinwheel => {
                if tick.beat_changed {
                    if let Some(color) = self.group_colors.get_mut(tick.beat_index) {
                        *color = Color::random(&mut *ctx.rng);
                    }
                }
                let color = self.group_colors.get(tick.beat_index).copied();
                if let (Some(zones), Some(color)) = (self.partition.group(tick.beat_index), color) {
                    for &zone in zones {
                        self.fade.seed_if_idle(zone, color);
                    }
                }
            }
            TempoStyle::Ripple => {
                for (zone, distance) in self.radial.iter().enumerate() {
                    if *distance < tick.beat_progress {
                        self.frame[zone] = tick.color;
                    }
                }
            }
            TempoStyle::Flash => {
                if tick.beat_changed {
                    for zone in 0..self.frame.len() {
                        self.fade.seed(zone, tick.color);
                    }
                }
            }
        }

        if self.style != TempoStyle::Ripple && self.frame.len() >= tick.meter as usize {
            self.fade.tick_all(&mut self.frame);
        }

        FrameOutput::Zones(self.frame.clone())
    }
}
