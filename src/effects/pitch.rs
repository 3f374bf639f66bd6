use super::{EffectSettings, TickContext};
use crate::analysis::AudioAnalysis;
use crate::device::FrameOutput;
use crate::fade::{FadeStyle, FadeoutBuffer};
use crate::geometry::DeviceGeometry;
use crate::keys::PitchClass;
use crate::model::Color;
use log::trace;

/// Lights the keys bound to every confidently heard pitch class in its
/// palette color, then lets them fade.
pub struct PitchEffect {
    threshold: f32,
    fade: FadeoutBuffer,
    frame: Vec<Color>,
}

impl PitchEffect {
    pub fn new(settings: &EffectSettings, geometry: &DeviceGeometry) -> Self {
        Self {
            threshold: settings.pitch_threshold,
            fade: FadeoutBuffer::new(FadeStyle::Channel, settings.pitch_fade_frames),
            frame: vec![Color::BLACK; geometry.zone_count()],
        }
    }

    pub fn render(&mut self, ctx: &mut TickContext<'_>, analysis: &AudioAnalysis) -> FrameOutput {
        let t = ctx.feed.position(ctx.now);
        let Some(segment) = analysis.segment_at(t) else {
            trace!("[ENGINE] No segment at {:.3}s", t);
            return FrameOutput::Hold;
        };

        // Without key bindings the frame stays black.
        if ctx.geometry.key_bindings.is_some() {
            for pitch in PitchClass::ALL {
                if segment.pitches[pitch.index()] <= self.threshold {
                    continue;
                }
                if let Some(zones) = ctx.geometry.zones_for_pitch(pitch) {
                    for &zone in zones {
                        self.fade.seed(zone, pitch.color());
                    }
                }
            }
            self.fade.tick_all(&mut self.frame);
        }

        FrameOutput::Zones(self.frame.clone())
    }
}
