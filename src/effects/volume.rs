use super::{EffectSettings, TickContext};
use crate::analysis::AudioAnalysis;
use crate::device::FrameOutput;
use crate::geometry::DeviceGeometry;
use crate::model::Color;

/// A horizontal level meter: zones left of the loudness threshold are lit.
pub struct VolumeEffect {
    color: Color,
    floor_db: f32,
    order: Vec<usize>,
    frame: Vec<Color>,
}

impl VolumeEffect {
    pub fn new(settings: &EffectSettings, geometry: &DeviceGeometry) -> Self {
        Self {
            color: settings.volume_color,
            floor_db: settings.loudness_floor_db,
            order: geometry.zones_by_x(),
            frame: vec![Color::BLACK; geometry.zone_count()],
        }
    }

    /// X coordinate up to which zones are lit for a segment starting at
    /// `loudness_db`.
    pub fn threshold(&self, loudness_db: f32, width: f64) -> f64 {
        let range = -self.floor_db;
        if range <= 0.0 {
            return width;
        }
        ((loudness_db - self.floor_db) / range) as f64 * width
    }

    pub fn render(&mut self, ctx: &mut TickContext<'_>, analysis: &AudioAnalysis) -> FrameOutput {
        if !ctx.feed.is_playing() {
            return FrameOutput::Hold;
        }

        let t = ctx.feed.position(ctx.now);
        if let Some(segment) = analysis.segment_at(t) {
            let threshold = self.threshold(segment.loudness_start, ctx.geometry.bounding_box.x);
            let lit = self
                .order
                .iter()
                .position(|&zone| ctx.geometry.positions[zone].x > threshold)
                .unwrap_or(self.order.len());
            let (on, off) = self.order.split_at(lit);
            for &zone in on {
                self.frame[zone] = self.color;
            }
            for &zone in off {
                self.frame[zone] = Color::BLACK;
            }
        }

        FrameOutput::Zones(self.frame.clone())
    }
}
