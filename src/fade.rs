use crate::model::Color;
use std::collections::HashMap;

/// How a fading zone's brightness is expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FadeStyle {
    /// Keep RGB, lower alpha. The device composites onto black.
    /// Emits the seeded color at full strength first, then counts down.
    Opacity,
    /// Scale RGB directly at full opacity. Counts down before emitting, so
    /// the k-th of `n` ticks shows `(n - k) / n` and the n-th is black.
    Channel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Fadeout {
    color: Color,
    frames_left: u32,
}

/// Per-zone linear decay of a color to black over a number of frames.
#[derive(Clone, Debug)]
pub struct FadeoutBuffer {
    style: FadeStyle,
    total_frames: u32,
    entries: HashMap<usize, Fadeout>,
}

impl FadeoutBuffer {
    pub fn new(style: FadeStyle, total_frames: u32) -> Self {
        Self {
            style,
            total_frames: total_frames.max(1),
            entries: HashMap::new(),
        }
    }

    /// New fade length; applies to entries already fading as well.
    pub fn set_total_frames(&mut self, total_frames: u32) {
        self.total_frames = total_frames.max(1);
    }

    pub fn seed(&mut self, zone: usize, color: Color) {
        self.entries.insert(zone, Fadeout { color, frames_left: self.total_frames });
    }

    /// Seed only if the zone is not already fading.
    pub fn seed_if_idle(&mut self, zone: usize, color: Color) {
        let frames_left = self.total_frames;
        self.entries.entry(zone).or_insert(Fadeout { color, frames_left });
    }

    pub fn is_fading(&self, zone: usize) -> bool {
        self.entries.contains_key(&zone)
    }

    /// Advance one zone by one frame and return what it shows now.
    pub fn tick(&mut self, zone: usize) -> Color {
        let total = self.total_frames as f32;
        let Some(fadeout) = self.entries.get_mut(&zone) else {
            return Color::BLACK;
        };

        match self.style {
            FadeStyle::Opacity => {
                if fadeout.frames_left == 0 {
                    self.entries.remove(&zone);
                    return Color::BLACK;
                }
                let scale = fadeout.frames_left as f32 / total;
                fadeout.frames_left -= 1;
                fadeout.color.with_alpha((0xFF as f32 * scale) as u8)
            }
            FadeStyle::Channel => {
                fadeout.frames_left = fadeout.frames_left.saturating_sub(1);
                if fadeout.frames_left == 0 {
                    self.entries.remove(&zone);
                    return Color::BLACK;
                }
                let scale = fadeout.frames_left as f32 / total;
                fadeout.color.scaled(scale)
            }
        }
    }

    /// Tick every zone of a frame.
    pub fn tick_all(&mut self, frame: &mut [Color]) {
        for (zone, color) in frame.iter_mut().enumerate() {
            *color = self.tick(zone);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORANGE: Color = Color::rgb(200, 100, 50);

    #[test]
    fn test_unseeded_zone_is_black() {
        let mut buf = FadeoutBuffer::new(FadeStyle::Channel, 4);
        assert_eq!(buf.tick(3), Color::BLACK);
        let mut buf = FadeoutBuffer::new(FadeStyle::Opacity, 4);
        assert_eq!(buf.tick(3), Color::BLACK);
    }

    #[test]
    fn test_channel_fade_k_th_tick_scale() {
        let n = 5;
        let mut buf = FadeoutBuffer::new(FadeStyle::Channel, n);
        buf.seed(0, ORANGE);
        for k in 1..n {
            let scale = (n - k) as f32 / n as f32;
            assert_eq!(buf.tick(0), ORANGE.scaled(scale), "tick {}", k);
            assert!(buf.is_fading(0));
        }
        assert_eq!(buf.tick(0), Color::BLACK);
        assert!(!buf.is_fading(0));
        assert_eq!(buf.tick(0), Color::BLACK);
    }

    #[test]
    fn test_channel_fade_truncates_bytes() {
        let mut buf = FadeoutBuffer::new(FadeStyle::Channel, 3);
        buf.seed(0, Color::rgb(255, 1, 2));
        // 2/3 of 255 = 170.0, of 1 = 0.67, of 2 = 1.33
        assert_eq!(buf.tick(0), Color::rgb(170, 0, 1));
    }

    #[test]
    fn test_opacity_fade_starts_full_and_lags_one_frame() {
        let n = 4;
        let mut buf = FadeoutBuffer::new(FadeStyle::Opacity, n);
        buf.seed(1, ORANGE);
        assert_eq!(buf.tick(1), ORANGE.with_alpha(255));
        assert_eq!(buf.tick(1), ORANGE.with_alpha(191)); // 255 * 0.75
        assert_eq!(buf.tick(1), ORANGE.with_alpha(127)); // 255 * 0.5
        assert_eq!(buf.tick(1), ORANGE.with_alpha(63)); // 255 * 0.25
        assert!(buf.is_fading(1));
        assert_eq!(buf.tick(1), Color::BLACK);
        assert!(!buf.is_fading(1));
    }

    #[test]
    fn test_seed_overwrites_but_seed_if_idle_does_not() {
        let mut buf = FadeoutBuffer::new(FadeStyle::Opacity, 10);
        buf.seed(0, ORANGE);
        buf.tick(0);
        buf.seed_if_idle(0, Color::BLUE);
        assert_eq!(buf.tick(0).with_alpha(255), ORANGE);
        buf.seed(0, Color::BLUE);
        assert_eq!(buf.tick(0), Color::BLUE.with_alpha(255));
    }

    #[test]
    fn test_tick_all_writes_every_zone() {
        let mut buf = FadeoutBuffer::new(FadeStyle::Channel, 2);
        buf.seed(1, Color::WHITE);
        let mut frame = vec![Color::BLUE; 3];
        buf.tick_all(&mut frame);
        assert_eq!(frame, vec![Color::BLACK, Color::WHITE.scaled(0.5), Color::BLACK]);
    }
}
