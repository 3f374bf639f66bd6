//! Follows the extrapolated playback position through a track's sections,
//! bars and beats, and reports the boundary crossings effects react to.

use crate::analysis::{AudioAnalysis, Interval, Section, TimeInterval};
use crate::model::Color;
use log::debug;
use rand::RngCore;

pub const DEFAULT_METER: u32 = 4;
pub const DEFAULT_FADEOUT_FRAMES: u32 = 10;

/// What changed on one tick, and where in the beat we are.
#[derive(Clone, Debug, PartialEq)]
pub struct BeatTick {
    pub meter: u32,
    pub meter_changed: bool,
    pub tempo_changed: bool,
    pub new_bar: bool,
    pub beat_index: usize,
    pub beat_changed: bool,
    pub beat_start: f64,
    pub beat_duration: f64,
    /// Fraction of the current beat already elapsed.
    pub beat_progress: f64,
    /// Color re-rolled on every new bar and every new beat.
    pub color: Color,
    pub fadeout_frames: u32,
}

#[derive(Clone, Debug)]
pub struct BeatTracker {
    frame_rate_hz: f64,
    fade_beats: u32,
    meter: u32,
    tempo_bpm: f32,
    fadeout_frames: u32,
    bar_count: u64,
    section: Option<Section>,
    bar: Option<TimeInterval>,
    beat_index: usize,
    color: Color,
    session_dirty: bool,
}

impl BeatTracker {
    /// `fade_beats` multiplies the one-beat fade length; two makes fades span
    /// two beats.
    pub fn new(frame_rate_hz: f64, fade_beats: u32, initial_color: Color) -> Self {
        Self {
            frame_rate_hz,
            fade_beats: fade_beats.max(1),
            meter: DEFAULT_METER,
            tempo_bpm: 0.0,
            fadeout_frames: DEFAULT_FADEOUT_FRAMES,
            bar_count: 0,
            section: None,
            bar: None,
            beat_index: 0,
            color: initial_color,
            session_dirty: true,
        }
    }

    pub fn fadeout_frames(&self) -> u32 {
        self.fadeout_frames
    }

    pub fn bar_count(&self) -> u64 {
        self.bar_count
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// The track or playback identity changed; forget bar continuity.
    pub fn mark_session_dirty(&mut self) {
        self.session_dirty = true;
    }

    /// Frames per beat at `tempo_bpm`, times `fade_beats`, plus one so a fade
    /// is never zero frames long.
    pub fn fadeout_frame_count(&self, tempo_bpm: f32) -> u32 {
        if tempo_bpm <= 0.0 {
            return DEFAULT_FADEOUT_FRAMES;
        }
        let frames_per_beat = ((60.0 * self.frame_rate_hz) / tempo_bpm as f64).floor() as u32;
        frames_per_beat * self.fade_beats + 1
    }

    /// Advance to position `t` (seconds). `None` means no section or bar covers
    /// `t` and nothing should be drawn this tick.
    pub fn advance(
        &mut self,
        t: f64,
        analysis: &AudioAnalysis,
        rng: &mut dyn RngCore,
    ) -> Option<BeatTick> {
        if self.session_dirty {
            self.session_dirty = false;
            self.bar = None;
            self.bar_count = 0;
        }

        let mut meter_changed = false;
        let mut tempo_changed = false;
        if !self.section.as_ref().map_or(false, |s| s.contains(t)) {
            self.section = analysis.section_at(t).cloned();
            let section = self.section.as_ref()?;

            if section.time_signature != self.meter {
                debug!(
                    "[ENGINE] Meter {} -> {} at {:.2}s",
                    self.meter, section.time_signature, t
                );
                self.meter = section.time_signature;
                meter_changed = true;
            }

            if section.tempo_bpm != self.tempo_bpm {
                self.tempo_bpm = section.tempo_bpm;
                self.fadeout_frames = self.fadeout_frame_count(self.tempo_bpm);
                tempo_changed = true;
            }
        }

        let mut new_bar = false;
        if !self.bar.as_ref().map_or(false, |b| b.contains(t)) {
            self.bar = analysis.bar_at(t).copied();
            if self.bar.is_some() {
                self.color = Color::random(rng);
                self.bar_count += 1;
                new_bar = true;
            }
        }

        let bar = self.bar?;
        if self.meter == 0 {
            return None;
        }

        let beat_duration = bar.duration / self.meter as f64;
        let mut beat_changed = false;
        if let Some(i) =
            (0..self.meter as usize).find(|&i| bar.start + (i + 1) as f64 * beat_duration >= t)
        {
            if i != self.beat_index {
                self.beat_index = i;
                beat_changed = true;
                self.color = Color::random(rng);
            }
        }

        let beat_start = bar.start + self.beat_index as f64 * beat_duration;
        let beat_progress = if beat_duration > 0.0 {
            (t - beat_start) / beat_duration
        } else {
            0.0
        };

        Some(BeatTick {
            meter: self.meter,
            meter_changed,
            tempo_changed,
            new_bar,
            beat_index: self.beat_index,
            beat_changed,
            beat_start,
            beat_duration,
            beat_progress,
            color: self.color,
            fadeout_frames: self.fadeout_frames,
        })
    }
}
