//! Precomputed musical analysis of one track and interval lookups over it.
//!
//! All times are seconds from the start of the track. Every sequence is
//! sorted ascending by `start` and intervals do not overlap, so a lookup is a
//! binary search for the first interval whose end is at or past `t`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub trait Interval {
    fn start(&self) -> f64;
    fn duration(&self) -> f64;

    fn end(&self) -> f64 {
        self.start() + self.duration()
    }

    /// Inclusive on both ends.
    fn contains(&self, t: f64) -> bool {
        self.start() <= t && t <= self.end()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Section {
    pub start: f64,
    pub duration: f64,
    #[serde(rename = "tempo")]
    pub tempo_bpm: f32,
    pub time_signature: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct TimeInterval {
    pub start: f64,
    pub duration: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
    /// Confidence per pitch class, C first.
    pub pitches: [f32; 12],
    pub loudness_start: f32,
    pub loudness_max: f32,
}

impl Interval for Section {
    fn start(&self) -> f64 {
        self.start
    }
    fn duration(&self) -> f64 {
        self.duration
    }
}

impl Interval for TimeInterval {
    fn start(&self) -> f64 {
        self.start
    }
    fn duration(&self) -> f64 {
        self.duration
    }
}

impl Interval for Segment {
    fn start(&self) -> f64 {
        self.start
    }
    fn duration(&self) -> f64 {
        self.duration
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AudioAnalysis {
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub bars: Vec<TimeInterval>,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl AudioAnalysis {
    pub fn from_json(json: &str) -> Result<Self> {
        let analysis: AudioAnalysis =
            serde_json::from_str(json).context("Failed to parse audio analysis")?;
        Ok(analysis)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read audio analysis at {:?}", path))?;
        Self::from_json(&json)
    }

    pub fn section_at(&self, t: f64) -> Option<&Section> {
        covering(&self.sections, t)
    }

    pub fn bar_at(&self, t: f64) -> Option<&TimeInterval> {
        covering(&self.bars, t)
    }

    pub fn segment_at(&self, t: f64) -> Option<&Segment> {
        covering(&self.segments, t)
    }

    /// End of the last section, or zero for an empty analysis.
    pub fn duration(&self) -> f64 {
        self.sections.last().map(Interval::end).unwrap_or(0.0)
    }
}

fn covering<T: Interval>(items: &[T], t: f64) -> Option<&T> {
    let idx = items.partition_point(|item| item.end() < t);
    items.get(idx).filter(|item| item.contains(t))
}

/// Lookups that tolerate a track with no analysis at all.
pub fn section_at(analysis: Option<&AudioAnalysis>, t: f64) -> Option<&Section> {
    analysis.and_then(|a| a.section_at(t))
}

pub fn bar_at(analysis: Option<&AudioAnalysis>, t: f64) -> Option<&TimeInterval> {
    analysis.and_then(|a| a.bar_at(t))
}

pub fn segment_at(analysis: Option<&AudioAnalysis>, t: f64) -> Option<&Segment> {
    analysis.and_then(|a| a.segment_at(t))
}
