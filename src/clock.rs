use std::time::Instant;

/// The last playback state reported by the playback service.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub track_id: String,
    pub progress_ms: u64,
    pub is_playing: bool,
    /// Local monotonic time at which the report was accepted.
    pub sampled_at: Instant,
}

/// Extrapolates the playback position between snapshots.
///
/// The service is polled at most about once a second, so between reports the
/// position is inferred from how long ago the last one arrived. Every newly
/// published snapshot is ground truth: seeks and re-syncs take effect at once.
#[derive(Clone, Debug, Default)]
pub struct PlaybackClock {
    snapshot: Option<PlaybackSnapshot>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, snapshot: PlaybackSnapshot) {
        self.snapshot = Some(snapshot);
    }

    pub fn snapshot(&self) -> Option<&PlaybackSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.snapshot.as_ref().map_or(false, |s| s.is_playing)
    }

    /// Position in milliseconds at `now`.
    pub fn estimate_ms(&self, now: Instant) -> u64 {
        match &self.snapshot {
            Some(s) if s.is_playing => {
                let elapsed = now.saturating_duration_since(s.sampled_at).as_millis() as u64;
                s.progress_ms + elapsed
            }
            Some(s) => s.progress_ms,
            None => 0,
        }
    }

    /// Position in seconds at `now`, for comparing against analysis intervals.
    pub fn estimate(&self, now: Instant) -> f64 {
        self.estimate_ms(now) as f64 / 1000.0
    }
}
