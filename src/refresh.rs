//! Now-playing refresh: when to ask the playback service, and the worker
//! thread that asks it.

use crate::host::EffectInstance;
use crate::service::PlaybackService;
use log::{debug, info, warn};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One minimum interval between now-playing requests, shared by every
/// device. The instances on it are kept so one answer can reach them all.
#[derive(Debug)]
pub struct RefreshThrottle {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
    listeners: Mutex<Vec<Weak<EffectInstance>>>,
}

impl RefreshThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// True at most once per interval; the interval must be strictly exceeded.
    pub fn try_acquire(&self, now: Instant) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        match *last {
            Some(prev) if now.saturating_duration_since(prev) <= self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    pub fn subscribe(&self, instance: &Arc<EffectInstance>) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(Arc::downgrade(instance));
    }

    /// The instances still alive on this throttle.
    pub fn listeners(&self) -> Vec<Weak<EffectInstance>> {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.clone()
    }
}

/// Per-instance decision whether this frame should request a refresh.
#[derive(Debug)]
pub enum RefreshGate {
    /// Request when the countdown hits zero, then wait `frames` more frames.
    Countdown { frames: u32, remaining: u32 },
    Throttle(Arc<RefreshThrottle>),
}

impl RefreshGate {
    pub fn countdown(frames: u32) -> Self {
        RefreshGate::Countdown { frames, remaining: 0 }
    }

    pub fn should_refresh(&mut self, now: Instant) -> bool {
        match self {
            RefreshGate::Countdown { frames, remaining } => {
                if *remaining == 0 {
                    *remaining = *frames;
                    true
                } else {
                    *remaining -= 1;
                    false
                }
            }
            RefreshGate::Throttle(throttle) => throttle.try_acquire(now),
        }
    }
}

pub struct RefreshJob {
    /// The instance that asked; its in-flight mark is cleared when the job ends.
    pub origin: Weak<EffectInstance>,
    /// Every instance the answer is published to, `origin` included.
    pub targets: Vec<Weak<EffectInstance>>,
}

impl RefreshJob {
    pub fn single(instance: &Arc<EffectInstance>) -> Self {
        let origin = Arc::downgrade(instance);
        Self { targets: vec![origin.clone()], origin }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A report (and maybe analysis or artwork) reached at least one instance.
    Published,
    /// The service answered but every target was gone.
    Discarded,
    /// Nothing is playing.
    Idle,
    Failed,
}

/// Talks to the playback service off the frame threads.
pub struct RefreshWorker {
    tx: Sender<RefreshJob>,
    handle: JoinHandle<()>,
}

impl RefreshWorker {
    pub fn spawn<S: PlaybackService>(service: Arc<S>) -> Self {
        let (tx, rx) = mpsc::channel::<RefreshJob>();

        let handle = thread::spawn(move || {
            info!("[REFRESH] Worker started");
            while let Ok(job) = rx.recv() {
                let outcome = run_job(service.as_ref(), &job);
                debug!("[REFRESH] Job for {} target(s) finished: {:?}", job.targets.len(), outcome);
            }
            info!("[REFRESH] Worker stopped");
        });

        Self { tx, handle }
    }

    pub fn sender(&self) -> Sender<RefreshJob> {
        self.tx.clone()
    }

    /// Close the queue and wait for the job in progress.
    pub fn shutdown(self) {
        drop(self.tx);
        if self.handle.join().is_err() {
            warn!("[REFRESH] Worker panicked");
        }
    }
}

/// Run one refresh. Network calls happen without holding any instance;
/// targets are upgraded only to publish, and the origin's in-flight mark is
/// always cleared.
pub fn run_job<S: PlaybackService>(service: &S, job: &RefreshJob) -> RefreshOutcome {
    let outcome = refresh(service, job);
    if let Some(instance) = job.origin.upgrade() {
        instance.end_refresh();
    }
    outcome
}

/// Targets waiting on the same fetch, keyed by track id or artwork URL.
type Wanted<'a> = Vec<(String, Vec<&'a Weak<EffectInstance>>)>;

fn want<'a>(wanted: &mut Wanted<'a>, key: String, target: &'a Weak<EffectInstance>) {
    match wanted.iter_mut().find(|(k, _)| *k == key) {
        Some((_, targets)) => targets.push(target),
        None => wanted.push((key, vec![target])),
    }
}

fn refresh<S: PlaybackService>(service: &S, job: &RefreshJob) -> RefreshOutcome {
    let now_playing = match pollster::block_on(service.currently_playing()) {
        Ok(Some(now_playing)) => now_playing,
        Ok(None) => return RefreshOutcome::Idle,
        Err(e) => {
            warn!("[REFRESH] Now-playing request failed: {:#}", e);
            return RefreshOutcome::Failed;
        }
    };
    let received_at = Instant::now();

    let mut delivered = 0;
    let mut analysis_wanted = Wanted::new();
    let mut artwork_wanted = Wanted::new();
    for target in &job.targets {
        let Some(instance) = target.upgrade() else {
            continue;
        };
        delivered += 1;
        let update = instance.publish_now_playing(&now_playing, received_at);
        if update.track_changed {
            info!("[REFRESH] {} now playing {}", instance.name(), now_playing.track_id);
        }
        if let Some(track_id) = instance.missing_analysis() {
            want(&mut analysis_wanted, track_id, target);
        }
        if instance.mode().is_artwork() {
            if let Some(url) = instance.missing_artwork() {
                want(&mut artwork_wanted, url, target);
            }
        }
    }
    if delivered == 0 {
        return RefreshOutcome::Discarded;
    }

    for (track_id, targets) in analysis_wanted {
        match pollster::block_on(service.audio_analysis(&track_id)) {
            Ok(Some(analysis)) => {
                let analysis = Arc::new(analysis);
                for instance in targets.iter().filter_map(|t| t.upgrade()) {
                    if instance.publish_analysis(&track_id, analysis.clone()) {
                        info!("[REFRESH] Loaded analysis for {} on {}", track_id, instance.name());
                    }
                }
            }
            Ok(None) => debug!("[REFRESH] No analysis for {}", track_id),
            Err(e) => warn!("[REFRESH] Analysis request for {} failed: {:#}", track_id, e),
        }
    }

    for (url, targets) in artwork_wanted {
        match pollster::block_on(service.artwork(&url)) {
            Ok(Some(image)) => {
                let image = Arc::new(image);
                for instance in targets.iter().filter_map(|t| t.upgrade()) {
                    instance.publish_artwork(&url, image.clone());
                }
            }
            Ok(None) => debug!("[REFRESH] No artwork at {}", url),
            Err(e) => warn!("[REFRESH] Artwork request for {} failed: {:#}", url, e),
        }
    }

    RefreshOutcome::Published
}
