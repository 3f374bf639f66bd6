//! Runs one effect instance per connected device on its own frame thread.

use crate::analysis::AudioAnalysis;
use crate::config::{EngineConfig, RefreshPolicy};
use crate::device::LampArray;
use crate::effects::{Effect, EffectSettings, LightingMode, TickContext};
use crate::feed::{FeedUpdate, PlaybackFeed};
use crate::geometry::DeviceGeometry;
use crate::model::Color;
use crate::refresh::{RefreshGate, RefreshJob, RefreshThrottle, RefreshWorker};
use crate::service::{NowPlaying, PlaybackService};
use image::RgbImage;
use log::{debug, error, info, trace, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Barrier, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct EffectState {
    feed: PlaybackFeed,
    effect: Effect,
    geometry: DeviceGeometry,
    gate: RefreshGate,
    rng: StdRng,
    idle_color: Color,
}

/// One device's effect: everything behind a single lock, plus the mark that
/// a refresh for it is already queued.
pub struct EffectInstance {
    name: String,
    mode: LightingMode,
    zone_indices: Vec<usize>,
    state: Mutex<EffectState>,
    refresh_in_flight: AtomicBool,
}

impl EffectInstance {
    pub fn new(
        name: impl Into<String>,
        mode: LightingMode,
        geometry: DeviceGeometry,
        config: &EngineConfig,
        gate: RefreshGate,
    ) -> Self {
        let mut rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let settings = EffectSettings::from_config(config);
        let effect = Effect::new(mode, &settings, &geometry, &mut rng);

        Self {
            name: name.into(),
            mode,
            zone_indices: (0..geometry.zone_count()).collect(),
            state: Mutex::new(EffectState {
                feed: PlaybackFeed::new(),
                effect,
                geometry,
                gate,
                rng,
                idle_color: settings.idle_color,
            }),
            refresh_in_flight: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> LightingMode {
        self.mode
    }

    fn lock(&self) -> MutexGuard<'_, EffectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render one frame at `now` and write it to `device` under the lock.
    /// Returns whether this frame asks for a now-playing refresh.
    pub fn tick(&self, now: Instant, device: &mut dyn LampArray) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;

        let want_refresh = state.gate.should_refresh(now);
        let mut ctx = TickContext {
            now,
            feed: &state.feed,
            geometry: &state.geometry,
            rng: &mut state.rng,
        };
        let output = state.effect.render(&mut ctx, state.idle_color);
        trace!("[ENGINE] {} frame: {:?}", self.name, output);
        output.apply(device, &self.zone_indices);

        want_refresh
    }

    pub fn publish_now_playing(&self, now_playing: &NowPlaying, now: Instant) -> FeedUpdate {
        self.lock().feed.accept(now_playing, now)
    }

    pub fn publish_analysis(&self, track_id: &str, analysis: impl Into<Arc<AudioAnalysis>>) -> bool {
        self.lock().feed.publish_analysis(track_id, analysis)
    }

    pub fn publish_artwork(&self, url: &str, artwork: impl Into<Arc<RgbImage>>) -> bool {
        self.lock().feed.publish_artwork(url, artwork)
    }

    pub fn track_id(&self) -> Option<String> {
        self.lock().feed.track_id().map(str::to_string)
    }

    /// The current track if it is musical and its analysis has not arrived.
    pub fn missing_analysis(&self) -> Option<String> {
        let state = self.lock();
        match (state.feed.track_id(), state.feed.analysis()) {
            (Some(id), None) if state.feed.is_track() => Some(id.to_string()),
            _ => None,
        }
    }

    pub fn missing_artwork(&self) -> Option<String> {
        let state = self.lock();
        match (state.feed.artwork_url(), state.feed.artwork()) {
            (Some(url), None) => Some(url.to_string()),
            _ => None,
        }
    }

    /// A refresh on behalf of this instance. Under a shared throttle every
    /// instance subscribed to it receives the result.
    pub fn refresh_job(self: &Arc<Self>) -> RefreshJob {
        let mut targets = match &self.lock().gate {
            RefreshGate::Throttle(throttle) => throttle.listeners(),
            RefreshGate::Countdown { .. } => return RefreshJob::single(self),
        };
        let origin = Arc::downgrade(self);
        if !targets.iter().any(|t| t.ptr_eq(&origin)) {
            targets.push(origin.clone());
        }
        RefreshJob { origin, targets }
    }

    /// Claim the single in-flight refresh slot.
    pub fn try_begin_refresh(&self) -> bool {
        self.refresh_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_refresh(&self) {
        self.refresh_in_flight.store(false, Ordering::Release);
    }
}

struct DeviceRunner {
    instance: Arc<EffectInstance>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn LampArray>>,
}

impl DeviceRunner {
    fn start(
        instance: Arc<EffectInstance>,
        mut device: Box<dyn LampArray>,
        interval: Duration,
        refresh_tx: Sender<RefreshJob>,
        start: Arc<Barrier>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread_instance = instance.clone();

        let handle = thread::spawn(move || {
            let instance = thread_instance;
            start.wait();
            debug!("[HOST] {} running {} every {:?}", instance.name(), instance.mode(), interval);

            let mut next = Instant::now();
            while !thread_stop.load(Ordering::Acquire) {
                let now = Instant::now();
                if instance.tick(now, device.as_mut()) && instance.try_begin_refresh() {
                    if refresh_tx.send(instance.refresh_job()).is_err() {
                        instance.end_refresh();
                    }
                }

                next += interval;
                let now = Instant::now();
                if next > now {
                    thread::sleep(next - now);
                } else {
                    // Fell behind; don't try to catch up with a burst of frames.
                    next = now;
                }
            }
            device
        });

        Self { instance, stop, handle }
    }

    fn name(&self) -> &str {
        self.instance.name()
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn join(self) -> Option<Box<dyn LampArray>> {
        let name = self.instance.name().to_string();
        match self.handle.join() {
            Ok(device) => Some(device),
            Err(_) => {
                error!("[HOST] Frame thread for {} panicked, device lost", name);
                None
            }
        }
    }
}

/// Owns the connected devices and runs the selected mode on all of them.
pub struct EffectHost {
    config: EngineConfig,
    worker: RefreshWorker,
    throttle: Arc<RefreshThrottle>,
    mode: Option<LightingMode>,
    idle: Vec<Box<dyn LampArray>>,
    runners: Vec<DeviceRunner>,
}

impl EffectHost {
    pub fn new<S: PlaybackService>(service: Arc<S>, config: EngineConfig) -> Self {
        let throttle = Arc::new(RefreshThrottle::new(Duration::from_millis(
            config.refresh.min_interval_ms,
        )));
        Self {
            worker: RefreshWorker::spawn(service),
            throttle,
            config,
            mode: None,
            idle: Vec::new(),
            runners: Vec::new(),
        }
    }

    pub fn mode(&self) -> Option<LightingMode> {
        self.mode
    }

    pub fn device_names(&self) -> Vec<String> {
        self.runners
            .iter()
            .map(|r| r.name().to_string())
            .chain(self.idle.iter().map(|d| d.name().to_string()))
            .collect()
    }

    /// Attach a device; it joins the running mode right away.
    pub fn add_device(&mut self, device: Box<dyn LampArray>) {
        info!("[HOST] Device added: {} ({} zones)", device.name(), device.zone_count());
        match self.mode {
            Some(mode) => {
                let runner = self.start_runner(mode, device, Arc::new(Barrier::new(1)));
                self.runners.push(runner);
            }
            None => self.idle.push(device),
        }
    }

    /// Detach a device by name, stopping its effect first.
    pub fn remove_device(&mut self, name: &str) -> Option<Box<dyn LampArray>> {
        if let Some(pos) = self.idle.iter().position(|d| d.name() == name) {
            return Some(self.idle.remove(pos));
        }

        let pos = self.runners.iter().position(|r| r.name() == name)?;
        let runner = self.runners.remove(pos);
        runner.stop();
        let device = runner.join();
        info!("[HOST] Device removed: {}", name);
        device
    }

    /// Tear down the current effects and start `mode` on every device at once.
    pub fn set_mode(&mut self, mode: LightingMode) {
        self.stop();
        info!("[HOST] Mode -> {} on {} device(s)", mode, self.idle.len());

        let devices: Vec<Box<dyn LampArray>> = self.idle.drain(..).collect();
        let start = Arc::new(Barrier::new(devices.len()));
        for device in devices {
            let runner = self.start_runner(mode, device, start.clone());
            self.runners.push(runner);
        }
        self.mode = Some(mode);
    }

    /// Stop every frame thread and keep the devices for the next mode.
    pub fn stop(&mut self) {
        for runner in &self.runners {
            runner.stop();
        }
        for runner in self.runners.drain(..) {
            if let Some(device) = runner.join() {
                self.idle.push(device);
            }
        }
        self.mode = None;
    }

    /// Stop everything and wait for the refresh worker. Returns the devices.
    pub fn shutdown(mut self) -> Vec<Box<dyn LampArray>> {
        self.stop();
        self.worker.shutdown();
        self.idle
    }

    fn start_runner(
        &self,
        mode: LightingMode,
        device: Box<dyn LampArray>,
        start: Arc<Barrier>,
    ) -> DeviceRunner {
        let geometry = DeviceGeometry::from_device(device.as_ref());
        if geometry.zone_count() == 0 {
            warn!("[HOST] {} reports no zones", device.name());
        }

        let gate = match self.config.refresh.policy {
            RefreshPolicy::FrameCountdown => RefreshGate::countdown(mode.refresh_countdown(&self.config)),
            RefreshPolicy::Throttle => RefreshGate::Throttle(self.throttle.clone()),
        };
        let instance = Arc::new(EffectInstance::new(
            device.name(),
            mode,
            geometry,
            &self.config,
            gate,
        ));
        if self.config.refresh.policy == RefreshPolicy::Throttle {
            self.throttle.subscribe(&instance);
        }

        DeviceRunner::start(
            instance,
            device,
            mode.frame_interval(&self.config),
            self.worker.sender(),
            start,
        )
    }
}
