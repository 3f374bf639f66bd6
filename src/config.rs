use crate::keys::Key;
use crate::model::{Color, NetworkConfig, PixelStrip};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// Each effect instance counts frames between now-playing requests.
    FrameCountdown,
    /// One shared minimum interval across every device.
    Throttle,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    pub policy: RefreshPolicy,
    pub countdown_frames: u32,          // ~2s at 30 fps
    pub artwork_countdown_frames: u32,  // 20s at 2 fps
    pub min_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            policy: RefreshPolicy::FrameCountdown,
            countdown_frames: 60,
            artwork_countdown_frames: 40,
            min_interval_ms: 1000,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub frame_interval_ms: u64,
    /// Nominal frame rate beat fades are sized for; the interval is only an
    /// approximation of it.
    pub fade_rate_hz: f64,
    pub artwork_interval_ms: u64,
    pub refresh: RefreshConfig,
    pub pitch_threshold: f32,
    pub pitch_fade_frames: u32,
    pub idle_color: Color,
    pub volume_color: Color,
    /// Quietest loudness (dB) the volume meter shows; louder fills the width.
    pub loudness_floor_db: f32,
    pub network: NetworkConfig,
    pub strips: Vec<PixelStrip>,
    /// Meters; derived from the strip extents when absent.
    pub bounding_box: Option<[f64; 2]>,
    /// Key -> (strip id, pixel index) for keyed pitch effects on strips.
    pub key_zones: HashMap<Key, Vec<(u64, usize)>>,
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 33, // ~30 fps
            fade_rate_hz: 30.0,
            artwork_interval_ms: 500,
            refresh: RefreshConfig::default(),
            pitch_threshold: 0.7,
            pitch_fade_frames: 10,
            idle_color: Color::IDLE_GREEN,
            volume_color: Color::BLUE,
            loudness_floor_db: -60.0,
            network: NetworkConfig::default(),
            strips: vec![PixelStrip::default()],
            bounding_box: None,
            key_zones: HashMap::new(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json).context("Invalid engine config")?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        Self::from_json(&json)
    }

    /// Load the config at `path`, or at the user config location. Defaults
    /// are used when neither names an existing file.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }
        match user_config_path().filter(|p| p.exists()) {
            Some(p) => Self::load(&p),
            None => {
                log::info!("[CONFIG] No user config found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Where the per-user config lives, if the platform has a config directory.
pub fn user_config_path() -> Option<PathBuf> {
    let dir = config_dir()?;
    Some(dir.join(CONFIG_FILE))
}

const CONFIG_FILE: &str = "lampsync.json";

#[cfg(target_os = "macos")]
fn config_dir() -> Option<PathBuf> {
    home::home_dir().map(|home| home.join("Library/Application Support/Lampsync"))
}

#[cfg(target_os = "windows")]
fn config_dir() -> Option<PathBuf> {
    std::env::var_os("APPDATA").map(|base| PathBuf::from(base).join("Lampsync"))
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn config_dir() -> Option<PathBuf> {
    xdg_config_dir(std::env::var_os("XDG_CONFIG_HOME"), home::home_dir())
}

/// `$XDG_CONFIG_HOME/lampsync`, else `~/.config/lampsync`. An empty
/// `XDG_CONFIG_HOME` counts as unset.
#[cfg_attr(any(target_os = "macos", target_os = "windows"), allow(dead_code))]
fn xdg_config_dir(xdg_config_home: Option<std::ffi::OsString>, home: Option<PathBuf>) -> Option<PathBuf> {
    let base = xdg_config_home
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| home.map(|h| h.join(".config")))?;
    Some(base.join("lampsync"))
}
