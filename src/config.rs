use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::captions::Caption;
use crate::render::frame::{SpeakerInfo, WaveformStyle};

const CONFIG_FILE: &str = "audiogram.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub visual: VisualConfig,
    #[serde(default)]
    pub particles: ParticleConfig,
    #[serde(default)]
    pub speaker: SpeakerConfig,
    #[serde(default)]
    pub captions: Vec<Caption>,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    pub bitrate: Option<String>,
    #[serde(default)]
    pub style: WaveformStyle,
    pub font: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

#[derive(Debug, Deserialize)]
pub struct VisualConfig {
    #[serde(default = "default_bass_bins")]
    pub bass_bins: usize,
    #[serde(default = "default_retained_fraction")]
    pub retained_fraction: f32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_provisional_duration")]
    pub provisional_duration: f64,
    #[serde(default = "default_refresh_hz")]
    pub refresh_hz: f64,
}

#[derive(Debug, Deserialize)]
pub struct ParticleConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_max_particles")]
    pub max: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpeakerConfig {
    #[serde(flatten)]
    pub info: SpeakerInfo,
    pub portrait: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            bitrate: None,
            style: WaveformStyle::default(),
            font: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
        }
    }
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            bass_bins: default_bass_bins(),
            retained_fraction: default_retained_fraction(),
            seed: 0,
            provisional_duration: default_provisional_duration(),
            refresh_hz: default_refresh_hz(),
        }
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            max: default_max_particles(),
        }
    }
}

fn default_width() -> u32 { 1920 }
fn default_height() -> u32 { 1080 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_fft_size() -> usize { crate::engine::analyzer::DEFAULT_FFT_SIZE }
fn default_smoothing() -> f32 { crate::engine::analyzer::DEFAULT_SMOOTHING }
fn default_bass_bins() -> usize { crate::engine::snapshot::DEFAULT_BASS_BINS }
fn default_retained_fraction() -> f32 { crate::engine::bars::DEFAULT_RETAINED_FRACTION }
fn default_provisional_duration() -> f64 { crate::engine::PROVISIONAL_DURATION }
fn default_refresh_hz() -> f64 { 60.0 }
fn default_threshold() -> f32 { crate::engine::particles::DEFAULT_THRESHOLD }
fn default_max_particles() -> usize { crate::engine::particles::DEFAULT_MAX_PARTICLES }

/// Config path to use: the explicit one, else `./audiogram.toml`, else the
/// per-user config files.
pub fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("audiogram").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("audiogram").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    if !config.audio.fft_size.is_power_of_two() || config.audio.fft_size < 4 {
        anyhow::bail!("audio.fft_size must be a power of two >= 4, got {}", config.audio.fft_size);
    }
    if !(0.0..=1.0).contains(&config.audio.smoothing) {
        anyhow::bail!("audio.smoothing must be within [0, 1], got {}", config.audio.smoothing);
    }
    if config.output.fps == 0 {
        anyhow::bail!("output.fps must be positive");
    }
    Ok(config)
}
