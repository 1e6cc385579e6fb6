use std::sync::Arc;

use anyhow::{Context, Result};

use crate::audio::decode::{decode_audio, AudioData};
use crate::audio::source::{Clock, PcmSource, SignalSource};
use crate::cli::SessionArgs;
use crate::config::Config;
use crate::engine::captions::CaptionTrack;
use crate::engine::session::Session;
use crate::engine::{EngineConfig, Size};
use crate::render::layout::CardLayout;

/// Everything needed to start a session, resolved from CLI and config.
pub struct Prepared {
    pub engine: EngineConfig,
    pub audio: Option<Arc<AudioData>>,
    pub captions: CaptionTrack,
    /// Length of the clip to render or preview.
    pub duration: f64,
}

impl Prepared {
    pub fn load(args: &SessionArgs, config: &Config) -> Result<Self> {
        let mut engine = engine_config(args, config);

        let audio = match &args.input {
            Some(path) => {
                log::info!("Decoding audio...");
                Some(Arc::new(decode_audio(path)?))
            }
            None => {
                log::info!("No input audio, using the synthetic spectrum");
                None
            }
        };

        let duration = match audio.as_deref().map(AudioData::duration) {
            Some(d) if d > 0.0 => d,
            _ => {
                let d = args.duration.unwrap_or(config.visual.provisional_duration);
                if !(d > 0.0) {
                    anyhow::bail!("Clip duration must be positive, got {}", d);
                }
                engine.provisional_duration = d;
                d
            }
        };

        let captions = resolve_captions(args, config, duration)?;

        Ok(Self {
            engine,
            audio,
            captions,
            duration,
        })
    }

    /// Size the waveform box and particle field to the card regions they are drawn in.
    pub fn fit_to(&mut self, layout: &CardLayout) {
        self.engine.waveform = Size::new(layout.waveform.width, layout.waveform.height);
        self.engine.particle_field = Size::new(layout.caption.width, layout.caption.height);
    }

    pub fn session(&self, clock: Box<dyn Clock>) -> Session {
        let source = self
            .audio
            .clone()
            .map(|audio| Box::new(PcmSource::new(audio, clock)) as Box<dyn SignalSource>);
        Session::new(self.engine.clone(), source, self.captions.clone())
    }
}

/// Config values, overridden by whatever the command line sets.
pub fn engine_config(args: &SessionArgs, config: &Config) -> EngineConfig {
    EngineConfig {
        fft_size: config.audio.fft_size,
        smoothing: args.smoothing.unwrap_or(config.audio.smoothing),
        bass_bins: config.visual.bass_bins,
        retained_fraction: config.visual.retained_fraction,
        particle_threshold: args.threshold.unwrap_or(config.particles.threshold),
        max_particles: args.max_particles.unwrap_or(config.particles.max),
        provisional_duration: config.visual.provisional_duration,
        seed: args.seed.unwrap_or(config.visual.seed),
        ..EngineConfig::default()
    }
}

fn resolve_captions(args: &SessionArgs, config: &Config, duration: f64) -> Result<CaptionTrack> {
    if let Some(path) = &args.captions {
        return CaptionTrack::load(path)
            .with_context(|| format!("Failed to load captions: {}", path.display()));
    }
    if let Some(text) = &args.transcript {
        return Ok(CaptionTrack::single(text, duration));
    }
    if !config.captions.is_empty() {
        return CaptionTrack::new(config.captions.clone()).context("Invalid [[captions]] in config");
    }
    Ok(CaptionTrack::default())
}
