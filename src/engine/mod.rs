pub mod analyzer;
pub mod bars;
pub mod captions;
pub mod fallback;
pub mod liquid;
pub mod particles;
pub mod progress;
pub mod session;
pub mod snapshot;

/// Provisional clip length used until the source reports its real duration.
pub const PROVISIONAL_DURATION: f64 = 24.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Tunables for one visualization session.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub bass_bins: usize,
    pub retained_fraction: f32,
    pub particle_threshold: f32,
    pub max_particles: usize,
    pub provisional_duration: f64,
    /// Box the waveform bars are laid out in.
    pub waveform: Size,
    /// Box particles rise through.
    pub particle_field: Size,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: analyzer::DEFAULT_FFT_SIZE,
            smoothing: analyzer::DEFAULT_SMOOTHING,
            bass_bins: snapshot::DEFAULT_BASS_BINS,
            retained_fraction: bars::DEFAULT_RETAINED_FRACTION,
            particle_threshold: particles::DEFAULT_THRESHOLD,
            max_particles: particles::DEFAULT_MAX_PARTICLES,
            provisional_duration: PROVISIONAL_DURATION,
            waveform: Size::new(400.0, 60.0),
            particle_field: Size::new(400.0, 200.0),
            seed: 0,
        }
    }
}
