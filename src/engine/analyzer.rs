use crate::audio::source::SignalSource;
use crate::audio::tap::SpectrumTap;

use super::fallback::FallbackGenerator;
use super::snapshot::FrequencySnapshot;

pub const DEFAULT_FFT_SIZE: usize = 128;
pub const DEFAULT_SMOOTHING: f32 = 0.75;

/// Turns a bound signal source, or the synthetic fallback, into one
/// `FrequencySnapshot` per tick.
pub struct FrequencyAnalyzer {
    smoothing: f32,
    bins: usize,
    tap: Option<Box<dyn SpectrumTap>>,
    analyzing: bool,
    raw: Vec<u8>,
    smoothed: Vec<f32>,
    fallback: FallbackGenerator,
    last: FrequencySnapshot,
}

impl FrequencyAnalyzer {
    pub fn new(fft_size: usize, smoothing: f32, seed: u64) -> Self {
        let bins = fft_size / 2;
        Self {
            smoothing: smoothing.clamp(0.0, 1.0),
            bins,
            tap: None,
            analyzing: false,
            raw: vec![0; bins],
            smoothed: vec![0.0; bins],
            fallback: FallbackGenerator::new(bins, seed),
            last: FrequencySnapshot::silent(bins),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    /// True while a real analysis tap is bound.
    pub fn is_bound(&self) -> bool {
        self.tap.is_some()
    }

    /// Bind to `source` and start analyzing.
    ///
    /// Never fails: without a usable source the analyzer runs on the
    /// synthetic generator.
    pub fn connect(&mut self, source: Option<&mut dyn SignalSource>) {
        self.analyzing = true;
        if self.tap.is_some() {
            return;
        }

        let Some(source) = source else {
            log::info!("No signal source connected, using synthetic spectrum");
            return;
        };

        match source.open_tap(self.bins * 2) {
            Ok(tap) if tap.bin_count() == self.bins => {
                self.smoothed.fill(0.0);
                self.tap = Some(tap);
                log::debug!("Analyzer bound ({} bins)", self.bins);
            }
            Ok(tap) => {
                log::warn!(
                    "Analysis tap offers {} bins, expected {}; using synthetic spectrum",
                    tap.bin_count(),
                    self.bins
                );
            }
            Err(err) => {
                log::warn!("Failed to connect audio analyzer, using synthetic spectrum: {}", err);
            }
        }
    }

    /// Stop analyzing and release the tap. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.analyzing = false;
        if let Some(tap) = self.tap.take() {
            drop(tap);
            log::debug!("Analyzer unbound");
        }
    }

    /// Produce the snapshot for `time` (seconds on the playback timeline).
    ///
    /// While stopped the previous snapshot is returned unchanged.
    pub fn tick(&mut self, time: f64) -> FrequencySnapshot {
        if !self.analyzing {
            return self.last.clone();
        }

        let snapshot = match self.tap.as_mut() {
            Some(tap) => {
                tap.read(time, &mut self.raw);
                let keep = self.smoothing;
                for (s, &r) in self.smoothed.iter_mut().zip(self.raw.iter()) {
                    *s = keep * *s + (1.0 - keep) * r as f32;
                }
                self.smoothed
                    .iter()
                    .map(|&s| s.round().clamp(0.0, 255.0) as u8)
                    .collect()
            }
            None => self.fallback.generate(time),
        };

        self.last = snapshot.clone();
        snapshot
    }
}
