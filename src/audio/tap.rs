use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::decode::AudioData;

/// Decibel range mapped onto the 0-255 byte scale.
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// A live connection between an analyzer and a signal source.
///
/// Dropping the tap releases it.
pub trait SpectrumTap {
    fn bin_count(&self) -> usize;

    /// Write the raw byte-scaled spectrum of the window ending at `time`.
    fn read(&mut self, time: f64, out: &mut [u8]);
}

/// FFT tap over decoded PCM.
pub struct PcmTap {
    audio: Arc<AudioData>,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    held: Rc<Cell<bool>>,
}

impl PcmTap {
    pub(super) fn new(audio: Arc<AudioData>, fft_size: usize, held: Rc<Cell<bool>>) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        held.set(true);
        Self {
            audio,
            fft,
            window: hann_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            held,
        }
    }
}

impl SpectrumTap for PcmTap {
    fn bin_count(&self) -> usize {
        self.window.len() / 2
    }

    fn read(&mut self, time: f64, out: &mut [u8]) {
        let fft_size = self.window.len();
        let end = if time.is_finite() && time > 0.0 {
            (time * self.audio.sample_rate as f64) as usize
        } else {
            0
        };
        let start = end.saturating_sub(fft_size);
        let samples = self.audio.window(start, end);

        // Right-align so the newest sample sits at the end of the window
        let offset = fft_size - samples.len();
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = if i >= offset { samples[i - offset] } else { 0.0 };
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let scale = 1.0 / fft_size as f32;
        for (byte, bin) in out.iter_mut().zip(self.buffer.iter()) {
            *byte = decibels_to_byte(20.0 * (bin.norm() * scale).max(1e-10).log10());
        }
    }
}

impl Drop for PcmTap {
    fn drop(&mut self) {
        self.held.set(false);
        log::debug!("Released PCM analysis tap");
    }
}

fn decibels_to_byte(db: f32) -> u8 {
    let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
    scaled.clamp(0.0, 255.0) as u8
}

pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
