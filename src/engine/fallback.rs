use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::snapshot::FrequencySnapshot;

/// Synthetic spectrum used whenever no real analysis tap is bound.
///
/// Output is a pure function of `(seed, time)`: the noise term is drawn from
/// an RNG keyed by the seed and the millisecond of `time`, so a preview tick
/// and an export frame landing on the same timestamp see the same bins.
#[derive(Clone, Debug)]
pub struct FallbackGenerator {
    bins: usize,
    seed: u64,
}

impl FallbackGenerator {
    pub fn new(bins: usize, seed: u64) -> Self {
        Self { bins, seed }
    }

    pub fn generate(&self, time: f64) -> FrequencySnapshot {
        let mut rng = StdRng::seed_from_u64(noise_key(self.seed, time));
        (0..self.bins)
            .map(|i| synth_bin(time, i, self.bins, rng.gen::<f64>()))
            .collect()
    }
}

/// One synthetic bin. `r` is a uniform sample in [0, 1).
pub fn synth_bin(time: f64, index: usize, bins: usize, r: f64) -> u8 {
    let i = index as f64;
    let base = (time * 2.0 + i * 0.3).sin() * 0.3 + 0.5;
    let variation = (time * 3.7 + i * 0.5).sin() * 0.2;
    let noise = (r - 0.5) * 0.1;

    // Lower bins weighted higher
    let frequency_factor = 1.0 - (i / bins.max(1) as f64) * 0.5;

    ((base + variation + noise) * frequency_factor * 200.0)
        .clamp(0.0, 255.0)
        .floor() as u8
}

fn noise_key(seed: u64, time: f64) -> u64 {
    let millis = if time.is_finite() {
        (time * 1000.0).round() as i64
    } else {
        0
    };
    seed ^ (millis as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}
