use std::sync::Arc;

/// Number of leading bins averaged into the bass level.
pub const DEFAULT_BASS_BINS: usize = 4;

/// One tick's worth of byte-scaled frequency bins.
///
/// The bins are shared behind an `Arc`, so handing the same snapshot to the
/// bar mapper, the particle spawner and the renderer never copies or mutates it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencySnapshot {
    bins: Arc<[u8]>,
}

impl FrequencySnapshot {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins: bins.into() }
    }

    pub fn silent(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Mean of the first `bass_bins` bins, normalized to 0.0-1.0.
    pub fn bass_level(&self, bass_bins: usize) -> f32 {
        let k = bass_bins.min(self.bins.len());
        if k == 0 {
            return 0.0;
        }
        let sum: u32 = self.bins[..k].iter().map(|&b| b as u32).sum();
        (sum as f32 / (k as f32 * 255.0)).clamp(0.0, 1.0)
    }
}

impl FromIterator<u8> for FrequencySnapshot {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_bass_is_one() {
        let mut bins = vec![255u8; 4];
        bins.extend(std::iter::repeat(0).take(60));
        let snap = FrequencySnapshot::new(bins);
        assert_eq!(snap.bass_level(DEFAULT_BASS_BINS), 1.0);
    }

    #[test]
    fn bass_ignores_upper_bins() {
        let mut bins = vec![0u8; 4];
        bins.extend(std::iter::repeat(255).take(60));
        let snap = FrequencySnapshot::new(bins);
        assert_eq!(snap.bass_level(DEFAULT_BASS_BINS), 0.0);
    }

    #[test]
    fn bass_of_partial_energy() {
        let snap = FrequencySnapshot::new(vec![255, 0, 255, 0, 90, 90]);
        assert!((snap.bass_level(4) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn bass_of_short_or_empty_snapshot() {
        assert_eq!(FrequencySnapshot::silent(0).bass_level(4), 0.0);
        let short = FrequencySnapshot::new(vec![255, 255]);
        assert_eq!(short.bass_level(4), 1.0);
    }

    #[test]
    fn clones_share_storage() {
        let snap = FrequencySnapshot::new(vec![1, 2, 3]);
        let other = snap.clone();
        assert!(std::ptr::eq(snap.bins().as_ptr(), other.bins().as_ptr()));
    }
}
