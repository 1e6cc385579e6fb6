use serde::Serialize;

use super::snapshot::FrequencySnapshot;

/// Share of the spectrum drawn as bars; the high tail is mostly noise.
pub const DEFAULT_RETAINED_FRACTION: f32 = 0.75;

const HEIGHT_CURVE: f32 = 1.1;
const HEIGHT_BOOST: f32 = 1.2;
const MIN_BAR_HEIGHT: f32 = 2.0;
const BAR_WIDTH_RATIO: f32 = 0.4;

/// Geometry of one waveform bar inside a `width` x `height` box.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bar {
    pub index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

pub fn retained_count(bins: usize, retained_fraction: f32) -> usize {
    ((bins as f32 * retained_fraction.clamp(0.0, 1.0)).floor() as usize).min(bins)
}

/// Map a snapshot to bar geometry. Stateless; call once per tick.
pub fn map_bars(
    snapshot: &FrequencySnapshot,
    width: f32,
    height: f32,
    retained_fraction: f32,
) -> Vec<Bar> {
    let count = retained_count(snapshot.len(), retained_fraction);
    if count == 0 {
        return Vec::new();
    }

    let slot = width / count as f32;
    let bar_width = slot * BAR_WIDTH_RATIO;

    snapshot.bins()[..count]
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            // Power curve: loud bins pop, quiet ones stay low
            let normalized = (value as f32 / 255.0).powf(HEIGHT_CURVE);
            let bar_height = (normalized * height * HEIGHT_BOOST).max(MIN_BAR_HEIGHT).min(height);
            Bar {
                index,
                x: index as f32 * slot + (slot - bar_width) / 2.0,
                y: (height - bar_height) / 2.0,
                width: bar_width,
                height: bar_height,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with_first(value: u8) -> FrequencySnapshot {
        let mut bins = vec![0u8; 64];
        bins[0] = value;
        FrequencySnapshot::new(bins)
    }

    #[test]
    fn drops_the_top_quarter() {
        let bars = map_bars(&FrequencySnapshot::silent(64), 400.0, 60.0, DEFAULT_RETAINED_FRACTION);
        assert_eq!(bars.len(), 48);
        assert_eq!(bars.last().unwrap().index, 47);
    }

    #[test]
    fn full_bin_fills_container() {
        let bars = map_bars(&snapshot_with_first(255), 400.0, 60.0, DEFAULT_RETAINED_FRACTION);
        assert_eq!(bars[0].height, 60.0);
        assert_eq!(bars[0].y, 0.0);
    }

    #[test]
    fn silent_bins_keep_minimum_height() {
        let bars = map_bars(&FrequencySnapshot::silent(64), 400.0, 60.0, DEFAULT_RETAINED_FRACTION);
        assert!(bars.iter().all(|b| b.height == 2.0));
        assert_eq!(bars[0].y, 29.0);
    }

    #[test]
    fn mid_value_follows_power_curve() {
        let bars = map_bars(&snapshot_with_first(128), 400.0, 100.0, DEFAULT_RETAINED_FRACTION);
        let expected = (128.0f32 / 255.0).powf(1.1) * 100.0 * 1.2;
        assert!((bars[0].height - expected).abs() < 1e-3);
    }

    #[test]
    fn bars_are_centered_in_their_slots() {
        let bars = map_bars(&FrequencySnapshot::silent(64), 480.0, 60.0, DEFAULT_RETAINED_FRACTION);
        // 48 slots of 10 px, bars 4 px wide
        assert_eq!(bars[0].width, 4.0);
        assert_eq!(bars[0].x, 3.0);
        assert_eq!(bars[1].x, 13.0);
    }

    #[test]
    fn heights_stay_in_bounds() {
        let bins: Vec<u8> = (0..64).map(|i| (i * 4) as u8).collect();
        let snap = FrequencySnapshot::new(bins);
        for height in [2.0, 10.0, 60.0, 300.0] {
            for bar in map_bars(&snap, 400.0, height, DEFAULT_RETAINED_FRACTION) {
                assert!(bar.height >= 2.0 && bar.height <= height);
            }
        }
    }

    #[test]
    fn empty_snapshot_has_no_bars() {
        assert!(map_bars(&FrequencySnapshot::silent(0), 400.0, 60.0, 0.75).is_empty());
        assert!(map_bars(&FrequencySnapshot::silent(1), 400.0, 60.0, 0.75).is_empty());
    }
}
