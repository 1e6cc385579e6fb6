use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

pub const DEFAULT_THRESHOLD: f32 = 0.6;
pub const DEFAULT_MAX_PARTICLES: usize = 12;

const INTENSITY_STEP: f32 = 0.1;
const MAX_SPAWN_PER_TICK: usize = 3;
const STAGGER: f64 = 0.1;
const MAX_JITTER: f64 = 0.3;
const MIN_LIFETIME: f64 = 3.0;
const LIFETIME_SPREAD: f64 = 2.0;
const MIN_SIZE: f32 = 3.0;
const SIZE_SPREAD: f32 = 6.0;
const MIN_OPACITY: f32 = 0.3;
const OPACITY_SPREAD: f32 = 0.4;
/// Distance past the top edge a particle travels before it finishes.
const RISE_OVERSHOOT: f32 = 20.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Particle {
    pub id: u64,
    pub spawn_time: f64,
    pub delay: f64,
    pub lifetime: f64,
    pub x: f32,
    pub size: f32,
    pub opacity: f32,
}

/// Where and how a particle is drawn at a given moment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ParticleSprite {
    pub id: u64,
    pub x: f32,
    /// Distance risen above the bottom edge.
    pub rise: f32,
    pub size: f32,
    pub opacity: f32,
}

impl Particle {
    pub fn end_time(&self) -> f64 {
        self.spawn_time + self.delay + self.lifetime
    }

    /// Animation progress in [0, 1] at `time`.
    pub fn progress(&self, time: f64) -> f32 {
        let elapsed = time - self.spawn_time - self.delay;
        if self.lifetime <= 0.0 {
            return 1.0;
        }
        (elapsed / self.lifetime).clamp(0.0, 1.0) as f32
    }

    pub fn sprite(&self, time: f64, field_height: f32) -> ParticleSprite {
        let p = ease_out(self.progress(time));
        ParticleSprite {
            id: self.id,
            x: self.x,
            rise: p * (field_height + RISE_OVERSHOOT),
            size: self.size * keyframes(&[0.5, 1.0, 1.0, 0.3], p),
            opacity: keyframes(&[0.0, self.opacity, self.opacity, 0.0], p),
        }
    }
}

/// Number of particles a tick at `bass_level` spawns.
pub fn spawn_intensity(bass_level: f32, threshold: f32) -> usize {
    if !(bass_level >= threshold) {
        return 0;
    }
    // The small bias keeps f32 rounding from dropping a step at exact boundaries
    let steps = ((bass_level - threshold) / INTENSITY_STEP + 1e-4).floor() as usize;
    (steps + 1).min(MAX_SPAWN_PER_TICK)
}

/// Bounded set of bass-reactive particles.
pub struct ParticleSpawner {
    threshold: f32,
    max_particles: usize,
    field_width: f32,
    next_id: u64,
    particles: VecDeque<Particle>,
    rng: StdRng,
}

impl ParticleSpawner {
    pub fn new(threshold: f32, max_particles: usize, field_width: f32, seed: u64) -> Self {
        Self {
            threshold,
            max_particles,
            field_width,
            next_id: 0,
            particles: VecDeque::with_capacity(max_particles + MAX_SPAWN_PER_TICK),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.particles.iter()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    /// Advance to `time`: retire finished particles, then spawn for this
    /// tick's bass level. Returns how many were spawned.
    pub fn update(&mut self, time: f64, bass_level: f32) -> usize {
        self.particles.retain(|p| time < p.end_time());

        let count = spawn_intensity(bass_level, self.threshold);
        for i in 0..count {
            let particle = Particle {
                id: self.next_id,
                spawn_time: time,
                delay: i as f64 * STAGGER + self.rng.gen::<f64>() * MAX_JITTER,
                lifetime: MIN_LIFETIME + self.rng.gen::<f64>() * LIFETIME_SPREAD,
                x: self.rng.gen::<f32>() * self.field_width,
                size: MIN_SIZE + self.rng.gen::<f32>() * SIZE_SPREAD,
                opacity: MIN_OPACITY + self.rng.gen::<f32>() * OPACITY_SPREAD,
            };
            self.next_id += 1;
            self.particles.push_back(particle);
        }

        while self.particles.len() > self.max_particles {
            self.particles.pop_front();
        }

        if count > 0 {
            log::debug!(
                "Spawned {} particles at {:.2}s (bass {:.2}, live {})",
                count,
                time,
                bass_level,
                self.particles.len()
            );
        }
        count
    }
}

fn ease_out(p: f32) -> f32 {
    1.0 - (1.0 - p) * (1.0 - p)
}

/// Piecewise-linear interpolation across evenly spaced keyframes.
fn keyframes(values: &[f32], p: f32) -> f32 {
    match values.len() {
        0 => 0.0,
        1 => values[0],
        n => {
            let pos = p.clamp(0.0, 1.0) * (n - 1) as f32;
            let i = (pos.floor() as usize).min(n - 2);
            let frac = pos - i as f32;
            values[i] + (values[i + 1] - values[i]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_steps() {
        assert_eq!(spawn_intensity(0.59, 0.6), 0);
        assert_eq!(spawn_intensity(0.6, 0.6), 1);
        assert_eq!(spawn_intensity(0.65, 0.6), 1);
        assert_eq!(spawn_intensity(0.7, 0.6), 2);
        assert_eq!(spawn_intensity(0.8, 0.6), 3);
        assert_eq!(spawn_intensity(1.0, 0.6), 3);
        assert_eq!(spawn_intensity(f32::NAN, 0.6), 0);
    }

    #[test]
    fn spawns_three_at_high_bass() {
        let mut spawner = ParticleSpawner::new(0.6, 12, 400.0, 1);
        assert_eq!(spawner.update(0.0, 0.8), 3);
        assert_eq!(spawner.len(), 3);
    }

    #[test]
    fn quiet_ticks_spawn_nothing() {
        let mut spawner = ParticleSpawner::new(0.6, 12, 400.0, 1);
        for i in 0..100 {
            spawner.update(i as f64 * 0.016, 0.3);
        }
        assert!(spawner.is_empty());
    }

    #[test]
    fn count_never_exceeds_bound() {
        let mut spawner = ParticleSpawner::new(0.6, 12, 400.0, 5);
        for i in 0..500 {
            spawner.update(i as f64 / 60.0, 1.0);
            assert!(spawner.len() <= 12);
        }
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let mut spawner = ParticleSpawner::new(0.6, 4, 400.0, 5);
        spawner.update(0.0, 1.0);
        spawner.update(0.01, 1.0);
        let ids: Vec<u64> = spawner.particles().map(|p| p.id).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
    }

    #[test]
    fn particles_expire_after_lifetime() {
        let mut spawner = ParticleSpawner::new(0.6, 12, 400.0, 5);
        spawner.update(0.0, 0.65);
        assert_eq!(spawner.len(), 1);
        // Delay < 0.3 s, lifetime < 5 s
        spawner.update(5.31, 0.0);
        assert!(spawner.is_empty());
    }

    #[test]
    fn randomized_fields_stay_in_range() {
        let mut spawner = ParticleSpawner::new(0.6, 300, 250.0, 11);
        for i in 0..100 {
            spawner.update(i as f64 * 0.001, 0.9);
        }
        for p in spawner.particles() {
            assert!((0.0..250.0).contains(&p.x));
            assert!((3.0..9.0).contains(&p.size));
            assert!((0.3..0.7).contains(&p.opacity));
            assert!((3.0..5.0).contains(&p.lifetime));
            assert!(p.delay >= 0.0 && p.delay < 0.2 + 0.3);
        }
    }

    #[test]
    fn same_seed_same_particles() {
        let mut a = ParticleSpawner::new(0.6, 12, 400.0, 99);
        let mut b = ParticleSpawner::new(0.6, 12, 400.0, 99);
        a.update(1.0, 0.9);
        b.update(1.0, 0.9);
        assert!(a.particles().eq(b.particles()));
    }

    #[test]
    fn sprite_rises_and_fades() {
        let p = Particle {
            id: 0,
            spawn_time: 1.0,
            delay: 0.0,
            lifetime: 4.0,
            x: 10.0,
            size: 6.0,
            opacity: 0.6,
        };
        let start = p.sprite(1.0, 200.0);
        assert_eq!(start.rise, 0.0);
        assert_eq!(start.opacity, 0.0);
        assert_eq!(start.size, 3.0);

        let end = p.sprite(5.0, 200.0);
        assert!((end.rise - 220.0).abs() < 1e-4);
        assert_eq!(end.opacity, 0.0);

        let mid = p.sprite(2.0, 200.0);
        assert!(mid.rise > 0.0 && mid.rise < 220.0);
        assert!(mid.opacity > 0.0);
    }
}
