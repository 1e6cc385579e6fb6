use serde::Serialize;

use crate::audio::source::{SignalSource, SourceError, SourceEvent};

use super::analyzer::FrequencyAnalyzer;
use super::bars::{map_bars, Bar};
use super::captions::{Caption, CaptionTrack};
use super::particles::{Particle, ParticleSpawner};
use super::progress::progress_percent;
use super::snapshot::FrequencySnapshot;
use super::EngineConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Playing,
    Stopped,
}

/// Media the user swaps mid-session.
pub enum MediaSwap {
    Audio(Option<Box<dyn SignalSource>>),
    Image,
}

/// Everything consumers need for one tick, computed in a single pass.
#[derive(Clone, Debug)]
pub struct TickOutput {
    pub time: f64,
    pub duration: f64,
    pub phase: Phase,
    pub degraded: bool,
    pub snapshot: FrequencySnapshot,
    pub bass_level: f32,
    pub bars: Vec<Bar>,
    pub particles: Vec<Particle>,
    pub caption: Option<Caption>,
    pub progress: f32,
}

/// Advances playback time from the tick clock when the source cannot play.
#[derive(Clone, Copy, Debug)]
struct SyntheticTimer {
    base: f64,
    anchor: Option<f64>,
}

impl SyntheticTimer {
    fn new(base: f64) -> Self {
        Self { base, anchor: None }
    }

    fn advance(&mut self, now: f64) -> f64 {
        let anchor = *self.anchor.get_or_insert(now);
        self.base + (now - anchor).max(0.0)
    }
}

/// Owns the signal source, the analyzer binding and all per-session state.
///
/// Live preview and offline export both drive a session through `tick`.
pub struct Session {
    config: EngineConfig,
    source: Option<Box<dyn SignalSource>>,
    analyzer: FrequencyAnalyzer,
    spawner: ParticleSpawner,
    captions: CaptionTrack,
    phase: Phase,
    current_time: f64,
    duration: f64,
    duration_confirmed: bool,
    timer: Option<SyntheticTimer>,
}

impl Session {
    pub fn new(
        config: EngineConfig,
        source: Option<Box<dyn SignalSource>>,
        captions: CaptionTrack,
    ) -> Self {
        let analyzer = FrequencyAnalyzer::new(config.fft_size, config.smoothing, config.seed);
        let spawner = ParticleSpawner::new(
            config.particle_threshold,
            config.max_particles,
            config.particle_field.width,
            config.seed,
        );
        Self {
            duration: config.provisional_duration,
            config,
            source,
            analyzer,
            spawner,
            captions,
            phase: Phase::Idle,
            current_time: 0.0,
            duration_confirmed: false,
            timer: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_degraded(&self) -> bool {
        self.timer.is_some()
    }

    pub fn analyzer(&self) -> &FrequencyAnalyzer {
        &self.analyzer
    }

    pub fn captions(&self) -> &CaptionTrack {
        &self.captions
    }

    /// `Idle | Stopped -> Playing`.
    pub fn play(&mut self) {
        if self.phase == Phase::Playing {
            return;
        }

        match self.source.as_deref_mut() {
            Some(source) => self.analyzer.connect(Some(source)),
            None => self.analyzer.connect(None),
        }

        let started = match self.source.as_mut() {
            Some(source) => source.play(),
            None => Err(SourceError::Missing),
        };
        self.timer = match started {
            Ok(()) => None,
            Err(err) => {
                log::warn!("Playback failed, advancing on a synthetic timer: {}", err);
                Some(SyntheticTimer::new(self.current_time))
            }
        };

        self.phase = Phase::Playing;
        log::debug!("Playing from {:.2}s", self.current_time);
    }

    /// `Playing -> Idle`.
    pub fn pause(&mut self) {
        if self.phase != Phase::Playing {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.pause();
        }
        self.analyzer.disconnect();
        self.spawner.clear();
        self.timer = None;
        self.phase = Phase::Idle;
        log::debug!("Paused at {:.2}s", self.current_time);
    }

    /// Any state `-> Stopped`, rewound to the start.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.pause();
            source.rewind();
        }
        self.finish_cycle();
    }

    /// Swap audio or image. Any non-idle state is forced to `Idle` first so no
    /// binding to the old source survives.
    pub fn replace_media(&mut self, swap: MediaSwap) {
        match self.phase {
            Phase::Playing => self.pause(),
            Phase::Stopped => self.phase = Phase::Idle,
            Phase::Idle => {}
        }

        if let MediaSwap::Audio(source) = swap {
            self.analyzer.disconnect();
            self.source = source;
            self.current_time = 0.0;
            self.duration = self.config.provisional_duration;
            self.duration_confirmed = false;
            log::info!("Audio source replaced");
        }
    }

    /// Run one tick at driver time `now` (seconds).
    ///
    /// `now` only feeds the synthetic timer; a playing source supplies its own
    /// playhead. Never fails.
    pub fn tick(&mut self, now: f64) -> TickOutput {
        self.poll_source();

        if self.phase == Phase::Playing {
            match self.timer.as_mut() {
                Some(timer) => {
                    self.current_time = timer.advance(now);
                    if self.current_time >= self.duration {
                        log::info!("Synthetic playback reached {:.1}s", self.duration);
                        self.finish_cycle();
                    }
                }
                None => {
                    if let Some(source) = self.source.as_ref() {
                        self.current_time = source.current_time();
                    }
                }
            }
        }

        let snapshot = self.analyzer.tick(self.current_time);
        let bass_level = snapshot.bass_level(self.config.bass_bins);
        let bars = map_bars(
            &snapshot,
            self.config.waveform.width,
            self.config.waveform.height,
            self.config.retained_fraction,
        );
        if self.phase == Phase::Playing {
            self.spawner.update(self.current_time, bass_level);
        }
        let caption = self.captions.select(self.current_time).cloned();
        let progress = progress_percent(self.current_time, self.duration);

        TickOutput {
            time: self.current_time,
            duration: self.duration,
            phase: self.phase,
            degraded: self.timer.is_some(),
            snapshot,
            bass_level,
            bars,
            particles: self.spawner.particles().cloned().collect(),
            caption,
            progress,
        }
    }

    fn poll_source(&mut self) {
        let events = match self.source.as_mut() {
            Some(source) => source.poll_events(),
            None => return,
        };
        for event in events {
            match event {
                SourceEvent::MetadataReady { duration } => {
                    if !self.duration_confirmed && duration.is_finite() && duration > 0.0 {
                        log::info!("Duration confirmed: {:.2}s", duration);
                        self.duration = duration;
                        self.duration_confirmed = true;
                    }
                }
                SourceEvent::Ended => {
                    if self.phase == Phase::Playing {
                        log::info!("Playback ended");
                        self.finish_cycle();
                    }
                }
            }
        }
    }

    fn finish_cycle(&mut self) {
        self.analyzer.disconnect();
        self.spawner.clear();
        self.timer = None;
        self.current_time = 0.0;
        self.phase = Phase::Stopped;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.analyzer.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::AudioData;
    use crate::audio::source::{FrameClock, PcmSource};
    use crate::audio::tap::SpectrumTap;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::Arc;

    fn pcm_source(secs: f64, clock: &FrameClock) -> Box<dyn SignalSource> {
        let sample_rate = 8_000;
        let samples = (0..(secs * sample_rate as f64) as usize)
            .map(|i| (i as f32 * 0.05).sin())
            .collect();
        let audio = Arc::new(AudioData { samples, sample_rate });
        Box::new(PcmSource::new(audio, Box::new(clock.clone())))
    }

    fn captions() -> CaptionTrack {
        CaptionTrack::new(vec![
            Caption::new(0.0, 4.6, "A"),
            Caption::new(4.6, 7.5, "B"),
            Caption::new(7.5, 14.2, "C"),
        ])
        .unwrap()
    }

    struct CountingSource {
        refuse_play: bool,
        releases: Rc<Cell<usize>>,
        taps: Rc<Cell<usize>>,
    }

    struct CountingTap(Rc<Cell<usize>>);

    impl SpectrumTap for CountingTap {
        fn bin_count(&self) -> usize {
            64
        }
        fn read(&mut self, _time: f64, out: &mut [u8]) {
            out.fill(255);
        }
    }

    impl Drop for CountingTap {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    impl SignalSource for CountingSource {
        fn current_time(&self) -> f64 {
            1.0
        }
        fn duration(&self) -> Option<f64> {
            None
        }
        fn play(&mut self) -> Result<(), SourceError> {
            if self.refuse_play {
                Err(SourceError::Refused("autoplay blocked".into()))
            } else {
                Ok(())
            }
        }
        fn pause(&mut self) {}
        fn rewind(&mut self) {}
        fn poll_events(&mut self) -> Vec<SourceEvent> {
            Vec::new()
        }
        fn open_tap(&mut self, _fft_size: usize) -> Result<Box<dyn SpectrumTap>, SourceError> {
            self.taps.set(self.taps.get() + 1);
            Ok(Box::new(CountingTap(self.releases.clone())))
        }
    }

    fn counting(refuse_play: bool) -> (Box<dyn SignalSource>, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let releases = Rc::new(Cell::new(0));
        let taps = Rc::new(Cell::new(0));
        let source = CountingSource {
            refuse_play,
            releases: releases.clone(),
            taps: taps.clone(),
        };
        (Box::new(source), releases, taps)
    }

    #[test]
    fn starts_idle_with_provisional_duration() {
        let session = Session::new(EngineConfig::default(), None, CaptionTrack::default());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.duration(), 24.0);
    }

    #[test]
    fn play_pause_transitions() {
        let clock = FrameClock::default();
        let mut session = Session::new(EngineConfig::default(), Some(pcm_source(10.0, &clock)), captions());
        session.play();
        assert_eq!(session.phase(), Phase::Playing);
        assert!(session.analyzer().is_bound());
        session.pause();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(!session.analyzer().is_bound());
        assert!(!session.analyzer().is_analyzing());
        // Unsupported transition
        session.pause();
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn metadata_corrects_duration_once() {
        let clock = FrameClock::default();
        let mut session = Session::new(EngineConfig::default(), Some(pcm_source(10.0, &clock)), captions());
        let out = session.tick(0.0);
        assert!((out.duration - 10.0).abs() < 1e-9);
    }

    #[test]
    fn frame_clock_drives_caption_and_progress() {
        let clock = FrameClock::default();
        let mut session = Session::new(EngineConfig::default(), Some(pcm_source(20.0, &clock)), captions());
        session.play();
        clock.set(10.0);
        let out = session.tick(10.0);
        assert_eq!(out.caption.as_ref().unwrap().text, "C");
        assert!((out.progress - 50.0).abs() < 1e-4);
        clock.set(4.6);
        assert_eq!(session.tick(4.6).caption.unwrap().text, "B");
    }

    #[test]
    fn end_of_stream_stops_and_rewinds() {
        let clock = FrameClock::default();
        let mut session = Session::new(EngineConfig::default(), Some(pcm_source(2.0, &clock)), captions());
        session.play();
        clock.set(1.0);
        assert_eq!(session.tick(1.0).phase, Phase::Playing);
        clock.set(2.5);
        let out = session.tick(2.5);
        assert_eq!(out.phase, Phase::Stopped);
        assert_eq!(out.time, 0.0);
        assert_eq!(out.progress, 0.0);
        assert!(out.particles.is_empty());
        assert!(!session.analyzer().is_bound());

        // Stopped -> Playing restarts from the top
        session.play();
        assert_eq!(session.phase(), Phase::Playing);
    }

    #[test]
    fn refused_playback_runs_on_synthetic_timer() {
        let (source, _, _) = counting(true);
        let mut session = Session::new(EngineConfig::default(), Some(source), captions());
        session.play();
        assert!(session.is_degraded());

        let first = session.tick(100.0);
        assert_eq!(first.time, 0.0);
        assert!(first.degraded);
        let later = session.tick(105.0);
        assert!((later.time - 5.0).abs() < 1e-9);
        assert_eq!(later.caption.unwrap().text, "B");

        let done = session.tick(130.0);
        assert_eq!(done.phase, Phase::Stopped);
        assert_eq!(done.time, 0.0);
        assert!(!done.degraded);
    }

    #[test]
    fn no_source_uses_fallback_and_timer() {
        let mut session = Session::new(EngineConfig::default(), None, CaptionTrack::default());
        session.play();
        let out = session.tick(0.0);
        assert!(out.degraded);
        assert!(!session.analyzer().is_bound());
        assert!(session.analyzer().is_analyzing());
        assert_eq!(out.snapshot.len(), 64);
        assert_eq!(out.bars.len(), 48);
    }

    #[test]
    fn repeated_stop_and_pause_release_once() {
        let (source, releases, taps) = counting(false);
        let mut session = Session::new(EngineConfig::default(), Some(source), CaptionTrack::default());
        session.play();
        session.stop();
        session.stop();
        session.pause();
        assert_eq!(taps.get(), 1);
        assert_eq!(releases.get(), 1);
        assert_eq!(session.phase(), Phase::Stopped);
        drop(session);
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn replacing_audio_tears_down_binding_first() {
        let (old, old_releases, _) = counting(false);
        let (new, new_releases, new_taps) = counting(false);
        let mut session = Session::new(EngineConfig::default(), Some(old), captions());
        session.play();
        session.tick(0.0);

        session.replace_media(MediaSwap::Audio(Some(new)));
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(old_releases.get(), 1);
        assert_eq!(session.current_time(), 0.0);
        assert_eq!(session.duration(), 24.0);

        session.play();
        assert_eq!(new_taps.get(), 1);
        assert_eq!(new_releases.get(), 0);
    }

    #[test]
    fn replacing_image_forces_idle() {
        let (source, releases, _) = counting(false);
        let mut session = Session::new(EngineConfig::default(), Some(source), captions());
        session.play();
        session.replace_media(MediaSwap::Image);
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(releases.get(), 1);

        session.stop();
        session.replace_media(MediaSwap::Image);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn loud_bass_spawns_bounded_particles() {
        let (source, _, _) = counting(false);
        let mut session = Session::new(EngineConfig::default(), Some(source), CaptionTrack::default());
        session.play();
        for i in 0..200 {
            let out = session.tick(i as f64 / 60.0);
            assert!(out.particles.len() <= 12);
        }
        // Smoothed full-scale taps push bass above threshold within a few ticks
        assert!(!session.tick(4.0).particles.is_empty());
    }

    #[test]
    fn idle_ticks_do_not_spawn() {
        let (source, _, _) = counting(false);
        let mut session = Session::new(EngineConfig::default(), Some(source), CaptionTrack::default());
        for i in 0..30 {
            assert!(session.tick(i as f64).particles.is_empty());
        }
    }

    #[test]
    fn progress_is_monotonic_while_playing() {
        let clock = FrameClock::default();
        let mut session = Session::new(EngineConfig::default(), Some(pcm_source(5.0, &clock)), captions());
        session.play();
        let mut last = 0.0;
        for f in 0..150 {
            let t = f as f64 / 30.0;
            clock.set(t);
            let out = session.tick(t);
            assert_eq!(out.phase, Phase::Playing);
            assert!(out.progress >= last);
            last = out.progress;
        }
    }
}
