use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::audio::source::FrameClock;
use crate::engine::session::{Phase, Session, TickOutput};

/// Create a linked cancel handle and token.
pub fn cancellation() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(Arc::new(tx)), CancelToken(rx))
}

#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Never resolves if every handle was dropped
    /// without cancelling.
    pub async fn cancelled(&mut self) {
        if self.0.wait_for(|&cancelled| cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub ticks: u64,
    /// Playback ran to the end rather than being cancelled.
    pub ended: bool,
}

/// Drives a session at display refresh rate until playback ends or the token
/// is cancelled.
///
/// The tick callback may act on the session, e.g. swap media and resume.
pub struct LiveScheduler {
    period: Duration,
}

impl LiveScheduler {
    pub fn new(refresh_hz: f64) -> Self {
        let hz = if refresh_hz.is_finite() && refresh_hz > 0.0 {
            refresh_hz
        } else {
            60.0
        };
        Self {
            period: Duration::from_secs_f64(1.0 / hz),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn run<F>(&self, session: &mut Session, mut token: CancelToken, mut on_tick: F) -> LiveSummary
    where
        F: FnMut(&mut Session, &TickOutput),
    {
        let mut interval = tokio::time::interval(self.period);
        // A late tick is dropped, never replayed in a burst
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let origin = Instant::now();
        let mut summary = LiveSummary::default();
        session.play();

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    log::info!("Live preview cancelled after {} ticks", summary.ticks);
                    break;
                }
                _ = interval.tick() => {
                    let out = session.tick(origin.elapsed().as_secs_f64());
                    summary.ticks += 1;
                    on_tick(session, &out);
                    let phase = session.phase();
                    if phase != Phase::Playing {
                        summary.ended = phase == Phase::Stopped;
                        break;
                    }
                }
            }
        }

        session.pause();
        summary
    }
}

/// Steps a session through a fixed frame grid on a virtual clock.
pub struct FrameDriver {
    fps: u32,
    total: usize,
    clock: FrameClock,
}

impl FrameDriver {
    pub fn new(fps: u32, duration: f64, clock: FrameClock) -> Self {
        let fps = fps.max(1);
        let total = if duration.is_finite() && duration > 0.0 {
            (duration * fps as f64).ceil() as usize
        } else {
            0
        };
        Self { fps, total, clock }
    }

    pub fn total_frames(&self) -> usize {
        self.total
    }

    pub fn frame_time(&self, index: usize) -> f64 {
        index as f64 / self.fps as f64
    }

    /// Play from the top and hand every frame's output to `on_frame`, in order.
    pub fn run<F>(&self, session: &mut Session, mut on_frame: F) -> Result<usize>
    where
        F: FnMut(usize, TickOutput) -> Result<()>,
    {
        self.clock.set(0.0);
        session.stop();
        session.play();

        for index in 0..self.total {
            let time = self.frame_time(index);
            self.clock.set(time);
            let out = session.tick(time);
            on_frame(index, out)?;
        }

        session.stop();
        log::debug!("Frame driver finished {} frames at {} fps", self.total, self.fps);
        Ok(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::AudioData;
    use crate::audio::source::PcmSource;
    use crate::engine::captions::{Caption, CaptionTrack};
    use crate::engine::session::MediaSwap;
    use crate::engine::EngineConfig;

    fn short_config(duration: f64) -> EngineConfig {
        EngineConfig {
            provisional_duration: duration,
            ..EngineConfig::default()
        }
    }

    #[test]
    fn frame_grid() {
        let driver = FrameDriver::new(30, 24.0, FrameClock::default());
        assert_eq!(driver.total_frames(), 720);
        assert_eq!(driver.frame_time(30), 1.0);
        assert_eq!(FrameDriver::new(30, 0.5, FrameClock::default()).total_frames(), 15);
        assert_eq!(FrameDriver::new(30, 0.51, FrameClock::default()).total_frames(), 16);
        assert_eq!(FrameDriver::new(30, f64::NAN, FrameClock::default()).total_frames(), 0);
    }

    #[test]
    fn drives_pcm_source_on_virtual_clock() {
        let clock = FrameClock::default();
        let audio = Arc::new(AudioData {
            samples: vec![0.2; 16_000],
            sample_rate: 8_000,
        });
        let source = PcmSource::new(audio, Box::new(clock.clone()));
        let captions = CaptionTrack::new(vec![Caption::new(1.0, 1.5, "mid")]).unwrap();
        let mut session = Session::new(EngineConfig::default(), Some(Box::new(source)), captions);

        let driver = FrameDriver::new(30, 2.0, clock);
        let mut times = Vec::new();
        let mut captioned = 0;
        let frames = driver
            .run(&mut session, |_, out| {
                assert_eq!(out.phase, Phase::Playing);
                times.push(out.time);
                captioned += out.caption.is_some() as usize;
                Ok(())
            })
            .unwrap();

        assert_eq!(frames, 60);
        for (i, t) in times.iter().enumerate() {
            assert!((t - i as f64 / 30.0).abs() < 1e-9);
        }
        assert_eq!(captioned, 15);
        assert_eq!(session.phase(), Phase::Stopped);
    }

    #[test]
    fn sourceless_export_matches_frame_times() {
        let mut session = Session::new(short_config(2.0), None, CaptionTrack::default());
        let driver = FrameDriver::new(10, 1.0, FrameClock::default());
        let mut times = Vec::new();
        driver
            .run(&mut session, |_, out| {
                assert!(out.degraded);
                times.push(out.time);
                Ok(())
            })
            .unwrap();
        assert_eq!(times.len(), 10);
        assert!((times[7] - 0.7).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_frames() {
        let render = || {
            let mut session = Session::new(short_config(3.0), None, CaptionTrack::default());
            let mut frames = Vec::new();
            FrameDriver::new(30, 3.0, FrameClock::default())
                .run(&mut session, |_, out| {
                    frames.push((out.snapshot, out.particles));
                    Ok(())
                })
                .unwrap();
            frames
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn frame_callback_error_aborts() {
        let mut session = Session::new(EngineConfig::default(), None, CaptionTrack::default());
        let driver = FrameDriver::new(30, 1.0, FrameClock::default());
        let err = driver.run(&mut session, |i, _| {
            if i == 3 {
                anyhow::bail!("disk full");
            }
            Ok(())
        });
        assert!(err.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn live_runs_until_playback_ends() {
        let mut session = Session::new(short_config(1.0), None, CaptionTrack::default());
        let (_handle, token) = cancellation();
        let scheduler = LiveScheduler::new(20.0);
        let mut last_time = 0.0;
        let summary = scheduler
            .run(&mut session, token, |_, out| {
                if out.phase == Phase::Playing {
                    assert!(out.time >= last_time);
                    last_time = out.time;
                }
            })
            .await;
        assert!(summary.ended);
        assert!(summary.ticks >= 20 && summary.ticks <= 22);
        assert_eq!(session.phase(), Phase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn callback_can_swap_media_and_resume() {
        let mut session = Session::new(short_config(1.0), None, CaptionTrack::default());
        let (_handle, token) = cancellation();
        let mut swapped = false;
        let summary = LiveScheduler::new(20.0)
            .run(&mut session, token, |session, out| {
                if !swapped && out.time >= 0.5 {
                    session.replace_media(MediaSwap::Audio(None));
                    session.play();
                    swapped = true;
                }
            })
            .await;
        assert!(swapped);
        assert!(summary.ended);
        // Half a second before the swap, then the full second again
        assert!(summary.ticks >= 30 && summary.ticks <= 34, "{} ticks", summary.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_and_pauses() {
        let mut session = Session::new(EngineConfig::default(), None, CaptionTrack::default());
        let (handle, token) = cancellation();
        let scheduler = LiveScheduler::new(60.0);
        let summary = scheduler
            .run(&mut session, token, |_, _| handle.cancel())
            .await;
        assert_eq!(summary.ticks, 1);
        assert!(!summary.ended);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_tick() {
        let mut session = Session::new(EngineConfig::default(), None, CaptionTrack::default());
        let (handle, token) = cancellation();
        handle.cancel();
        assert!(token.is_cancelled());
        let summary = LiveScheduler::new(60.0).run(&mut session, token, |_, _| {}).await;
        assert_eq!(summary.ticks, 0);
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn dropped_handle_never_cancels() {
        let (handle, mut token) = cancellation();
        drop(handle);
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
