use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use super::decode::AudioData;
use super::tap::{PcmTap, SpectrumTap};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("no signal source is loaded")]
    Missing,
    #[error("source contains no audio samples")]
    Empty,
    #[error("source already feeds an analyzer")]
    AlreadyTapped,
    #[error("playback refused: {0}")]
    Refused(String),
}

/// Notifications a source raises between ticks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SourceEvent {
    /// True duration is known.
    MetadataReady { duration: f64 },
    /// Playback reached the end of the stream.
    Ended,
}

/// A playable audio stream the engine samples but does not own the transport of.
pub trait SignalSource {
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn play(&mut self) -> Result<(), SourceError>;
    fn pause(&mut self);
    fn rewind(&mut self);
    /// Drain events raised since the last call.
    fn poll_events(&mut self) -> Vec<SourceEvent>;
    /// Open the analysis tap. At most one tap may be held at a time.
    fn open_tap(&mut self, fft_size: usize) -> Result<Box<dyn SpectrumTap>, SourceError>;
}

/// Time base a source advances against.
pub trait Clock {
    fn now(&self) -> f64;
}

pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Virtual clock set explicitly by the offline frame driver.
#[derive(Clone, Debug, Default)]
pub struct FrameClock {
    time: Rc<Cell<f64>>,
}

impl FrameClock {
    pub fn set(&self, time: f64) {
        self.time.set(time);
    }
}

impl Clock for FrameClock {
    fn now(&self) -> f64 {
        self.time.get()
    }
}

/// File-backed source: decoded PCM played against an injected clock.
pub struct PcmSource {
    audio: Arc<AudioData>,
    clock: Box<dyn Clock>,
    position: f64,
    started_at: Option<f64>,
    metadata_pending: bool,
    tap_held: Rc<Cell<bool>>,
}

impl PcmSource {
    pub fn new(audio: Arc<AudioData>, clock: Box<dyn Clock>) -> Self {
        Self {
            audio,
            clock,
            position: 0.0,
            started_at: None,
            metadata_pending: true,
            tap_held: Rc::new(Cell::new(false)),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    fn playhead(&self) -> f64 {
        let t = match self.started_at {
            Some(start) => self.position + (self.clock.now() - start).max(0.0),
            None => self.position,
        };
        t.min(self.audio.duration())
    }
}

impl SignalSource for PcmSource {
    fn current_time(&self) -> f64 {
        self.playhead()
    }

    fn duration(&self) -> Option<f64> {
        (!self.metadata_pending).then(|| self.audio.duration())
    }

    fn play(&mut self) -> Result<(), SourceError> {
        if self.audio.samples.is_empty() {
            return Err(SourceError::Empty);
        }
        if self.started_at.is_none() {
            self.started_at = Some(self.clock.now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.started_at.is_some() {
            self.position = self.playhead();
            self.started_at = None;
        }
    }

    fn rewind(&mut self) {
        self.position = 0.0;
        if self.started_at.is_some() {
            self.started_at = Some(self.clock.now());
        }
    }

    fn poll_events(&mut self) -> Vec<SourceEvent> {
        let mut events = Vec::new();
        if self.metadata_pending {
            self.metadata_pending = false;
            events.push(SourceEvent::MetadataReady {
                duration: self.audio.duration(),
            });
        }
        if self.is_playing() && self.playhead() >= self.audio.duration() {
            // Next play starts over, like a media element after `ended`
            self.started_at = None;
            self.position = 0.0;
            events.push(SourceEvent::Ended);
        }
        events
    }

    fn open_tap(&mut self, fft_size: usize) -> Result<Box<dyn SpectrumTap>, SourceError> {
        if self.tap_held.get() {
            return Err(SourceError::AlreadyTapped);
        }
        Ok(Box::new(PcmTap::new(
            self.audio.clone(),
            fft_size,
            self.tap_held.clone(),
        )))
    }
}
