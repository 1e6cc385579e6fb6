use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A timed line of transcript, active on `[start, end)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Caption {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Caption {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }
}

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption {index} has start {start} not before end {end}")]
    EmptyInterval { index: usize, start: f64, end: f64 },
    #[error("caption {index} starts at {start}, before the previous caption ends at {previous_end}")]
    Overlap {
        index: usize,
        start: f64,
        previous_end: f64,
    },
    #[error("SubRip line {line}: {reason}")]
    SubRip { line: usize, reason: String },
    #[error("invalid caption JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to read captions: {0}")]
    Io(#[from] std::io::Error),
}

/// A validated caption list: sorted by start, non-overlapping, non-empty intervals.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptionTrack {
    captions: Vec<Caption>,
}

impl CaptionTrack {
    pub fn new(captions: Vec<Caption>) -> Result<Self, CaptionError> {
        let mut previous_end = f64::NEG_INFINITY;
        for (index, c) in captions.iter().enumerate() {
            if !(c.start < c.end) {
                return Err(CaptionError::EmptyInterval {
                    index,
                    start: c.start,
                    end: c.end,
                });
            }
            if c.start < previous_end {
                return Err(CaptionError::Overlap {
                    index,
                    start: c.start,
                    previous_end,
                });
            }
            previous_end = c.end;
        }
        Ok(Self { captions })
    }

    /// One caption spanning the whole clip, for a bare transcript.
    pub fn single(text: &str, duration: f64) -> Self {
        let text = text.trim();
        if text.is_empty() || !(duration > 0.0) {
            return Self::default();
        }
        Self {
            captions: vec![Caption::new(0.0, duration, text)],
        }
    }

    /// Load a `.srt` file, or a JSON array of `{start, end, text}` otherwise.
    pub fn load(path: &Path) -> Result<Self, CaptionError> {
        let content = std::fs::read_to_string(path)?;
        let is_srt = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("srt"));
        let track = if is_srt {
            Self::from_srt(&content)?
        } else {
            Self::from_json(&content)?
        };
        log::info!("Loaded {} captions from {}", track.len(), path.display());
        Ok(track)
    }

    pub fn from_json(content: &str) -> Result<Self, CaptionError> {
        let captions: Vec<Caption> = serde_json::from_str(content)?;
        Self::new(captions)
    }

    pub fn from_srt(content: &str) -> Result<Self, CaptionError> {
        let mut captions = Vec::new();
        let mut lines = content.lines().enumerate().peekable();

        while let Some((n, line)) = lines.next() {
            let line = line.trim().trim_start_matches('\u{feff}');
            if line.is_empty() {
                continue;
            }

            // Optional numeric counter line
            let (timing_no, timing) = if line.chars().all(|c| c.is_ascii_digit()) {
                match lines.next() {
                    Some((m, l)) => (m, l.trim()),
                    None => {
                        return Err(CaptionError::SubRip {
                            line: n + 1,
                            reason: "cue number without timing".into(),
                        })
                    }
                }
            } else {
                (n, line)
            };

            let (start, end) = parse_srt_timing(timing).ok_or_else(|| CaptionError::SubRip {
                line: timing_no + 1,
                reason: format!("expected `start --> end`, got {:?}", timing),
            })?;

            let mut text = String::new();
            while let Some((_, l)) = lines.peek() {
                let l = l.trim();
                if l.is_empty() {
                    break;
                }
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(l);
                lines.next();
            }

            captions.push(Caption::new(start, end, text));
        }

        Self::new(captions)
    }

    pub fn len(&self) -> usize {
        self.captions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captions.is_empty()
    }

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    pub fn select(&self, time: f64) -> Option<&Caption> {
        select(time, &self.captions)
    }
}

/// The caption active at `time`, if any.
///
/// `captions` must be sorted by start; the upper bound is exclusive, so a
/// timestamp shared by two adjacent captions selects the later one.
pub fn select(time: f64, captions: &[Caption]) -> Option<&Caption> {
    let idx = captions.partition_point(|c| c.start <= time);
    if idx == 0 {
        return None;
    }
    let caption = &captions[idx - 1];
    caption.contains(time).then_some(caption)
}

fn parse_srt_timing(line: &str) -> Option<(f64, f64)> {
    let (start, rest) = line.split_once("-->")?;
    // Trailing position hints ("X1:...") follow the end stamp
    let end = rest.split_whitespace().next()?;
    Some((parse_srt_timestamp(start.trim())?, parse_srt_timestamp(end)?))
}

fn parse_srt_timestamp(stamp: &str) -> Option<f64> {
    let (hms, millis) = stamp.split_once([',', '.']).unwrap_or((stamp, "0"));
    let mut parts = hms.split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || m >= 60 || s >= 60 {
        return None;
    }
    let frac: f64 = format!("0.{}", millis).parse().ok()?;
    Some((h * 3600 + m * 60 + s) as f64 + frac)
}
