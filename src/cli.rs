use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::render::frame::WaveformStyle;

#[derive(Parser, Debug)]
#[command(
    name = "audiogram",
    about = "Audiogram generator: live preview, per-frame values and video export"
)]
pub struct Cli {
    /// Config file (TOML). Defaults to ./audiogram.toml, then the user config dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the audiogram to a video file through ffmpeg
    Export(ExportArgs),
    /// Write the derived values of every frame as JSON Lines
    Frames(FramesArgs),
    /// Drive the session live against the wall clock
    Preview(PreviewArgs),
}

/// Inputs and engine tunables shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Input audio file (WAV, MP3, FLAC, OGG). Without one a synthetic spectrum is used
    pub input: Option<PathBuf>,

    /// Caption track (.json or .srt)
    #[arg(long)]
    pub captions: Option<PathBuf>,

    /// Plain transcript shown as a single caption over the whole clip
    #[arg(long, conflicts_with = "captions")]
    pub transcript: Option<String>,

    /// Clip length in seconds when there is no input audio
    #[arg(long)]
    pub duration: Option<f64>,

    /// Seed for the synthetic spectrum and particle placement
    #[arg(long)]
    pub seed: Option<u64>,

    /// Smoothing factor for the analyzer (0.0-1.0)
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Bass level that starts spawning particles (0.0-1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Maximum number of live particles
    #[arg(long)]
    pub max_particles: Option<usize>,
}

/// Canvas settings; frame values are laid out for the same card as the video.
#[derive(Args, Debug, Clone, Default)]
pub struct CanvasArgs {
    /// Video width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Video height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// Frames per second
    #[arg(long)]
    pub fps: Option<u32>,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub canvas: CanvasArgs,

    /// Output video file
    #[arg(short, long, default_value = "output.mp4")]
    pub output: PathBuf,

    /// Waveform style
    #[arg(long, value_enum)]
    pub style: Option<WaveformStyle>,

    /// Speaker portrait image (PNG or JPEG)
    #[arg(long)]
    pub portrait: Option<PathBuf>,

    /// TrueType font for captions and speaker info
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Speaker name shown over the portrait
    #[arg(long)]
    pub speaker_name: Option<String>,

    /// Speaker title
    #[arg(long)]
    pub speaker_title: Option<String>,

    /// Speaker role
    #[arg(long)]
    pub speaker_role: Option<String>,

    /// H.264 CRF quality (0-51, lower = better). Ignored when --bitrate is set.
    #[arg(long)]
    pub crf: Option<u32>,

    /// Video bitrate (e.g. 2400k, 5M). When set, uses -b:v instead of -crf.
    #[arg(short, long)]
    pub bitrate: Option<String>,

    /// FFmpeg video codec
    #[arg(long)]
    pub codec: Option<String>,

    /// FFmpeg pixel format
    #[arg(long)]
    pub pix_fmt: Option<String>,
}

#[derive(Args, Debug)]
pub struct FramesArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    #[command(flatten)]
    pub canvas: CanvasArgs,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Tick rate in Hz
    #[arg(long)]
    pub refresh: Option<f64>,

    /// Stop after this many seconds
    #[arg(long)]
    pub seconds: Option<f64>,

    /// Replace the audio once playback reaches SECS, then keep playing
    #[arg(long, value_name = "SECS:PATH", value_parser = parse_audio_swap)]
    pub swap_audio: Option<AudioSwap>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AudioSwap {
    pub at: f64,
    pub path: PathBuf,
}

fn parse_audio_swap(value: &str) -> Result<AudioSwap, String> {
    let (secs, path) = value
        .split_once(':')
        .ok_or_else(|| format!("expected SECS:PATH, got '{}'", value))?;
    let at: f64 = secs
        .trim()
        .parse()
        .map_err(|_| format!("invalid swap time '{}'", secs))?;
    if !(at.is_finite() && at >= 0.0) {
        return Err(format!("swap time must be non-negative, got {}", at));
    }
    if path.is_empty() {
        return Err("missing audio path".to_string());
    }
    Ok(AudioSwap {
        at,
        path: PathBuf::from(path),
    })
}
