use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;

use crate::audio::source::FrameClock;
use crate::cli::{CanvasArgs, ExportArgs, FramesArgs};
use crate::config::{Config, OutputConfig};
use crate::encode::ffmpeg::{EncodeSettings, FfmpegEncoder};
use crate::engine::bars::Bar;
use crate::engine::particles::ParticleSprite;
use crate::engine::session::{Phase, TickOutput};
use crate::render::frame::{load_portrait, FrameComposer, SpeakerInfo};
use crate::render::layout::CardLayout;
use crate::render::text::{find_system_font, TextOverlay};
use crate::scheduler::FrameDriver;
use crate::setup::Prepared;

/// Frames rasterized in parallel before being written in order.
const RASTER_BATCH: usize = 64;

fn frame_progress(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta} remaining)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);
    pb
}

fn canvas_size(canvas: &CanvasArgs, output: &OutputConfig) -> (u32, u32, u32) {
    (
        canvas.width.unwrap_or(output.width).max(2),
        canvas.height.unwrap_or(output.height).max(2),
        canvas.fps.unwrap_or(output.fps).max(1),
    )
}

pub fn run_export(args: &ExportArgs, config: &Config) -> Result<()> {
    let (width, height, fps) = canvas_size(&args.canvas, &config.output);
    let layout = CardLayout::new(width, height);

    let mut prepared = Prepared::load(&args.session, config)?;
    prepared.fit_to(&layout);

    let style = args.style.unwrap_or(config.output.style);
    let mut composer = FrameComposer::new(layout, style);

    if let Some(path) = args.portrait.as_ref().or(config.speaker.portrait.as_ref()) {
        composer = composer.with_portrait(&load_portrait(path)?);
    }

    let font_path = args
        .font
        .clone()
        .or_else(|| config.output.font.clone())
        .or_else(find_system_font);
    match font_path {
        Some(path) => composer = composer.with_font(TextOverlay::from_file(&path, 44.0)?),
        None => log::warn!("No font found; captions and speaker info will not be drawn"),
    }

    let speaker = SpeakerInfo {
        name: args.speaker_name.clone().or_else(|| config.speaker.info.name.clone()),
        title: args.speaker_title.clone().or_else(|| config.speaker.info.title.clone()),
        role: args.speaker_role.clone().or_else(|| config.speaker.info.role.clone()),
    };
    composer = composer.with_speaker(speaker);

    let settings = EncodeSettings {
        output: args.output.clone(),
        width,
        height,
        fps,
        codec: args.codec.clone().unwrap_or_else(|| config.output.codec.clone()),
        pix_fmt: args.pix_fmt.clone().unwrap_or_else(|| config.output.pix_fmt.clone()),
        crf: args.crf.unwrap_or(config.output.crf),
        bitrate: args.bitrate.clone().or_else(|| config.output.bitrate.clone()),
    };

    let clock = FrameClock::default();
    let mut session = prepared.session(Box::new(clock.clone()));
    let driver = FrameDriver::new(fps, prepared.duration, clock);
    let total = driver.total_frames();

    log::info!("Output: {}", args.output.display());
    log::info!("Resolution: {}x{} @ {}fps, style {:?}", width, height, fps, style);
    log::info!("Total frames: {}, Duration: {:.1}s", total, prepared.duration);
    log::info!("Starting FFmpeg encoder...");
    let audio_path = prepared.audio.as_ref().and(args.session.input.as_deref());
    let mut encoder = FfmpegEncoder::new(&settings, audio_path)?;

    let pb = frame_progress(total);
    let mut batch: Vec<TickOutput> = Vec::with_capacity(RASTER_BATCH);
    let mut written = 0usize;

    let mut flush = |batch: &mut Vec<TickOutput>, encoder: &mut FfmpegEncoder| -> Result<()> {
        let frames: Vec<Vec<u8>> = batch.par_iter().map(|out| composer.compose(out)).collect();
        for pixels in &frames {
            encoder.write_frame(pixels)?;
        }
        written += frames.len();
        pb.set_position(written as u64);
        batch.clear();
        Ok(())
    };

    driver.run(&mut session, |_, out| {
        batch.push(out);
        if batch.len() == RASTER_BATCH {
            flush(&mut batch, &mut encoder)?;
        }
        Ok(())
    })?;
    flush(&mut batch, &mut encoder)?;

    pb.finish_with_message("Rendering complete");

    log::info!("Finishing encoding...");
    encoder.finish()?;

    log::info!("Done! Output: {}", args.output.display());
    Ok(())
}

/// One line of the frame dump.
#[derive(Serialize)]
pub struct FrameValues<'a> {
    pub frame: usize,
    pub time: f64,
    pub duration: f64,
    pub phase: Phase,
    pub degraded: bool,
    pub bass_level: f32,
    pub progress: f32,
    pub caption: Option<&'a str>,
    pub bins: &'a [u8],
    pub bars: &'a [Bar],
    pub particles: Vec<ParticleSprite>,
}

impl<'a> FrameValues<'a> {
    pub fn new(frame: usize, out: &'a TickOutput, field_height: f32) -> Self {
        Self {
            frame,
            time: out.time,
            duration: out.duration,
            phase: out.phase,
            degraded: out.degraded,
            bass_level: out.bass_level,
            progress: out.progress,
            caption: out.caption.as_ref().map(|c| c.text.as_str()),
            bins: out.snapshot.bins(),
            bars: &out.bars,
            particles: out
                .particles
                .iter()
                .map(|p| p.sprite(out.time, field_height))
                .collect(),
        }
    }
}

pub fn run_frames(args: &FramesArgs, config: &Config) -> Result<()> {
    let (width, height, fps) = canvas_size(&args.canvas, &config.output);
    let layout = CardLayout::new(width, height);

    let mut prepared = Prepared::load(&args.session, config)?;
    prepared.fit_to(&layout);

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout().lock()),
    };

    let clock = FrameClock::default();
    let mut session = prepared.session(Box::new(clock.clone()));
    let driver = FrameDriver::new(fps, prepared.duration, clock);
    let frames = write_frames(&driver, &mut session, prepared.engine.particle_field.height, writer)?;

    log::info!("Wrote {} frames", frames);
    Ok(())
}

fn write_frames(
    driver: &FrameDriver,
    session: &mut crate::engine::session::Session,
    field_height: f32,
    writer: impl Write,
) -> Result<usize> {
    let mut out = BufWriter::new(writer);
    let frames = driver.run(session, |index, tick| {
        serde_json::to_writer(&mut out, &FrameValues::new(index, &tick, field_height))?;
        out.write_all(b"\n")?;
        Ok(())
    })?;
    out.flush().context("Failed to flush frame dump")?;
    Ok(frames)
}
