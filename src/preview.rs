use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::audio::decode::decode_audio;
use crate::audio::source::{PcmSource, SignalSource, WallClock};
use crate::cli::PreviewArgs;
use crate::config::Config;
use crate::engine::session::{MediaSwap, Phase, Session, TickOutput};
use crate::render::layout::CardLayout;
use crate::scheduler::{cancellation, CancelHandle, LiveScheduler, LiveSummary};
use crate::setup::Prepared;

pub fn run_preview(args: &PreviewArgs, config: &Config) -> Result<()> {
    let mut prepared = Prepared::load(&args.session, config)?;
    prepared.fit_to(&CardLayout::new(config.output.width, config.output.height));

    let refresh = args.refresh.unwrap_or(config.visual.refresh_hz);
    let mut session = prepared.session(Box::new(WallClock::new()));
    let scheduler = LiveScheduler::new(refresh);

    // Decoded up front so the swap itself never stalls a tick
    let mut pending = match &args.swap_audio {
        Some(swap) => {
            let audio = decode_audio(&swap.path)?;
            let source = PcmSource::new(Arc::new(audio), Box::new(WallClock::new()));
            Some(PendingSwap {
                at: swap.at,
                source: Box::new(source),
            })
        }
        None => None,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start preview runtime")?;

    log::info!(
        "Previewing {:.1}s at {:.0} Hz (Ctrl-C to stop)",
        prepared.duration,
        1.0 / scheduler.period().as_secs_f64()
    );

    let pb = ProgressBar::new(1000);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
    pb.set_style(style);

    let summary = runtime.block_on(async {
        let (handle, token) = cancellation();
        tokio::spawn(cancel_on_ctrl_c(handle.clone()));
        if let Some(seconds) = args.seconds.filter(|s| *s > 0.0) {
            tokio::spawn(cancel_after(handle, Duration::from_secs_f64(seconds)));
        }

        let mut reporter = Reporter::new(&pb);
        scheduler
            .run(&mut session, token, |session, out| {
                reporter.observe(out);
                if swap_if_due(&mut pending, session, out.time) {
                    pb.set_position(0);
                }
            })
            .await
    });

    report_summary(&pb, summary);
    Ok(())
}

/// Audio queued to replace the current source once playback reaches `at`.
struct PendingSwap {
    at: f64,
    source: Box<dyn SignalSource>,
}

/// Apply the queued swap if it is due and resume playback on the new source.
fn swap_if_due(pending: &mut Option<PendingSwap>, session: &mut Session, time: f64) -> bool {
    if !pending.as_ref().is_some_and(|swap| time >= swap.at) {
        return false;
    }
    let Some(swap) = pending.take() else {
        return false;
    };
    log::info!("Swapping audio at {:.2}s", time);
    session.replace_media(MediaSwap::Audio(Some(swap.source)));
    session.play();
    true
}

async fn cancel_on_ctrl_c(handle: CancelHandle) {
    if tokio::signal::ctrl_c().await.is_ok() {
        handle.cancel();
    }
}

async fn cancel_after(handle: CancelHandle, after: Duration) {
    tokio::time::sleep(after).await;
    log::info!("Preview time limit reached");
    handle.cancel();
}

fn report_summary(pb: &ProgressBar, summary: LiveSummary) {
    if summary.ended {
        pb.finish_with_message("Playback finished");
    } else {
        pb.abandon_with_message("Stopped");
    }
    log::info!("Preview ran {} ticks", summary.ticks);
}

/// Mirrors tick output onto the progress bar and logs caption changes.
struct Reporter<'a> {
    pb: &'a ProgressBar,
    caption: Option<String>,
    degraded: bool,
}

impl<'a> Reporter<'a> {
    fn new(pb: &'a ProgressBar) -> Self {
        Self {
            pb,
            caption: None,
            degraded: false,
        }
    }

    fn observe(&mut self, out: &TickOutput) {
        if out.degraded && !self.degraded {
            log::warn!("Running on the synthetic timer");
        }
        self.degraded = out.degraded;

        let text = out.caption.as_ref().map(|c| c.text.clone());
        if text != self.caption {
            if let Some(t) = &text {
                log::info!("[{:6.2}s / {:.2}s] {}", out.time, out.duration, t);
            }
            self.caption = text;
        }

        if out.phase == Phase::Playing {
            self.pb.set_position((out.progress * 10.0).round() as u64);
        }
        self.pb.set_message(format!(
            "bass {:.2} | {} particles | {}",
            out.bass_level,
            out.particles.len(),
            self.caption.as_deref().unwrap_or("")
        ));
    }
}
