use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use serde::Deserialize;

use crate::engine::liquid::liquid_outline;
use crate::engine::session::{Phase, TickOutput};

use super::canvas::{gradient, with_alpha, Canvas, Rgba};
use super::layout::{CardLayout, Rect};
use super::text::TextOverlay;

const BACKGROUND: Rgba = [0x2a, 0x2a, 0x2a, 255];
const CARD: Rgba = [0xfa, 0xf8, 0xf5, 255];
const STRIP: Rgba = [0xf5, 0xf2, 0xed, 255];
const TRACK: Rgba = [0xe8, 0xe4, 0xde, 255];
const ACCENT: Rgba = [0xc8, 0x4c, 0x21, 255];
const CAPTION_TEXT: Rgba = [0x3d, 0x3d, 0x3d, 255];
const PLACEHOLDER_TEXT: Rgba = [0x8a, 0x8a, 0x8a, 128];
const SPEAKER_BAND: Rgba = [0, 0, 0, 140];
const WHITE: Rgba = [255, 255, 255, 255];

const WAVEFORM_GRADIENT: [Rgba; 6] = [
    [0xff, 0x55, 0x00, 255],
    [0xff, 0xaa, 0x00, 255],
    [0xff, 0xdd, 0x00, 255],
    [0xff, 0x00, 0x80, 255],
    [0xb3, 0x00, 0xff, 255],
    [0x00, 0x66, 0xff, 255],
];

const PLACEHOLDER: &str = "Press play to listen";
const CAPTION_FADE: f64 = 0.4;
const CAPTION_SIZE: f32 = 44.0;
const LABEL_SIZE: f32 = 28.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WaveformStyle {
    #[default]
    Bars,
    Liquid,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SpeakerInfo {
    pub name: Option<String>,
    pub title: Option<String>,
    pub role: Option<String>,
}

impl SpeakerInfo {
    fn subtitle(&self) -> Option<String> {
        match (&self.title, &self.role) {
            (Some(t), Some(r)) => Some(format!("{} · {}", t, r)),
            (Some(s), None) | (None, Some(s)) => Some(s.clone()),
            (None, None) => None,
        }
    }
}

pub fn load_portrait(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("Failed to open portrait: {}", path.display()))
}

struct Fonts {
    caption: TextOverlay,
    label: TextOverlay,
}

/// Rasterizes one `TickOutput` into an RGBA audiogram card.
pub struct FrameComposer {
    layout: CardLayout,
    style: WaveformStyle,
    portrait: Option<RgbaImage>,
    fonts: Option<Fonts>,
    speaker: SpeakerInfo,
}

impl FrameComposer {
    pub fn new(layout: CardLayout, style: WaveformStyle) -> Self {
        Self {
            layout,
            style,
            portrait: None,
            fonts: None,
            speaker: SpeakerInfo::default(),
        }
    }

    /// Crop-to-fill the portrait region.
    pub fn with_portrait(mut self, image: &DynamicImage) -> Self {
        let region = self.layout.portrait;
        let (w, h) = (region.width.round() as u32, region.height.round() as u32);
        if w > 0 && h > 0 {
            self.portrait = Some(image.resize_to_fill(w, h, FilterType::Triangle).to_rgba8());
        }
        self
    }

    pub fn with_font(mut self, font: TextOverlay) -> Self {
        let scale = self.layout.scale;
        self.fonts = Some(Fonts {
            caption: font.sized(CAPTION_SIZE * scale),
            label: font.sized(LABEL_SIZE * scale),
        });
        self
    }

    pub fn with_speaker(mut self, speaker: SpeakerInfo) -> Self {
        self.speaker = speaker;
        self
    }

    pub fn compose(&self, out: &TickOutput) -> Vec<u8> {
        let layout = &self.layout;
        let mut canvas = Canvas::new(layout.width, layout.height, BACKGROUND);

        canvas.fill_rect(layout.card, CARD);
        match &self.portrait {
            Some(img) => canvas.blit(img, layout.portrait.x.round() as i32, layout.portrait.y.round() as i32, 1.0),
            None => canvas.fill_rect(layout.portrait, TRACK),
        }
        self.draw_speaker(&mut canvas);

        canvas.fill_rect(layout.strip, STRIP);
        self.draw_play_button(&mut canvas, out.phase == Phase::Playing);
        match self.style {
            WaveformStyle::Bars => self.draw_bars(&mut canvas, out),
            WaveformStyle::Liquid => self.draw_liquid(&mut canvas, out),
        }
        self.draw_progress(&mut canvas, out.progress);
        self.draw_particles(&mut canvas, out);
        self.draw_caption(&mut canvas, out);

        canvas.into_pixels()
    }

    fn draw_bars(&self, canvas: &mut Canvas, out: &TickOutput) {
        let area = self.layout.waveform;
        let last = out.bars.len().saturating_sub(1).max(1) as f32;
        for bar in &out.bars {
            let color = gradient(&WAVEFORM_GRADIENT, bar.index as f32 / last);
            let rect = Rect::new(area.x + bar.x, area.y + bar.y, bar.width, bar.height);
            canvas.fill_pill(rect, color);
        }
    }

    fn draw_liquid(&self, canvas: &mut Canvas, out: &TickOutput) {
        let area = self.layout.waveform;
        let outline = liquid_outline(&out.snapshot, area.width, area.height, out.phase == Phase::Playing);
        let columns = area.width.round() as i32;
        for col in 0..columns {
            let Some((top, bottom)) = outline.span_at(col as f32 + 0.5) else {
                continue;
            };
            let color = gradient(&WAVEFORM_GRADIENT, col as f32 / columns.max(1) as f32);
            canvas.fill_column(area.x.round() as i32 + col, area.y + top, area.y + bottom, color);
        }
    }

    fn draw_play_button(&self, canvas: &mut Canvas, playing: bool) {
        let button = self.layout.play_button;
        let (cx, cy) = button.center();
        let r = button.width / 2.0;
        canvas.fill_circle(cx, cy, r, ACCENT);

        if playing {
            let (bw, bh) = (r * 0.22, r * 0.8);
            canvas.fill_rect(Rect::new(cx - bw * 1.5, cy - bh / 2.0, bw, bh), WHITE);
            canvas.fill_rect(Rect::new(cx + bw * 0.5, cy - bh / 2.0, bw, bh), WHITE);
        } else {
            let s = r * 0.45;
            canvas.fill_triangle((cx - s * 0.7, cy - s), (cx - s * 0.7, cy + s), (cx + s, cy), WHITE);
        }
    }

    fn draw_progress(&self, canvas: &mut Canvas, progress: f32) {
        let track = self.layout.progress;
        canvas.fill_pill(track, TRACK);
        let filled = track.width * (progress / 100.0).clamp(0.0, 1.0);
        if filled > 0.0 {
            canvas.fill_pill(Rect::new(track.x, track.y, filled, track.height), ACCENT);
        }
    }

    fn draw_particles(&self, canvas: &mut Canvas, out: &TickOutput) {
        let field = self.layout.caption;
        for particle in &out.particles {
            let sprite = particle.sprite(out.time, field.height);
            if sprite.opacity <= 0.0 {
                continue;
            }
            canvas.fill_circle(
                field.x + sprite.x,
                field.bottom() - sprite.rise,
                sprite.size * self.layout.scale / 2.0,
                with_alpha(ACCENT, sprite.opacity),
            );
        }
    }

    fn draw_caption(&self, canvas: &mut Canvas, out: &TickOutput) {
        let Some(fonts) = &self.fonts else {
            return;
        };
        let area = self.layout.caption;

        let (text, color) = match &out.caption {
            Some(caption) => {
                let fade = ((out.time - caption.start) / CAPTION_FADE).clamp(0.0, 1.0) as f32;
                (caption.text.as_str(), with_alpha(CAPTION_TEXT, fade))
            }
            None if out.phase != Phase::Playing => (PLACEHOLDER, PLACEHOLDER_TEXT),
            None => return,
        };

        let font = &fonts.caption;
        let lines = font.wrap(text, area.width);
        let line_height = font.line_height();
        let block = lines.len() as f32 * line_height;
        let mut y = area.y + ((area.height - block) / 2.0).max(0.0);
        for line in &lines {
            if y + line_height > area.bottom() {
                break;
            }
            font.composite(canvas, line, area.x, y, color);
            y += line_height;
        }
    }

    fn draw_speaker(&self, canvas: &mut Canvas) {
        let (Some(fonts), Some(name)) = (&self.fonts, &self.speaker.name) else {
            return;
        };
        let portrait = self.layout.portrait;
        let pad = 24.0 * self.layout.scale;
        let subtitle = self.speaker.subtitle();

        let name_height = fonts.caption.line_height();
        let sub_height = if subtitle.is_some() {
            fonts.label.line_height()
        } else {
            0.0
        };
        let band_height = name_height + sub_height + 2.0 * pad;
        let band = Rect::new(portrait.x, portrait.bottom() - band_height, portrait.width, band_height);
        canvas.fill_rect(band, SPEAKER_BAND);

        let x = band.x + pad;
        fonts.caption.composite(canvas, name, x, band.y + pad, WHITE);
        if let Some(sub) = subtitle {
            fonts
                .label
                .composite(canvas, &sub, x, band.y + pad + name_height, with_alpha(WHITE, 0.8));
        }
    }
}
