const REFERENCE_WIDTH: f32 = 1920.0;
const REFERENCE_HEIGHT: f32 = 1080.0;

const PADDING: f32 = 40.0;
const PORTRAIT_FRACTION: f32 = 0.45;
const PLAY_BUTTON: f32 = 64.0;
const BARS_HEIGHT: f32 = 80.0;
const PROGRESS_HEIGHT: f32 = 6.0;
const PROGRESS_GAP: f32 = 16.0;
const BUTTON_GAP: f32 = 24.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x - 1e-3
            && other.y >= self.y - 1e-3
            && other.right() <= self.right() + 1e-3
            && other.bottom() <= self.bottom() + 1e-3
    }
}

/// Regions of the audiogram card, scaled from a 1920x1080 reference.
///
/// The card holds the portrait on the left; the right panel stacks the
/// caption area over a strip containing the play button, waveform and
/// progress bar.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CardLayout {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub card: Rect,
    pub portrait: Rect,
    pub caption: Rect,
    pub strip: Rect,
    pub play_button: Rect,
    pub waveform: Rect,
    pub progress: Rect,
}

impl CardLayout {
    pub fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        let scale = (w / REFERENCE_WIDTH).min(h / REFERENCE_HEIGHT);
        let pad = PADDING * scale;

        let card = Rect::new(pad, pad, w - 2.0 * pad, h - 2.0 * pad);
        let portrait_width = (card.width * PORTRAIT_FRACTION).round();
        let portrait = Rect::new(card.x, card.y, portrait_width, card.height);

        let panel = Rect::new(portrait.right(), card.y, card.width - portrait_width, card.height);
        let strip_height = 2.0 * pad + (BARS_HEIGHT + PROGRESS_GAP + PROGRESS_HEIGHT) * scale;
        let strip = Rect::new(panel.x, panel.bottom() - strip_height, panel.width, strip_height);
        let caption = Rect::new(
            panel.x + pad,
            panel.y + pad,
            panel.width - 2.0 * pad,
            strip.y - panel.y - 2.0 * pad,
        );

        let button = PLAY_BUTTON * scale;
        let bars_height = BARS_HEIGHT * scale;
        let bars_y = strip.y + pad;
        let play_button = Rect::new(
            strip.x + pad,
            bars_y + (bars_height - button) / 2.0,
            button,
            button,
        );
        let inner_x = play_button.right() + BUTTON_GAP * scale;
        let inner_width = strip.right() - pad - inner_x;
        let waveform = Rect::new(inner_x, bars_y, inner_width, bars_height);
        let progress = Rect::new(
            inner_x,
            waveform.bottom() + PROGRESS_GAP * scale,
            inner_width,
            PROGRESS_HEIGHT * scale,
        );

        Self {
            width,
            height,
            scale,
            card,
            portrait,
            caption,
            strip,
            play_button,
            waveform,
            progress,
        }
    }
}
