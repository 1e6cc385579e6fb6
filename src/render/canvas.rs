use image::RgbaImage;

use super::layout::Rect;

pub type Rgba = [u8; 4];

/// Linear interpolation between two colors, `t` in [0, 1].
pub fn mix(a: Rgba, b: Rgba, t: f32) -> Rgba {
    let t = t.clamp(0.0, 1.0);
    let lerp = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]), lerp(a[3], b[3])]
}

/// Color at position `t` along evenly spaced gradient stops.
pub fn gradient(stops: &[Rgba], t: f32) -> Rgba {
    match stops.len() {
        0 => [0, 0, 0, 255],
        1 => stops[0],
        n => {
            let pos = t.clamp(0.0, 1.0) * (n - 1) as f32;
            let i = (pos.floor() as usize).min(n - 2);
            mix(stops[i], stops[i + 1], pos - i as f32)
        }
    }
}

pub fn with_alpha(color: Rgba, opacity: f32) -> Rgba {
    [
        color[0],
        color[1],
        color[2],
        (color[3] as f32 * opacity.clamp(0.0, 1.0)).round() as u8,
    ]
}

/// CPU RGBA framebuffer.
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba) -> Self {
        let pixels = background
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[idx..idx + 4];
        Some([p[0], p[1], p[2], p[3]])
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// Source-over blend of `color` at `coverage` onto one pixel.
    pub fn blend(&mut self, x: i32, y: i32, color: Rgba, coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let a = color[3] as f32 / 255.0 * coverage.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let inv = 1.0 - a;
        for c in 0..3 {
            let dst = self.pixels[idx + c] as f32;
            self.pixels[idx + c] = (color[c] as f32 * a + dst * inv).round() as u8;
        }
        self.pixels[idx + 3] = 255;
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let x0 = rect.x.round().max(0.0) as i32;
        let y0 = rect.y.round().max(0.0) as i32;
        let x1 = rect.right().round().min(self.width as f32) as i32;
        let y1 = rect.bottom().round().min(self.height as f32) as i32;
        for y in y0..y1 {
            for x in x0..x1 {
                self.blend(x, y, color, 1.0);
            }
        }
    }

    /// Rectangle with fully rounded short ends, as used for bars and tracks.
    pub fn fill_pill(&mut self, rect: Rect, color: Rgba) {
        let r = rect.width.min(rect.height) / 2.0;
        if r < 1.0 {
            self.fill_rect(rect, color);
            return;
        }
        let y0 = rect.y.floor().max(0.0) as i32;
        let y1 = rect.bottom().ceil().min(self.height as f32) as i32;
        let x0 = rect.x.floor().max(0.0) as i32;
        let x1 = rect.right().ceil().min(self.width as f32) as i32;
        for y in y0..y1 {
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                // Distance to the capsule's core segment
                let cx = px.clamp(rect.x + r, rect.right() - r);
                let cy = py.clamp(rect.y + r, rect.bottom() - r);
                let d = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                self.blend(x, y, color, r + 0.5 - d);
            }
        }
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba) {
        if radius <= 0.0 {
            return;
        }
        let y0 = (cy - radius).floor() as i32;
        let y1 = (cy + radius).ceil() as i32;
        let x0 = (cx - radius).floor() as i32;
        let x1 = (cx + radius).ceil() as i32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
                self.blend(x, y, color, radius + 0.5 - d);
            }
        }
    }

    pub fn fill_triangle(&mut self, a: (f32, f32), b: (f32, f32), c: (f32, f32), color: Rgba) {
        let edge = |p: (f32, f32), q: (f32, f32), x: f32, y: f32| (q.0 - p.0) * (y - p.1) - (q.1 - p.1) * (x - p.0);
        let area = edge(a, b, c.0, c.1);
        if area.abs() < f32::EPSILON {
            return;
        }
        let x0 = a.0.min(b.0).min(c.0).floor() as i32;
        let x1 = a.0.max(b.0).max(c.0).ceil() as i32;
        let y0 = a.1.min(b.1).min(c.1).floor() as i32;
        let y1 = a.1.max(b.1).max(c.1).ceil() as i32;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b, c, px, py) / area;
                let w1 = edge(c, a, px, py) / area;
                let w2 = edge(a, b, px, py) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.blend(x, y, color, 1.0);
                }
            }
        }
    }

    /// One-pixel-wide vertical run from `top` to `bottom`, antialiased at the ends.
    pub fn fill_column(&mut self, x: i32, top: f32, bottom: f32, color: Rgba) {
        if bottom <= top {
            return;
        }
        let y0 = top.floor() as i32;
        let y1 = bottom.ceil() as i32;
        for y in y0..y1 {
            let lo = (y as f32).max(top);
            let hi = ((y + 1) as f32).min(bottom);
            self.blend(x, y, color, hi - lo);
        }
    }

    pub fn blit(&mut self, image: &RgbaImage, x: i32, y: i32, opacity: f32) {
        for (ix, iy, px) in image.enumerate_pixels() {
            let color = with_alpha(px.0, opacity);
            self.blend(x + ix as i32, y + iy as i32, color, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [255, 255, 255, 255];
    const BLACK: Rgba = [0, 0, 0, 255];

    #[test]
    fn gradient_hits_stops() {
        let stops = [BLACK, WHITE, BLACK];
        assert_eq!(gradient(&stops, 0.0), BLACK);
        assert_eq!(gradient(&stops, 0.5), WHITE);
        assert_eq!(gradient(&stops, 1.0), BLACK);
        assert_eq!(gradient(&stops, 0.25), [128, 128, 128, 255]);
    }

    #[test]
    fn fill_rect_is_clipped() {
        let mut canvas = Canvas::new(4, 4, BLACK);
        canvas.fill_rect(Rect::new(2.0, 2.0, 10.0, 10.0), WHITE);
        assert_eq!(canvas.pixel(3, 3), Some(WHITE));
        assert_eq!(canvas.pixel(1, 1), Some(BLACK));
        assert_eq!(canvas.into_pixels().len(), 64);
    }

    #[test]
    fn half_alpha_blends() {
        let mut canvas = Canvas::new(1, 1, BLACK);
        canvas.blend(0, 0, [255, 255, 255, 128], 1.0);
        let p = canvas.pixel(0, 0).unwrap();
        assert!((127..=129).contains(&p[0]));
        assert_eq!(p[3], 255);
    }

    #[test]
    fn circle_covers_center_not_corners() {
        let mut canvas = Canvas::new(10, 10, BLACK);
        canvas.fill_circle(5.0, 5.0, 3.0, WHITE);
        assert_eq!(canvas.pixel(5, 5), Some(WHITE));
        assert_eq!(canvas.pixel(0, 0), Some(BLACK));
    }

    #[test]
    fn column_coverage_is_fractional() {
        let mut canvas = Canvas::new(1, 4, BLACK);
        canvas.fill_column(0, 0.5, 3.0, WHITE);
        assert_eq!(canvas.pixel(0, 1), Some(WHITE));
        let edge = canvas.pixel(0, 0).unwrap();
        assert!(edge[0] > 100 && edge[0] < 160);
        assert_eq!(canvas.pixel(0, 3), Some(BLACK));
    }

    #[test]
    fn blit_respects_offset() {
        let mut canvas = Canvas::new(4, 4, BLACK);
        let img = RgbaImage::from_pixel(2, 2, image::Rgba(WHITE));
        canvas.blit(&img, 1, 1, 1.0);
        assert_eq!(canvas.pixel(1, 1), Some(WHITE));
        assert_eq!(canvas.pixel(2, 2), Some(WHITE));
        assert_eq!(canvas.pixel(3, 3), Some(BLACK));
    }
}
