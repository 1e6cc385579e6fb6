use super::snapshot::FrequencySnapshot;

const ACTIVE_AMPLITUDE: f32 = 0.7;
const IDLE_AMPLITUDE: f32 = 0.15;
/// Centripetal parameterization.
const CATMULL_ROM_ALPHA: f32 = 0.5;
const SEGMENT_STEPS: usize = 8;

/// Mirrored spline outline of the "liquid" waveform style.
///
/// Every bin becomes a control point; `top` and `bottom` are the sampled
/// Catmull-Rom curves through those points, symmetric around the centre line.
#[derive(Clone, Debug, PartialEq)]
pub struct LiquidOutline {
    pub top: Vec<[f32; 2]>,
    pub bottom: Vec<[f32; 2]>,
}

impl LiquidOutline {
    /// Vertical extent of the filled area at `x`, if the curve covers it.
    pub fn span_at(&self, x: f32) -> Option<(f32, f32)> {
        Some((y_at(&self.top, x)?, y_at(&self.bottom, x)?))
    }
}

pub fn liquid_outline(
    snapshot: &FrequencySnapshot,
    width: f32,
    height: f32,
    playing: bool,
) -> LiquidOutline {
    let bins = snapshot.bins();
    let center = height / 2.0;

    let (top, bottom): (Vec<[f32; 2]>, Vec<[f32; 2]>) = if bins.len() < 2 {
        let half = height * IDLE_AMPLITUDE / 2.0;
        (
            vec![[0.0, center - half], [width, center - half]],
            vec![[0.0, center + half], [width, center + half]],
        )
    } else {
        let last = (bins.len() - 1) as f32;
        bins.iter()
            .enumerate()
            .map(|(i, &v)| {
                let x = i as f32 / last * width;
                let amplitude = if playing {
                    v as f32 / 255.0 * height * ACTIVE_AMPLITUDE
                } else {
                    height * IDLE_AMPLITUDE
                };
                ([x, center - amplitude / 2.0], [x, center + amplitude / 2.0])
            })
            .unzip()
    };

    LiquidOutline {
        top: catmull_rom(&top, SEGMENT_STEPS),
        bottom: catmull_rom(&bottom, SEGMENT_STEPS),
    }
}

/// Sample a centripetal Catmull-Rom spline through `points`.
///
/// End segments get a phantom outer control point mirrored through the
/// endpoint, so straight runs stay straight and evenly sampled.
pub fn catmull_rom(points: &[[f32; 2]], steps: usize) -> Vec<[f32; 2]> {
    if points.len() < 2 || steps == 0 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut out = Vec::with_capacity(last * steps + 1);
    for i in 0..last {
        let p1 = points[i];
        let p2 = points[i + 1];
        let p0 = if i == 0 { reflect(p1, p2) } else { points[i - 1] };
        let p3 = if i + 1 == last { reflect(p2, p1) } else { points[i + 2] };

        let t0 = 0.0;
        let t1 = t0 + knot_interval(p0, p1);
        let t2 = t1 + knot_interval(p1, p2);
        let t3 = t2 + knot_interval(p2, p3);

        for s in 0..steps {
            let t = t1 + (t2 - t1) * s as f32 / steps as f32;
            out.push(barry_goldman(p0, p1, p2, p3, [t0, t1, t2, t3], t));
        }
    }
    if let Some(&last) = points.last() {
        out.push(last);
    }
    out
}

/// `pivot` mirrored away from `other`: `2 * pivot - other`.
fn reflect(pivot: [f32; 2], other: [f32; 2]) -> [f32; 2] {
    [2.0 * pivot[0] - other[0], 2.0 * pivot[1] - other[1]]
}

fn knot_interval(a: [f32; 2], b: [f32; 2]) -> f32 {
    let d = ((b[0] - a[0]).powi(2) + (b[1] - a[1]).powi(2)).sqrt();
    // Coincident control points would collapse the knot vector
    d.powf(CATMULL_ROM_ALPHA).max(1e-4)
}

fn lerp_knots(a: [f32; 2], b: [f32; 2], ta: f32, tb: f32, t: f32) -> [f32; 2] {
    let wa = (tb - t) / (tb - ta);
    let wb = (t - ta) / (tb - ta);
    [a[0] * wa + b[0] * wb, a[1] * wa + b[1] * wb]
}

fn barry_goldman(
    p0: [f32; 2],
    p1: [f32; 2],
    p2: [f32; 2],
    p3: [f32; 2],
    k: [f32; 4],
    t: f32,
) -> [f32; 2] {
    let a1 = lerp_knots(p0, p1, k[0], k[1], t);
    let a2 = lerp_knots(p1, p2, k[1], k[2], t);
    let a3 = lerp_knots(p2, p3, k[2], k[3], t);
    let b1 = lerp_knots(a1, a2, k[0], k[2], t);
    let b2 = lerp_knots(a2, a3, k[1], k[3], t);
    lerp_knots(b1, b2, k[1], k[2], t)
}

/// Linear interpolation of a polyline at `x`.
fn y_at(line: &[[f32; 2]], x: f32) -> Option<f32> {
    line.windows(2).find_map(|w| {
        let (a, b) = (w[0], w[1]);
        let (lo, hi) = if a[0] <= b[0] { (a, b) } else { (b, a) };
        if x < lo[0] || x > hi[0] {
            return None;
        }
        let span = hi[0] - lo[0];
        if span <= f32::EPSILON {
            return Some(lo[1]);
        }
        Some(lo[1] + (hi[1] - lo[1]) * (x - lo[0]) / span)
    })
}
