// Pen strokes for the signature surface.
// A stroke is a chain of round "dabs" stamped along each segment, which gives
// round caps and round joins for free.
use crate::types::{Point, Raster, Rgba};

/// Precomputed anti-aliased disc we dab into the raster along a stroke.
/// Coverage is 1.0 inside the radius and falls to 0 over the last pixel.
pub struct Stamp {
    pub half: i32,         // kernel spans -half..=half in both axes
    pub weights: Vec<f32>, // (2*half+1)^2 coverage values in [0,1]
}

/// Build a round stamp for a pen of `radius` device pixels.
pub fn make_round_stamp(radius: f32) -> Stamp {
    let radius = radius.max(0.5);
    let half = radius.ceil() as i32 + 1;
    let d = 2 * half + 1;
    let mut weights = Vec::with_capacity((d * d) as usize);

    for y in -half..=half {
        for x in -half..=half {
            let dist = ((x * x + y * y) as f32).sqrt();
            weights.push((radius + 0.5 - dist).clamp(0.0, 1.0));
        }
    }

    Stamp { half, weights }
}

/// Source-over one pixel with the given coverage.
#[inline]
fn blend_over(raster: &mut Raster, x: i32, y: i32, color: Rgba, coverage: f32) {
    if x < 0 || y < 0 {
        return;
    }
    let (x, y) = (x as usize, y as usize);
    if x >= raster.width || y >= raster.height {
        return;
    }
    let idx = y * raster.width + x;

    let sa = coverage * color.a as f32 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let dst = Rgba::unpack(raster.pixels[idx]);
    let da = dst.a as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        raster.pixels[idx] = 0;
        return;
    }

    let mix = |s: u8, d: u8| -> u8 {
        let v = (s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    raster.pixels[idx] = Rgba {
        r: mix(color.r, dst.r),
        g: mix(color.g, dst.g),
        b: mix(color.b, dst.b),
        a: (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    }
    .pack();
}

/// Stamp once centred at (cx, cy), in device pixels.
pub fn dab(raster: &mut Raster, cx: f32, cy: f32, stamp: &Stamp, color: Rgba) {
    let ix = cx.round() as i32;
    let iy = cy.round() as i32;
    let d = 2 * stamp.half + 1;

    for ky in 0..d {
        for kx in 0..d {
            let w = stamp.weights[(ky * d + kx) as usize];
            if w <= 0.0 {
                continue;
            }
            blend_over(raster, ix + kx - stamp.half, iy + ky - stamp.half, color, w);
        }
    }
}

/// Draw one segment of a stroke. `from`/`to` and `width` are in device pixels.
/// Dabs are spaced at most a quarter of the radius apart so the edge stays smooth.
pub fn stroke_segment(raster: &mut Raster, from: Point, to: Point, width: f32, color: Rgba) {
    let radius = (width / 2.0).max(0.5);
    let stamp = make_round_stamp(radius);

    // Only the part of the segment whose dabs can reach the raster matters.
    let margin = (stamp.half + 1) as f32;
    let window = (-margin, -margin, raster.width as f32 - 1.0 + margin, raster.height as f32 - 1.0 + margin);
    let Some((from, to)) = clip_segment(from, to, window) else {
        return;
    };

    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    let spacing = (radius * 0.25).max(0.5);
    let steps = (len / spacing).ceil().max(1.0) as usize;

    // Overlapping dabs would darken anti-aliased edges on every step; keep
    // the strongest coverage per pixel for this segment and composite once.
    let d = 2 * stamp.half + 1;
    let min_x = (from.x.min(to.x).round() as i32) - stamp.half;
    let min_y = (from.y.min(to.y).round() as i32) - stamp.half;
    let max_x = (from.x.max(to.x).round() as i32) + stamp.half;
    let max_y = (from.y.max(to.y).round() as i32) + stamp.half;
    let bw = (max_x - min_x + 1) as usize;
    let bh = (max_y - min_y + 1) as usize;
    let mut coverage = vec![0.0_f32; bw * bh];

    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let cx = (from.x + dx * t).round() as i32;
        let cy = (from.y + dy * t).round() as i32;
        for ky in 0..d {
            for kx in 0..d {
                let w = stamp.weights[(ky * d + kx) as usize];
                if w <= 0.0 {
                    continue;
                }
                let px = cx + kx - stamp.half - min_x;
                let py = cy + ky - stamp.half - min_y;
                if px < 0 || py < 0 || px as usize >= bw || py as usize >= bh {
                    continue;
                }
                let c = &mut coverage[py as usize * bw + px as usize];
                if w > *c {
                    *c = w;
                }
            }
        }
    }

    for by in 0..bh {
        for bx in 0..bw {
            let c = coverage[by * bw + bx];
            if c > 0.0 {
                blend_over(raster, min_x + bx as i32, min_y + by as i32, color, c);
            }
        }
    }
}

/// Liang-Barsky clip of `a`-`b` against `(x0, y0, x1, y1)`.
/// `None` when nothing of the segment is inside, or an endpoint is not finite.
fn clip_segment(a: Point, b: Point, (x0, y0, x1, y1): (f32, f32, f32, f32)) -> Option<(Point, Point)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let (mut t0, mut t1) = (0.0_f32, 1.0_f32);
    for (p, q) in [(-dx, a.x - x0), (dx, x1 - a.x), (-dy, a.y - y0), (dy, y1 - a.y)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((Point::new(a.x + dx * t0, a.y + dy * t0), Point::new(a.x + dx * t1, a.y + dy * t1)))
}
