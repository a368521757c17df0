//! CPU raster surface for page export.
//!
//! Paths are filled with the non-zero rule using sub-scanline coverage
//! for anti-aliasing; strokes are expanded to fills by kurbo. Every draw
//! is clipped to the current clip box, which the exporter sets to the
//! panel being painted.

use image::{Rgba, RgbaImage};
use koma_core::color::Color;
use koma_core::model::{BlendMode, PixelBox};
use kurbo::{BezPath, Cap, Join, PathEl, Point, Shape, Stroke, StrokeOpts};

/// Vertical samples per pixel row.
const SUBSAMPLES: usize = 4;
/// Curve flattening tolerance, in pixels.
const TOLERANCE: f64 = 0.1;

/// Integer clip box, `x0..x1` × `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ClipBox {
    x0: i64,
    y0: i64,
    x1: i64,
    y1: i64,
}

pub struct Raster {
    pixels: RgbaImage,
    clip: ClipBox,
}

impl Raster {
    pub fn new(width: u32, height: u32, background: Color) -> Self {
        let pixels = RgbaImage::from_pixel(width, height, to_rgba(background));
        let clip = ClipBox {
            x0: 0,
            y0: 0,
            x1: width as i64,
            y1: height as i64,
        };
        Self { pixels, clip }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// Restrict drawing to `area` (snapped to whole pixels), or lift the
    /// restriction with `None`.
    pub fn set_clip(&mut self, area: Option<&PixelBox>) {
        let (w, h) = (self.width() as i64, self.height() as i64);
        self.clip = match area {
            None => ClipBox {
                x0: 0,
                y0: 0,
                x1: w,
                y1: h,
            },
            Some(a) => {
                let a = a.snapped();
                ClipBox {
                    x0: (a.x as i64).clamp(0, w),
                    y0: (a.y as i64).clamp(0, h),
                    x1: (a.right() as i64).clamp(0, w),
                    y1: (a.bottom() as i64).clamp(0, h),
                }
            }
        };
    }

    // ─── Solid fills ─────────────────────────────────────────────────────

    pub fn fill_rect(&mut self, rect: &PixelBox, color: Color) {
        let r = rect.snapped();
        let x0 = (r.x as i64).max(self.clip.x0);
        let y0 = (r.y as i64).max(self.clip.y0);
        let x1 = (r.right() as i64).min(self.clip.x1);
        let y1 = (r.bottom() as i64).min(self.clip.y1);
        let top = to_rgba(color);
        for y in y0..y1 {
            for x in x0..x1 {
                self.composite(x, y, top, BlendMode::Normal, 1.0);
            }
        }
    }

    /// Fill a closed path with the non-zero winding rule.
    pub fn fill_path(&mut self, path: &BezPath, color: Color) {
        let edges = flatten_edges(path);
        if edges.is_empty() || color.a == 0 {
            return;
        }
        let bb = path.bounding_box();
        let x_start = (bb.x0.floor() as i64).max(self.clip.x0);
        let x_end = (bb.x1.ceil() as i64).min(self.clip.x1);
        let y_start = (bb.y0.floor() as i64).max(self.clip.y0);
        let y_end = (bb.y1.ceil() as i64).min(self.clip.y1);
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let top = to_rgba(color);
        let weight = 1.0 / SUBSAMPLES as f32;
        let mut coverage = vec![0.0f32; (x_end - x_start) as usize];
        let mut crossings: Vec<(f64, i32)> = Vec::new();

        for py in y_start..y_end {
            coverage.fill(0.0);
            for s in 0..SUBSAMPLES {
                let sy = py as f64 + (s as f64 + 0.5) / SUBSAMPLES as f64;
                crossings.clear();
                crossings.extend(edges.iter().filter_map(|e| e.crossing(sy)));
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                let mut span_start = 0.0;
                for &(x, dir) in &crossings {
                    let was_inside = winding != 0;
                    winding += dir;
                    if !was_inside && winding != 0 {
                        span_start = x;
                    } else if was_inside && winding == 0 {
                        add_span(
                            &mut coverage,
                            span_start - x_start as f64,
                            x - x_start as f64,
                            weight,
                        );
                    }
                }
            }
            for (i, &c) in coverage.iter().enumerate() {
                if c > 0.0 {
                    self.composite(x_start + i as i64, py, top, BlendMode::Normal, c.min(1.0));
                }
            }
        }
    }

    /// Stroke a path centred on its outline.
    pub fn stroke_path(
        &mut self,
        path: &BezPath,
        width: f64,
        dashes: Option<[f64; 2]>,
        join: Join,
        color: Color,
    ) {
        let mut style = Stroke::new(width).with_join(join).with_caps(Cap::Butt);
        if let Some(pattern) = dashes {
            style = style.with_dashes(0.0, pattern);
        }
        let outline = kurbo::stroke(path.iter(), &style, &StrokeOpts::default(), TOLERANCE);
        self.fill_path(&outline, color);
    }

    // ─── Images ──────────────────────────────────────────────────────────

    /// Draw `src` stretched over `dest`, sampled bilinearly.
    pub fn draw_image(&mut self, src: &RgbaImage, dest: &PixelBox, opacity: f32, mode: BlendMode) {
        if src.width() == 0 || src.height() == 0 || dest.width <= 0.0 || dest.height <= 0.0 {
            return;
        }
        let x0 = (dest.x.floor() as i64).max(self.clip.x0);
        let y0 = (dest.y.floor() as i64).max(self.clip.y0);
        let x1 = (dest.right().ceil() as i64).min(self.clip.x1);
        let y1 = (dest.bottom().ceil() as i64).min(self.clip.y1);
        let sx = src.width() as f32 / dest.width;
        let sy = src.height() as f32 / dest.height;

        for y in y0..y1 {
            let v = (y as f32 + 0.5 - dest.y) * sy - 0.5;
            for x in x0..x1 {
                let u = (x as f32 + 0.5 - dest.x) * sx - 0.5;
                let top = sample_bilinear(src, u, v);
                self.composite(x, y, top, mode, opacity);
            }
        }
    }

    /// Paint an 8-bit coverage mask (e.g. a rasterized glyph) in `color`
    /// with its top-left corner at `(x, y)`.
    pub fn draw_mask(&mut self, x: i64, y: i64, width: usize, mask: &[u8], color: Color) {
        if width == 0 {
            return;
        }
        let top = to_rgba(color);
        for (row, line) in mask.chunks(width).enumerate() {
            let py = y + row as i64;
            for (col, &c) in line.iter().enumerate() {
                if c > 0 {
                    self.composite(x + col as i64, py, top, BlendMode::Normal, c as f32 / 255.0);
                }
            }
        }
    }

    fn composite(&mut self, x: i64, y: i64, top: Rgba<u8>, mode: BlendMode, opacity: f32) {
        let c = self.clip;
        if x < c.x0 || y < c.y0 || x >= c.x1 || y >= c.y1 {
            return;
        }
        let base = self.pixels.get_pixel_mut(x as u32, y as u32);
        *base = blend_pixel(*base, top, mode, opacity);
    }
}

// ─── Scan conversion ─────────────────────────────────────────────────────

/// A non-horizontal line segment with its winding direction.
#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f64,
    y0: f64,
    slope: f64,
    y_min: f64,
    y_max: f64,
    dir: i32,
}

impl Edge {
    fn new(a: Point, b: Point) -> Option<Self> {
        if a.y == b.y {
            return None;
        }
        Some(Self {
            x0: a.x,
            y0: a.y,
            slope: (b.x - a.x) / (b.y - a.y),
            y_min: a.y.min(b.y),
            y_max: a.y.max(b.y),
            dir: if b.y > a.y { 1 } else { -1 },
        })
    }

    fn crossing(&self, y: f64) -> Option<(f64, i32)> {
        (y >= self.y_min && y < self.y_max).then(|| (self.x0 + (y - self.y0) * self.slope, self.dir))
    }
}

/// Flatten a path to edges, closing every subpath.
fn flatten_edges(path: &BezPath) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut start = Point::ZERO;
    let mut current = Point::ZERO;
    path.flatten(TOLERANCE, |el| match el {
        PathEl::MoveTo(p) => {
            edges.extend(Edge::new(current, start));
            start = p;
            current = p;
        }
        PathEl::LineTo(p) => {
            edges.extend(Edge::new(current, p));
            current = p;
        }
        PathEl::ClosePath => {
            edges.extend(Edge::new(current, start));
            current = start;
        }
        // flatten only emits lines
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    edges.extend(Edge::new(current, start));
    edges
}

/// Add a horizontal span `[a, b)` in local pixel units to a coverage row,
/// with partial coverage at both ends.
fn add_span(coverage: &mut [f32], a: f64, b: f64, weight: f32) {
    let len = coverage.len() as f64;
    let a = a.max(0.0);
    let b = b.min(len);
    if b <= a {
        return;
    }
    let ia = a.floor() as usize;
    let ib = b.floor() as usize;
    if ia == ib {
        coverage[ia] += (b - a) as f32 * weight;
        return;
    }
    coverage[ia] += (ia as f64 + 1.0 - a) as f32 * weight;
    for c in &mut coverage[ia + 1..ib] {
        *c += weight;
    }
    if ib < coverage.len() {
        coverage[ib] += (b - ib as f64) as f32 * weight;
    }
}

fn sample_bilinear(src: &RgbaImage, u: f32, v: f32) -> Rgba<u8> {
    let max_x = src.width() as i64 - 1;
    let max_y = src.height() as i64 - 1;
    let fx = u.floor();
    let fy = v.floor();
    let tx = u - fx;
    let ty = v - fy;
    let px = |x: i64, y: i64| *src.get_pixel(x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32);
    let (x, y) = (fx as i64, fy as i64);
    let (p00, p10, p01, p11) = (px(x, y), px(x + 1, y), px(x, y + 1), px(x + 1, y + 1));

    let mut out = [0u8; 4];
    for (i, o) in out.iter_mut().enumerate() {
        let top = p00[i] as f32 * (1.0 - tx) + p10[i] as f32 * tx;
        let bottom = p01[i] as f32 * (1.0 - tx) + p11[i] as f32 * tx;
        *o = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

// ─── Compositing ─────────────────────────────────────────────────────────

pub fn to_rgba(c: Color) -> Rgba<u8> {
    Rgba([c.r, c.g, c.b, c.a])
}

/// Source-over composite of `top` onto `base`, mixing colour channels
/// with `mode` first.
pub fn blend_pixel(base: Rgba<u8>, top: Rgba<u8>, mode: BlendMode, opacity: f32) -> Rgba<u8> {
    if top[3] == 0 || opacity <= 0.0 {
        return base;
    }
    if mode == BlendMode::Normal && opacity >= 1.0 && top[3] == 255 {
        return top;
    }

    let unit = |v: u8| v as f32 / 255.0;
    let (br, bg, bb, ba) = (unit(base[0]), unit(base[1]), unit(base[2]), unit(base[3]));
    let (tr, tg, tb) = (unit(top[0]), unit(top[1]), unit(top[2]));
    let ta = unit(top[3]) * opacity.clamp(0.0, 1.0);

    let mix = |b: f32, t: f32| match mode {
        BlendMode::Normal => t,
        BlendMode::Multiply => b * t,
        BlendMode::Screen => 1.0 - (1.0 - b) * (1.0 - t),
        BlendMode::Overlay => {
            if b < 0.5 {
                2.0 * b * t
            } else {
                1.0 - 2.0 * (1.0 - b) * (1.0 - t)
            }
        }
        BlendMode::Darken => b.min(t),
        BlendMode::Lighten => b.max(t),
    };
    let (r, g, b) = (mix(br, tr), mix(bg, tg), mix(bb, tb));

    let out_a = ta + ba * (1.0 - ta);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }
    let channel = |m: f32, base: f32| {
        let v = (m * ta + base * ba * (1.0 - ta)) / out_a;
        (v * 255.0).round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(r, br),
        channel(g, bg),
        channel(b, bb),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::{Circle, Rect};

    const RED: Color = Color {
        r: 255,
        g: 0,
        b: 0,
        a: 255,
    };

    #[test]
    fn rectangle_fill_is_exact_on_pixel_edges() {
        let mut r = Raster::new(10, 10, Color::BLACK);
        r.fill_path(&Rect::new(2.0, 2.0, 6.0, 5.0).to_path(0.1), RED);
        assert_eq!(*r.image().get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*r.image().get_pixel(5, 4), Rgba([255, 0, 0, 255]));
        assert_eq!(*r.image().get_pixel(6, 4), Rgba([0, 0, 0, 255]));
        assert_eq!(*r.image().get_pixel(5, 5), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn half_covered_pixel_is_blended() {
        let mut r = Raster::new(4, 1, Color::BLACK);
        r.fill_path(&Rect::new(0.0, 0.0, 1.5, 1.0).to_path(0.1), Color::WHITE);
        let p = r.image().get_pixel(1, 0);
        assert!((126..=129).contains(&p[0]), "got {p:?}");
    }

    #[test]
    fn clip_limits_drawing() {
        let mut r = Raster::new(10, 10, Color::BLACK);
        r.set_clip(Some(&PixelBox::new(0.0, 0.0, 5.0, 10.0)));
        r.fill_path(&Circle::new((5.0, 5.0), 4.0).to_path(0.1), RED);
        assert_eq!(r.image().get_pixel(3, 5)[0], 255);
        assert_eq!(r.image().get_pixel(7, 5)[0], 0);
    }

    #[test]
    fn dashed_stroke_leaves_gaps() {
        let mut r = Raster::new(40, 6, Color::BLACK);
        let mut line = BezPath::new();
        line.move_to((0.0, 3.0));
        line.line_to((40.0, 3.0));
        r.stroke_path(&line, 2.0, Some([6.0, 4.0]), Join::Miter, Color::WHITE);
        assert_eq!(r.image().get_pixel(3, 3)[0], 255);
        assert_eq!(r.image().get_pixel(8, 3)[0], 0);
        assert_eq!(r.image().get_pixel(13, 3)[0], 255);
    }

    #[test]
    fn blend_modes_mix_channels() {
        let base = Rgba([200, 100, 0, 255]);
        let top = Rgba([100, 100, 100, 255]);
        assert_eq!(blend_pixel(base, top, BlendMode::Darken, 1.0), Rgba([100, 100, 0, 255]));
        assert_eq!(blend_pixel(base, top, BlendMode::Lighten, 1.0), Rgba([200, 100, 100, 255]));
        let m = blend_pixel(Rgba([255, 255, 255, 255]), top, BlendMode::Multiply, 1.0);
        assert_eq!(m, top);
        let half = blend_pixel(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 255]), BlendMode::Normal, 0.5);
        assert!((127..=128).contains(&half[0]));
        assert_eq!(half[3], 255);
    }

    #[test]
    fn image_is_stretched_over_destination() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let mut r = Raster::new(8, 8, Color::BLACK);
        r.draw_image(&src, &PixelBox::new(2.0, 2.0, 4.0, 4.0), 1.0, BlendMode::Normal);
        assert_eq!(*r.image().get_pixel(2, 2), Rgba([0, 0, 255, 255]));
        assert_eq!(*r.image().get_pixel(5, 5), Rgba([0, 0, 255, 255]));
        assert_eq!(*r.image().get_pixel(6, 6), Rgba([0, 0, 0, 255]));
    }
}
