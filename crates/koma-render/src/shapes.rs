//! Bubble outlines as kurbo paths.
//!
//! All geometry is derived from the bubble's pixel box, so the same
//! bubble yields proportional outlines at any page scale. The raster
//! exporter and the Vello painter both draw from these paths.

use koma_core::bubble::{BorderStyle, Bubble, BubbleKind, BubbleShape, TailDir};
use koma_core::model::PixelBox;
use kurbo::{BezPath, Circle, Ellipse, Point, Rect, Shape};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Outline stroke width, in pixels at the standard page width.
pub const BORDER_WIDTH: f64 = 2.5;
/// Stroke width of the inner ring of a double border and of thought dots.
pub const THIN_BORDER_WIDTH: f64 = 2.0;
/// Dash pattern for the border around thought dots.
pub const DOT_DASHES: [f64; 2] = [3.0, 2.0];

const CLOUD_BUMPS: usize = 12;
const SPIKES: usize = 14;
const SPIKE_REACH: f64 = 1.25;

/// Centre and radii of the body ellipse inside a bubble box. The body
/// sits slightly above centre to leave room for a bottom tail.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub cx: f64,
    pub cy: f64,
    pub rx: f64,
    pub ry: f64,
}

impl BodyFrame {
    pub fn new(rect: &PixelBox) -> Self {
        let (x, y, w, h) = (
            rect.x as f64,
            rect.y as f64,
            rect.width as f64,
            rect.height as f64,
        );
        Self {
            x,
            y,
            w,
            h,
            cx: x + w / 2.0,
            cy: y + h * 0.46,
            rx: w * 0.47,
            ry: h * 0.40,
        }
    }
}

/// Everything needed to draw one bubble, in back-to-front order:
/// tail, body, inner ring.
#[derive(Debug, Clone)]
pub struct BubbleOutline {
    pub tail: Tail,
    pub body: BezPath,
    /// Second ring of a double border.
    pub inner: Option<BezPath>,
    pub frame: BodyFrame,
}

#[derive(Debug, Clone)]
pub enum Tail {
    None,
    Polygon(BezPath),
    /// Trail of circles leading away from a thought bubble.
    Dots(Vec<Circle>),
}

/// Build the outline of `bubble` drawn into `rect`.
pub fn bubble_outline(bubble: &Bubble, rect: &PixelBox) -> BubbleOutline {
    let frame = BodyFrame::new(rect);
    let tail = if bubble.tail == TailDir::None {
        Tail::None
    } else if uses_thought_dots(bubble) {
        Tail::Dots(thought_dots(bubble.tail, &frame))
    } else {
        tail_polygon(bubble.tail, &frame).map_or(Tail::None, Tail::Polygon)
    };
    let inner = (bubble.border_style == BorderStyle::Double && bubble.shape == BubbleShape::Oval)
        .then(|| {
            Ellipse::new((frame.cx, frame.cy), (frame.rx * 0.92, frame.ry * 0.9), 0.0)
                .to_path(0.1)
        });
    BubbleOutline {
        tail,
        body: body_path(bubble.shape, &frame),
        inner,
        frame,
    }
}

/// Thought bubbles and cloud shapes trail dots instead of a pointed tail.
pub fn uses_thought_dots(bubble: &Bubble) -> bool {
    bubble.kind == BubbleKind::Thought || bubble.shape == BubbleShape::Cloud
}

/// Closed body outline for a shape.
pub fn body_path(shape: BubbleShape, f: &BodyFrame) -> BezPath {
    match shape {
        BubbleShape::Oval => Ellipse::new((f.cx, f.cy), (f.rx, f.ry), 0.0).to_path(0.1),
        BubbleShape::Rectangle => rounded_rect(
            Rect::new(
                f.x + f.w * 0.03,
                f.y + f.h * 0.03,
                f.x + f.w * 0.97,
                f.y + f.h * 0.89,
            ),
            f.w * 0.04,
        ),
        BubbleShape::Parallelogram => {
            let skew = f.w * 0.08;
            polygon(&[
                (f.x + skew + f.w * 0.03, f.y + f.h * 0.03),
                (f.x + f.w * 0.97, f.y + f.h * 0.03),
                (f.x + f.w * 0.97 - skew, f.y + f.h * 0.89),
                (f.x + f.w * 0.03, f.y + f.h * 0.89),
            ])
        }
        BubbleShape::Cloud => cloud(f),
        BubbleShape::Spike => spike(f),
    }
}

/// Rounded rectangle with quadratic corners.
fn rounded_rect(r: Rect, radius: f64) -> BezPath {
    let mut p = BezPath::new();
    p.move_to((r.x0 + radius, r.y0));
    p.line_to((r.x1 - radius, r.y0));
    p.quad_to((r.x1, r.y0), (r.x1, r.y0 + radius));
    p.line_to((r.x1, r.y1 - radius));
    p.quad_to((r.x1, r.y1), (r.x1 - radius, r.y1));
    p.line_to((r.x0 + radius, r.y1));
    p.quad_to((r.x0, r.y1), (r.x0, r.y1 - radius));
    p.line_to((r.x0, r.y0 + radius));
    p.quad_to((r.x0, r.y0), (r.x0 + radius, r.y0));
    p.close_path();
    p
}

fn cloud(f: &BodyFrame) -> BezPath {
    let cx = f.x + f.w * 0.5;
    let cy = f.y + f.h * 0.46;
    let base = f.w.min(f.h) * 0.42;
    let sx = if f.w / f.h > 1.0 { 1.1 } else { 0.9 };
    let sy = if f.h / f.w > 1.0 { 1.1 } else { 0.9 };
    let step = TAU / CLOUD_BUMPS as f64;

    let mut p = BezPath::new();
    for i in 0..=CLOUD_BUMPS {
        let a = i as f64 * step;
        let r = base * (0.85 + 0.15 * (a * 3.0).cos());
        let pt = Point::new(cx + a.cos() * r * sx, cy + a.sin() * r * sy);
        if i == 0 {
            p.move_to(pt);
        } else {
            let ca = a - step / 2.0;
            let ctrl = Point::new(
                cx + ca.cos() * r * 1.15 * sx,
                cy + ca.sin() * r * 1.15 * sy,
            );
            p.quad_to(ctrl, pt);
        }
    }
    p.close_path();
    p
}

fn spike(f: &BodyFrame) -> BezPath {
    let mut p = BezPath::new();
    for i in 0..SPIKES {
        let a = i as f64 / SPIKES as f64 * TAU - FRAC_PI_2;
        let a2 = (i as f64 + 0.5) / SPIKES as f64 * TAU - FRAC_PI_2;
        let valley = (f.cx + a.cos() * f.rx, f.cy + a.sin() * f.ry);
        let tip = (
            f.cx + a2.cos() * f.rx * SPIKE_REACH,
            f.cy + a2.sin() * f.ry * SPIKE_REACH,
        );
        if i == 0 {
            p.move_to(valley);
        } else {
            p.line_to(valley);
        }
        p.line_to(tip);
    }
    p.close_path();
    p
}

fn polygon(points: &[(f64, f64)]) -> BezPath {
    let mut p = BezPath::new();
    for (i, &pt) in points.iter().enumerate() {
        if i == 0 {
            p.move_to(pt);
        } else {
            p.line_to(pt);
        }
    }
    p.close_path();
    p
}

// ─── Tails ───────────────────────────────────────────────────────────────

/// Triangle pointing from the body toward the speaker.
pub fn tail_polygon(tail: TailDir, f: &BodyFrame) -> Option<BezPath> {
    let (x, y, w, h, cx, cy, rx) = (f.x, f.y, f.w, f.h, f.cx, f.cy, f.rx);
    let pts = match tail {
        TailDir::BottomLeft => [
            (cx - w * 0.08, cy + h * 0.36),
            (x + w * 0.05, y + h * 1.12),
            (cx + w * 0.06, cy + h * 0.38),
        ],
        TailDir::BottomRight => [
            (cx + w * 0.08, cy + h * 0.36),
            (x + w * 0.95, y + h * 1.12),
            (cx - w * 0.06, cy + h * 0.38),
        ],
        TailDir::BottomCenter => [
            (cx - w * 0.06, cy + h * 0.36),
            (cx, y + h * 1.15),
            (cx + w * 0.06, cy + h * 0.36),
        ],
        TailDir::TopLeft => [
            (cx - w * 0.08, cy - h * 0.36),
            (x + w * 0.05, y - h * 0.12),
            (cx + w * 0.06, cy - h * 0.38),
        ],
        TailDir::TopRight => [
            (cx + w * 0.08, cy - h * 0.36),
            (x + w * 0.95, y - h * 0.12),
            (cx - w * 0.06, cy - h * 0.38),
        ],
        TailDir::TopCenter => [
            (cx - w * 0.06, cy - h * 0.36),
            (cx, y - h * 0.15),
            (cx + w * 0.06, cy - h * 0.36),
        ],
        TailDir::Left => [
            (cx - rx * 0.92, cy - h * 0.08),
            (x - w * 0.18, cy),
            (cx - rx * 0.92, cy + h * 0.08),
        ],
        TailDir::Right => [
            (cx + rx * 0.92, cy - h * 0.08),
            (x + w * 1.18, cy),
            (cx + rx * 0.92, cy + h * 0.08),
        ],
        TailDir::None => return None,
    };
    Some(polygon(&pts))
}

/// Three shrinking dots trailing away from a thought bubble.
pub fn thought_dots(tail: TailDir, f: &BodyFrame) -> Vec<Circle> {
    let (w, h, cx, cy) = (f.w, f.h, f.cx, f.cy);
    // (dx, dy) per dot as fractions of the box, radii fixed.
    let offsets: [(f64, f64); 3] = match tail {
        TailDir::BottomLeft => [(-0.08, 0.45), (-0.18, 0.62), (-0.26, 0.78)],
        TailDir::BottomRight => [(0.08, 0.45), (0.18, 0.62), (0.26, 0.78)],
        TailDir::BottomCenter => [(0.0, 0.48), (0.0, 0.62), (0.0, 0.74)],
        TailDir::TopLeft => [(-0.08, -0.45), (-0.18, -0.62), (-0.26, -0.78)],
        TailDir::TopRight => [(0.08, -0.45), (0.18, -0.62), (0.26, -0.78)],
        TailDir::TopCenter => [(0.0, -0.48), (0.0, -0.62), (0.0, -0.74)],
        TailDir::Left => [(-0.55, 0.0), (-0.68, 0.0), (-0.80, 0.0)],
        TailDir::Right => [(0.55, 0.0), (0.68, 0.0), (0.80, 0.0)],
        TailDir::None => return Vec::new(),
    };
    offsets
        .iter()
        .zip([4.0, 3.0, 2.2])
        .map(|(&(dx, dy), r)| Circle::new((cx + w * dx, cy + h * dy), r))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use koma_core::id::BubbleId;

    fn frame() -> BodyFrame {
        BodyFrame::new(&PixelBox::new(100.0, 50.0, 200.0, 100.0))
    }

    #[test]
    fn body_frame_sits_above_centre() {
        let f = frame();
        assert_eq!((f.cx, f.cy), (200.0, 96.0));
        assert!((f.rx - 94.0).abs() < 1e-9);
        assert!((f.ry - 40.0).abs() < 1e-9);
    }

    #[test]
    fn bottom_left_tail_reaches_below_the_box() {
        let tail = tail_polygon(TailDir::BottomLeft, &frame()).unwrap();
        let tip = tail.bounding_box();
        assert!((tip.y1 - 162.0).abs() < 1e-9);
        assert!((tip.x0 - 110.0).abs() < 1e-9);
        assert!(tail_polygon(TailDir::None, &frame()).is_none());
    }

    #[test]
    fn thought_dots_shrink_away_from_body() {
        let dots = thought_dots(TailDir::Right, &frame());
        assert_eq!(dots.len(), 3);
        assert!(dots[0].center.x < dots[2].center.x);
        assert!(dots[0].radius > dots[2].radius);
        assert!(thought_dots(TailDir::None, &frame()).is_empty());
    }

    #[test]
    fn every_shape_stays_near_its_box() {
        let f = frame();
        let area = Rect::new(f.x, f.y, f.x + f.w, f.y + f.h).inflate(f.w * 0.2, f.h * 0.2);
        for &shape in BubbleShape::ALL {
            let bb = body_path(shape, &f).bounding_box();
            assert!(area.contains(bb.origin()), "{shape:?}");
            assert!(area.contains(Point::new(bb.x1, bb.y1)), "{shape:?}");
        }
    }

    #[test]
    fn thought_bubbles_use_dots_and_double_oval_has_inner_ring() {
        let rect = PixelBox::new(0.0, 0.0, 100.0, 60.0);
        let thought = Bubble::new(BubbleId(1), BubbleKind::Thought);
        assert!(matches!(bubble_outline(&thought, &rect).tail, Tail::Dots(_)));

        let mut speech = Bubble::new(BubbleId(2), BubbleKind::Speech);
        assert!(matches!(bubble_outline(&speech, &rect).tail, Tail::Polygon(_)));
        assert!(bubble_outline(&speech, &rect).inner.is_none());
        speech.border_style = BorderStyle::Double;
        assert!(bubble_outline(&speech, &rect).inner.is_some());

        let sfx = Bubble::new(BubbleId(3), BubbleKind::Sfx);
        assert!(matches!(bubble_outline(&sfx, &rect).tail, Tail::None));
    }
}
