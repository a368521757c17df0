//! Bubble caption layout and glyph drawing with fontdue.
//!
//! Captions are wrapped on spaces to 82 % of the bubble width and
//! centred on the body ellipse, one line every 1.3 × font size.

use crate::raster::Raster;
use crate::shapes::BodyFrame;
use fontdue::{Font, FontSettings};
use koma_core::color::Color;

/// Share of the bubble width available to a line of text.
pub const WRAP_RATIO: f32 = 0.82;
/// Line advance as a multiple of the font size.
pub const LINE_HEIGHT: f32 = 1.3;

/// Parse a TrueType / OpenType font.
pub fn load_font(bytes: &[u8]) -> Result<Font, String> {
    Font::from_bytes(bytes, FontSettings::default()).map_err(|e| e.to_string())
}

/// Advance width of `text` at `px`.
pub fn measure(font: &Font, text: &str, px: f32) -> f32 {
    text.chars().map(|c| font.metrics(c, px).advance_width).sum()
}

/// Greedy word wrap. A word wider than `max_width` gets a line of its own
/// rather than being split. Always returns at least one line.
pub fn wrap_words(font: &Font, text: &str, px: f32, max_width: f32) -> Vec<String> {
    wrap_with(text, max_width, |s| measure(font, s, px))
}

fn wrap_with(text: &str, max_width: f32, width_of: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if !current.is_empty() && width_of(&candidate) > max_width {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Draw `text` centred on the bubble body. `px` is the rendered font size.
pub fn draw_caption(raster: &mut Raster, font: &Font, text: &str, frame: &BodyFrame, px: f32, color: Color) {
    let lines = wrap_words(font, text, px, frame.w as f32 * WRAP_RATIO);
    let line_height = px * LINE_HEIGHT;
    let total = lines.len() as f32 * line_height;
    let (ascent, descent) = font
        .horizontal_line_metrics(px)
        .map_or((px * 0.8, -px * 0.2), |m| (m.ascent, m.descent));

    for (i, line) in lines.iter().enumerate() {
        let middle = frame.cy as f32 - total / 2.0 + line_height * (i as f32 + 0.5);
        // Centre the ascent..descent band on the line's middle.
        let baseline = middle + (ascent + descent) / 2.0;
        let mut pen = frame.cx as f32 - measure(font, line, px) / 2.0;
        for c in line.chars() {
            let (metrics, bitmap) = font.rasterize(c, px);
            let gx = (pen + metrics.xmin as f32).round() as i64;
            let gy = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i64;
            raster.draw_mask(gx, gy, metrics.width, &bitmap, color);
            pen += metrics.advance_width;
        }
    }
    log::trace!("caption {:?}: {} line(s) at {px}px", text, lines.len());
}
