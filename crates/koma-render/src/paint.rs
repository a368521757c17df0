//! Page → Vello drawing commands for the GPU preview.
//!
//! Mirrors the raster exporter layer for layer: panel fill, clipped
//! image with the pan/zoom transform, overlays composited with their
//! blend mode, then bubble outlines.

use crate::decode::{ImageResolver, short};
use crate::shapes::{BORDER_WIDTH, DOT_DASHES, THIN_BORDER_WIDTH, Tail, bubble_outline};
use image::RgbaImage;
use koma_core::bubble::{BorderStyle, Bubble, BubbleShape};
use koma_core::color::Color as KomaColor;
use koma_core::geometry::{PageLayout, place_image};
use koma_core::model::{BlendMode, LayerContent, Page, Panel, PixelBox};
use kurbo::{Affine, Cap, Join, Rect, Stroke};
use peniko::{Blob, Color, Fill, Image, ImageFormat, Mix};
use vello::Scene;

/// Counts of what a paint pass emitted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PaintStats {
    pub panels: usize,
    pub images: usize,
    pub bubbles: usize,
    /// Image or overlay sources that failed to resolve.
    pub skipped: usize,
}

/// Paint the whole page into `scene`.
///
/// Call once per frame with a freshly-cleared `Scene`.
/// The caller presents the scene.
pub fn paint_page(
    scene: &mut Scene,
    page: &Page,
    layout: &PageLayout,
    resolver: &mut dyn ImageResolver,
    panel_fill: KomaColor,
) -> PaintStats {
    let mut stats = PaintStats::default();
    let unit = layout.width / koma_core::model::STANDARD_WIDTH;
    for panel_box in layout.panel_boxes() {
        let Some(panel) = page.panel(panel_box.panel) else {
            continue;
        };
        let clip = to_rect(&panel_box.rect);
        scene.fill(Fill::NonZero, Affine::IDENTITY, to_color(panel_fill), None, &clip);
        scene.push_layer(Mix::Clip, 1.0, Affine::IDENTITY, &clip);
        paint_panel(scene, panel, &panel_box.rect, unit, resolver, &mut stats);
        scene.pop_layer();
        stats.panels += 1;
    }
    stats
}

fn paint_panel(
    scene: &mut Scene,
    panel: &Panel,
    area: &PixelBox,
    unit: f32,
    resolver: &mut dyn ImageResolver,
    stats: &mut PaintStats,
) {
    for layer in &panel.layers {
        match &layer.content {
            LayerContent::Image => {
                if panel.src.is_empty() {
                    continue;
                }
                match resolver.resolve(&panel.src) {
                    Ok(img) => {
                        let natural = (img.width() as f32, img.height() as f32);
                        let dest = place_image(panel, area, natural, unit);
                        draw_stretched(scene, &img, &dest);
                        stats.images += 1;
                    }
                    Err(e) => {
                        log::warn!("panel {}: skipping image {}: {e}", panel.id, short(&panel.src));
                        stats.skipped += 1;
                    }
                }
            }
            LayerContent::Overlay(overlay) => match resolver.resolve(&overlay.file) {
                Ok(img) => {
                    let clip = to_rect(area);
                    scene.push_layer(to_mix(overlay.blend_mode), overlay.opacity, Affine::IDENTITY, &clip);
                    draw_stretched(scene, &img, area);
                    scene.pop_layer();
                    stats.images += 1;
                }
                Err(e) => {
                    log::warn!("panel {}: skipping overlay {}: {e}", panel.id, overlay.id);
                    stats.skipped += 1;
                }
            },
            LayerContent::Bubble(bubble) => {
                paint_bubble(scene, bubble, area, unit);
                stats.bubbles += 1;
            }
        }
    }
}

// ─── Bubbles ─────────────────────────────────────────────────────────────────

fn paint_bubble(scene: &mut Scene, bubble: &Bubble, area: &PixelBox, unit: f32) {
    let rect = bubble.pixel_rect(area);
    let outline = bubble_outline(bubble, &rect);
    let u = unit as f64;
    let fill = to_color(bubble.fill_color);
    let ink = to_color(bubble.stroke_color);
    let bordered = bubble.border_style != BorderStyle::None;

    match &outline.tail {
        Tail::None => {}
        Tail::Polygon(path) => {
            scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, path);
            if bordered {
                scene.stroke(&stroke(BORDER_WIDTH * u, Join::Miter), Affine::IDENTITY, ink, None, path);
            }
        }
        Tail::Dots(dots) => {
            let dashed = stroke(THIN_BORDER_WIDTH * u, Join::Miter)
                .with_dashes(0.0, [DOT_DASHES[0] * u, DOT_DASHES[1] * u]);
            for dot in dots {
                scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, dot);
                if bordered {
                    scene.stroke(&dashed, Affine::IDENTITY, ink, None, dot);
                }
            }
        }
    }

    scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, &outline.body);
    if bordered {
        let join = if bubble.shape == BubbleShape::Spike {
            Join::Round
        } else {
            Join::Miter
        };
        let mut border = stroke(BORDER_WIDTH * u, join);
        if let Some([on, off]) = bubble.border_style.dashes() {
            border = border.with_dashes(0.0, [on * u, off * u]);
        }
        scene.stroke(&border, Affine::IDENTITY, ink, None, &outline.body);
    }
    if let Some(inner) = &outline.inner {
        scene.stroke(&stroke(THIN_BORDER_WIDTH * u, Join::Miter), Affine::IDENTITY, ink, None, inner);
    }

    log::trace!(
        "TEXT bubble {} {:?} at ({}, {})",
        bubble.id,
        bubble.text,
        outline.frame.cx,
        outline.frame.cy
    );
    // Glyph runs need a font context on the Vello side; the raster exporter draws captions.
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn draw_stretched(scene: &mut Scene, img: &RgbaImage, dest: &PixelBox) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let image = Image::new(Blob::from(img.as_raw().clone()), ImageFormat::Rgba8, w, h);
    let transform = Affine::translate((dest.x as f64, dest.y as f64))
        * Affine::scale_non_uniform(dest.width as f64 / w as f64, dest.height as f64 / h as f64);
    scene.draw_image(&image, transform);
}

fn stroke(width: f64, join: Join) -> Stroke {
    Stroke::new(width).with_join(join).with_caps(Cap::Butt)
}

fn to_rect(b: &PixelBox) -> Rect {
    Rect::new(b.x as f64, b.y as f64, b.right() as f64, b.bottom() as f64)
}

fn to_color(c: KomaColor) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn to_mix(mode: BlendMode) -> Mix {
    match mode {
        BlendMode::Normal => Mix::Normal,
        BlendMode::Multiply => Mix::Multiply,
        BlendMode::Screen => Mix::Screen,
        BlendMode::Overlay => Mix::Overlay,
        BlendMode::Darken => Mix::Darken,
        BlendMode::Lighten => Mix::Lighten,
    }
}
