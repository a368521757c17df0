//! Page export: rasterize a whole page to RGBA, optionally encode as PNG.
//!
//! Panels are drawn in reading order onto a black page. Each panel is
//! filled dark, clipped to its box, and its layer stack painted bottom
//! to top. Sources that fail to decode are skipped with a warning so a
//! single broken image never aborts an export.

use crate::decode::{ImageResolver, short};
use crate::raster::Raster;
use crate::shapes::{BORDER_WIDTH, BubbleOutline, DOT_DASHES, THIN_BORDER_WIDTH, Tail, bubble_outline};
use crate::text::draw_caption;
use fontdue::Font;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::imageops::{self, FilterType as ResizeFilter};
use image::{ColorType, ImageEncoder, RgbaImage};
use koma_core::bubble::{BorderStyle, Bubble, BubbleShape};
use koma_core::color::Color;
use koma_core::geometry::{PageMetrics, layout_page, place_image};
use koma_core::model::{BlendMode, LayerContent, Page, Panel, PixelBox};
use kurbo::{Join, Shape};
use thiserror::Error;

/// Largest raster side, in pixels, an export will allocate.
pub const MAX_EXPORT_SIDE: u32 = 16_384;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("page has no panels to export")]
    EmptyPage,
    #[error("supersample factor must be at least 1")]
    Supersample,
    #[error("page is too large to export: {width}x{height} pixels (limit {MAX_EXPORT_SIDE} per side)")]
    TooLarge { width: f32, height: f32 },
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Export settings.
#[derive(Clone, Copy)]
pub struct ExportOptions<'a> {
    pub metrics: PageMetrics,
    pub background: Color,
    pub panel_fill: Color,
    /// Font for bubble captions. Without one, captions are left out.
    pub font: Option<&'a Font>,
    /// Render this many times larger, then downscale. 1 disables.
    pub supersample: u32,
}

impl Default for ExportOptions<'_> {
    fn default() -> Self {
        Self {
            metrics: PageMetrics::default(),
            background: Color::BLACK,
            panel_fill: Color::rgb(0x11, 0x11, 0x11),
            font: None,
            supersample: 1,
        }
    }
}

/// Rasterize `page` at `options.metrics`.
pub fn export_page(
    page: &Page,
    resolver: &mut dyn ImageResolver,
    options: &ExportOptions<'_>,
) -> Result<RgbaImage, ExportError> {
    if page.panel_count() == 0 {
        return Err(ExportError::EmptyPage);
    }
    if options.supersample == 0 {
        return Err(ExportError::Supersample);
    }

    let base = layout_page(page, &options.metrics);
    let (width, height) = raster_size(base.width, base.height)?;

    let metrics = options.metrics.scaled(options.supersample as f32);
    let layout = if options.supersample == 1 {
        base
    } else {
        layout_page(page, &metrics)
    };
    let (raster_width, raster_height) = raster_size(layout.width, layout.height)?;
    let mut raster = Raster::new(raster_width, raster_height, options.background);

    let unit = metrics.unit();
    for panel_box in layout.panel_boxes() {
        let Some(panel) = page.panel(panel_box.panel) else {
            continue;
        };
        raster.set_clip(None);
        raster.fill_rect(&panel_box.rect, options.panel_fill);
        raster.set_clip(Some(&panel_box.rect));
        paint_panel(&mut raster, panel, &panel_box.rect, unit, resolver, options.font);
    }
    raster.set_clip(None);

    log::debug!(
        "exported {} panel(s) at {width}x{height} (supersample {})",
        page.panel_count(),
        options.supersample
    );
    let image = raster.into_image();
    if image.dimensions() == (width, height) {
        Ok(image)
    } else {
        Ok(imageops::resize(&image, width, height, ResizeFilter::Triangle))
    }
}

/// Pixel dimensions for a layout, refused when a side exceeds
/// [`MAX_EXPORT_SIDE`] or the RGBA buffer would not fit in memory.
fn raster_size(width: f32, height: f32) -> Result<(u32, u32), ExportError> {
    let too_large = ExportError::TooLarge { width, height };
    let side = |v: f32| {
        let v = v.round().max(1.0);
        (v.is_finite() && v <= MAX_EXPORT_SIDE as f32).then_some(v as u32)
    };
    let (Some(w), Some(h)) = (side(width), side(height)) else {
        return Err(too_large);
    };
    (w as usize)
        .checked_mul(h as usize)
        .and_then(|n| n.checked_mul(4))
        .filter(|&n| n <= isize::MAX as usize)
        .map(|_| (w, h))
        .ok_or(too_large)
}

/// Rasterize and encode as PNG.
pub fn export_png(
    page: &Page,
    resolver: &mut dyn ImageResolver,
    options: &ExportOptions<'_>,
) -> Result<Vec<u8>, ExportError> {
    let image = export_page(page, resolver, options)?;
    encode_png(&image)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut bytes, CompressionType::Fast, FilterType::NoFilter);
    encoder.write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8.into())?;
    Ok(bytes)
}

// ─── Layers ──────────────────────────────────────────────────────────────

fn paint_panel(
    raster: &mut Raster,
    panel: &Panel,
    area: &PixelBox,
    unit: f32,
    resolver: &mut dyn ImageResolver,
    font: Option<&Font>,
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
                        raster.draw_image(&img, &dest, 1.0, BlendMode::Normal);
                    }
                    Err(e) => log::warn!("panel {}: skipping image {}: {e}", panel.id, short(&panel.src)),
                }
            }
            LayerContent::Overlay(overlay) => match resolver.resolve(&overlay.file) {
                Ok(img) => raster.draw_image(&img, area, overlay.opacity, overlay.blend_mode),
                Err(e) => log::warn!(
                    "panel {}: skipping overlay {} ({}): {e}",
                    panel.id,
                    overlay.id,
                    short(&overlay.file)
                ),
            },
            LayerContent::Bubble(bubble) => paint_bubble(raster, bubble, area, unit, font),
        }
    }
}

/// Draw one bubble: tail, body, inner ring, then caption.
pub fn paint_bubble(raster: &mut Raster, bubble: &Bubble, panel_area: &PixelBox, unit: f32, font: Option<&Font>) {
    let rect = bubble.pixel_rect(panel_area);
    let outline = bubble_outline(bubble, &rect);
    let u = unit as f64;
    let bordered = bubble.border_style != BorderStyle::None;
    let scale_dashes = |d: [f64; 2]| [d[0] * u, d[1] * u];

    paint_tail(raster, bubble, &outline, u, bordered);

    raster.fill_path(&outline.body, bubble.fill_color);
    if bordered {
        let join = if bubble.shape == BubbleShape::Spike {
            Join::Round
        } else {
            Join::Miter
        };
        raster.stroke_path(
            &outline.body,
            BORDER_WIDTH * u,
            bubble.border_style.dashes().map(scale_dashes),
            join,
            bubble.stroke_color,
        );
    }
    if let Some(inner) = &outline.inner {
        raster.stroke_path(inner, THIN_BORDER_WIDTH * u, None, Join::Miter, bubble.stroke_color);
    }

    if let Some(font) = font {
        draw_caption(
            raster,
            font,
            &bubble.text,
            &outline.frame,
            bubble.font_size * unit,
            bubble.text_color,
        );
    }
}

fn paint_tail(raster: &mut Raster, bubble: &Bubble, outline: &BubbleOutline, u: f64, bordered: bool) {
    match &outline.tail {
        Tail::None => {}
        Tail::Polygon(path) => {
            raster.fill_path(path, bubble.fill_color);
            if bordered {
                raster.stroke_path(path, BORDER_WIDTH * u, None, Join::Miter, bubble.stroke_color);
            }
        }
        Tail::Dots(dots) => {
            for dot in dots {
                let path = dot.to_path(0.1);
                raster.fill_path(&path, bubble.fill_color);
                if bordered {
                    raster.stroke_path(
                        &path,
                        THIN_BORDER_WIDTH * u,
                        Some([DOT_DASHES[0] * u, DOT_DASHES[1] * u]),
                        Join::Miter,
                        bubble.stroke_color,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::SourceCache;
    use image::Rgba;
    use koma_core::bubble::{BubbleKind, TailDir};

    const GAP: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const PANEL: Rgba<u8> = Rgba([0x11, 0x11, 0x11, 255]);

    fn two_rows() -> Page {
        let mut page = Page::new();
        let a = page.add_panel("");
        let b = page.add_panel("");
        page.set_height(a, 100.0).unwrap();
        page.set_height(b, 50.0).unwrap();
        page
    }

    #[test]
    fn empty_page_is_refused() {
        let err = export_page(&Page::new(), &mut SourceCache::new(), &ExportOptions::default());
        assert!(matches!(err, Err(ExportError::EmptyPage)));
    }

    #[test]
    fn panels_sit_on_black_with_gaps() {
        let img = export_page(&two_rows(), &mut SourceCache::new(), &ExportOptions::default()).unwrap();
        assert_eq!(img.dimensions(), (800, 154));
        assert_eq!(*img.get_pixel(400, 50), PANEL);
        assert_eq!(*img.get_pixel(400, 102), GAP);
        assert_eq!(*img.get_pixel(400, 130), PANEL);
    }

    #[test]
    fn half_width_export_scales_everything() {
        let options = ExportOptions {
            metrics: PageMetrics {
                page_width: 400.0,
                gap: 2.0,
            },
            ..ExportOptions::default()
        };
        let img = export_page(&two_rows(), &mut SourceCache::new(), &options).unwrap();
        assert_eq!(img.dimensions(), (400, 77));
    }

    #[test]
    fn missing_image_is_skipped() {
        let mut page = Page::new();
        page.add_panel("nowhere/at/all.png");
        let img = export_page(&page, &mut SourceCache::new(), &ExportOptions::default()).unwrap();
        assert_eq!(*img.get_pixel(10, 10), PANEL);
    }

    #[test]
    fn image_covers_its_panel() {
        let mut page = Page::new();
        let id = page.add_panel("red");
        page.set_height(id, 100.0).unwrap();
        let mut cache = SourceCache::new();
        cache.insert("red", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));
        let img = export_page(&page, &mut cache, &ExportOptions::default()).unwrap();
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(799, 99), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn overlay_blends_over_image() {
        let mut page = Page::new();
        let id = page.add_panel("grey");
        page.set_height(id, 100.0).unwrap();
        let ov = page.add_overlay(id, "shade").unwrap();
        let panel = page.layers_of(id).unwrap();
        panel.set_overlay_blend_mode(ov, BlendMode::Multiply).unwrap();
        let mut cache = SourceCache::new();
        cache.insert("grey", RgbaImage::from_pixel(2, 2, Rgba([200, 200, 200, 255])));
        cache.insert("shade", RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
        let img = export_page(&page, &mut cache, &ExportOptions::default()).unwrap();
        let px = img.get_pixel(400, 50);
        // Default overlay opacity keeps the result between the two layers.
        assert!(px[0] < 200 && px[0] > 0, "got {px:?}");
    }

    #[test]
    fn bubble_body_is_filled() {
        let mut page = Page::new();
        let id = page.add_panel("");
        page.set_height(id, 400.0).unwrap();
        let bubble = page.add_bubble(id, BubbleKind::Speech).unwrap();
        page.bubble_mut(id, bubble).unwrap().tail = TailDir::None;
        let img = export_page(&page, &mut SourceCache::new(), &ExportOptions::default()).unwrap();
        // Box 160,80 .. 320,120; body centred at (240, 98.4).
        assert_eq!(*img.get_pixel(240, 98), Rgba([255, 255, 255, 255]));
        assert_eq!(*img.get_pixel(100, 300), PANEL);
    }

    #[test]
    fn supersampled_export_keeps_output_size() {
        let options = ExportOptions {
            supersample: 2,
            ..ExportOptions::default()
        };
        let img = export_page(&two_rows(), &mut SourceCache::new(), &options).unwrap();
        assert_eq!(img.dimensions(), (800, 154));
        assert_eq!(*img.get_pixel(400, 50), PANEL);
    }

    #[test]
    fn oversized_pages_are_refused_before_allocating() {
        let mut page = Page::new();
        let tall = page.add_panel("");
        page.set_height(tall, 1.0e6).unwrap();
        let err = export_page(&page, &mut SourceCache::new(), &ExportOptions::default());
        assert!(matches!(err, Err(ExportError::TooLarge { .. })));

        // Fits at 1x, not at 64x.
        let options = ExportOptions {
            supersample: 64,
            ..ExportOptions::default()
        };
        let err = export_page(&two_rows(), &mut SourceCache::new(), &options);
        assert!(matches!(err, Err(ExportError::TooLarge { .. })));
    }

    #[test]
    fn png_has_signature() {
        let bytes = export_png(&two_rows(), &mut SourceCache::new(), &ExportOptions::default()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
