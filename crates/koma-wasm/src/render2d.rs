//! Canvas2D wireframe renderer.
//!
//! The browser shows panel images through the DOM projection. This
//! renderer draws the page structure on a `<canvas>` (panel boxes, bubble
//! outlines, selection) and the small layout thumbnails used by the
//! group dialog.

use koma_core::geometry::{PageLayout, resolve_tracks, span_extent};
use koma_core::layout::GridLayout;
use koma_core::model::{Page, PixelBox};
use koma_editor::Selection;
use wasm_bindgen::JsValue;
use web_sys::CanvasRenderingContext2d;

/// Colors for the wireframe renderer.
pub struct CanvasTheme {
    pub bg: &'static str,
    pub panel: &'static str,
    pub panel_border: &'static str,
    pub bubble: &'static str,
    pub selection: &'static str,
    pub label: &'static str,
}

impl CanvasTheme {
    pub fn dark() -> Self {
        Self {
            bg: "#000000",
            panel: "#111111",
            panel_border: "#333333",
            bubble: "rgba(255, 255, 255, 0.85)",
            selection: "#4A9EFF",
            label: "#888888",
        }
    }
}

/// Draw the page wireframe at layout scale.
pub fn render_page(
    ctx: &CanvasRenderingContext2d,
    page: &Page,
    layout: &PageLayout,
    selection: &Selection,
    theme: &CanvasTheme,
) {
    ctx.set_fill_style_str(theme.bg);
    ctx.fill_rect(0.0, 0.0, layout.width as f64, layout.height as f64);

    for panel_box in layout.panel_boxes() {
        let Some(panel) = page.panel(panel_box.panel) else {
            continue;
        };
        let r = &panel_box.rect;
        ctx.set_fill_style_str(theme.panel);
        ctx.fill_rect(r.x as f64, r.y as f64, r.width as f64, r.height as f64);
        ctx.set_stroke_style_str(theme.panel_border);
        ctx.set_line_width(1.0);
        ctx.stroke_rect(r.x as f64 + 0.5, r.y as f64 + 0.5, r.width as f64 - 1.0, r.height as f64 - 1.0);

        if let Some(index) = page.panel_index(panel.id) {
            draw_label(ctx, r, &index.to_string(), theme.label);
        }

        for bubble in panel.bubbles() {
            let b = bubble.pixel_rect(r);
            let (cx, cy) = b.center();
            ctx.begin_path();
            let _ = ctx.ellipse(
                cx as f64,
                cy as f64,
                (b.width / 2.0).max(0.0) as f64,
                (b.height / 2.0).max(0.0) as f64,
                0.0,
                0.0,
                std::f64::consts::TAU,
            );
            ctx.set_fill_style_str(theme.bubble);
            ctx.fill();
            if selection.bubble == Some(bubble.id) {
                draw_selection(ctx, &b, theme.selection);
            }
        }

        if selection.panel == Some(panel.id) && selection.bubble.is_none() {
            draw_selection(ctx, r, theme.selection);
        }
    }
}

/// Cell rectangles of `grid` laid into a `width × height` thumbnail.
pub fn preview_cells(grid: &GridLayout, width: f32, height: f32, gap: f32) -> Vec<PixelBox> {
    let cols = resolve_tracks(&grid.cols, width, gap);
    let rows = resolve_tracks(&grid.rows, height, gap);
    grid.positions
        .iter()
        .map(|cell| {
            let (x, w) = span_extent(&cols, cell.col).unwrap_or((0.0, width));
            let (y, h) = span_extent(&rows, cell.row).unwrap_or((0.0, height));
            PixelBox::new(x, y, w, h)
        })
        .collect()
}

/// Thumbnail of a layout: numbered cells in panel order.
pub fn draw_layout_preview(
    ctx: &CanvasRenderingContext2d,
    grid: &GridLayout,
    width: f64,
    height: f64,
    theme: &CanvasTheme,
) {
    ctx.set_fill_style_str(theme.bg);
    ctx.fill_rect(0.0, 0.0, width, height);
    let gap = (width.min(height) * 0.04).max(1.0) as f32;
    for (i, cell) in preview_cells(grid, width as f32, height as f32, gap).iter().enumerate() {
        ctx.set_fill_style_str(theme.panel);
        ctx.fill_rect(cell.x as f64, cell.y as f64, cell.width as f64, cell.height as f64);
        ctx.set_stroke_style_str(theme.panel_border);
        ctx.stroke_rect(cell.x as f64, cell.y as f64, cell.width as f64, cell.height as f64);
        draw_label(ctx, cell, &(i + 1).to_string(), theme.label);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn draw_label(ctx: &CanvasRenderingContext2d, area: &PixelBox, text: &str, color: &str) {
    let (cx, cy) = area.center();
    let size = (area.height.min(area.width) * 0.25).clamp(8.0, 28.0);
    ctx.set_fill_style_str(color);
    ctx.set_font(&format!("{size}px sans-serif"));
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    let _ = ctx.fill_text(text, cx as f64, cy as f64);
}

fn draw_selection(ctx: &CanvasRenderingContext2d, area: &PixelBox, color: &str) {
    ctx.save();
    ctx.set_stroke_style_str(color);
    ctx.set_line_width(2.0);
    let _ = ctx.set_line_dash(&js_sys::Array::of2(
        &JsValue::from_f64(4.0),
        &JsValue::from_f64(3.0),
    ));
    ctx.stroke_rect(area.x as f64, area.y as f64, area.width as f64, area.height as f64);
    ctx.restore();
}

#[cfg(test)]
mod tests {
    use super::*;
    use koma_core::layout::find_layout;

    #[test]
    fn stack_layout_thumbnail() {
        let grid = find_layout("col-2-stack-r").unwrap().resolve();
        let cells = preview_cells(&grid, 102.0, 62.0, 2.0);
        assert_eq!(cells.len(), 3);
        // Tall left cell spans both rows.
        assert_eq!(cells[0].height, 62.0);
        assert_eq!(cells[1].y, 0.0);
        assert_eq!(cells[2].y, 32.0);
        assert_eq!(cells[1].x, cells[2].x);
    }

    #[test]
    fn two_by_two_thumbnail() {
        let grid = find_layout("2x2").unwrap().resolve();
        let cells = preview_cells(&grid, 102.0, 102.0, 2.0);
        assert_eq!(cells[3], PixelBox::new(52.0, 52.0, 50.0, 50.0));
    }
}
