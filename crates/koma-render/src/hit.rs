//! Hit testing: point → bubble or panel lookup.
//!
//! Panels never overlap, so the panel under the point is found first;
//! its layer stack is then walked top-down (highest z first) to find the
//! bubble being pointed at.

use koma_core::geometry::PageLayout;
use koma_core::id::{BubbleId, PanelId};
use koma_core::model::{LayerContent, Page, PixelBox};

/// Side of the square resize grip in a bubble's bottom-right corner.
pub const RESIZE_HANDLE: f32 = 12.0;

/// What lies under a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hit {
    Panel(PanelId),
    Bubble {
        panel: PanelId,
        bubble: BubbleId,
        /// The point is on the bubble's resize grip.
        on_handle: bool,
    },
}

impl Hit {
    pub fn panel(&self) -> PanelId {
        match self {
            Hit::Panel(p) | Hit::Bubble { panel: p, .. } => *p,
        }
    }
}

/// Find the topmost thing at `(px, py)` in page pixels.
/// Returns `None` over the background and gaps.
pub fn hit_test(page: &Page, layout: &PageLayout, px: f32, py: f32) -> Option<Hit> {
    let panel_box = layout.panel_boxes().find(|b| b.rect.contains(px, py))?;
    let panel = page.panel(panel_box.panel)?;

    // Walk layers in reverse (topmost first)
    for layer in panel.layers.iter().rev() {
        if let LayerContent::Bubble(bubble) = &layer.content {
            let rect = bubble.pixel_rect(&panel_box.rect);
            if rect.contains(px, py) {
                return Some(Hit::Bubble {
                    panel: panel.id,
                    bubble: bubble.id,
                    on_handle: on_resize_handle(&rect, px, py),
                });
            }
        }
    }
    Some(Hit::Panel(panel.id))
}

/// Whether `(px, py)` is on the bottom-right grip of `rect`.
pub fn on_resize_handle(rect: &PixelBox, px: f32, py: f32) -> bool {
    let size = RESIZE_HANDLE.min(rect.width / 2.0).min(rect.height / 2.0);
    px >= rect.right() - size && py >= rect.bottom() - size && rect.contains(px, py)
}

/// Every bubble whose box intersects `area`, in panel reading order.
pub fn bubbles_in_rect(page: &Page, layout: &PageLayout, area: &PixelBox) -> Vec<(PanelId, BubbleId)> {
    let mut result = Vec::new();
    for panel_box in layout.panel_boxes() {
        if !panel_box.rect.intersects(area) {
            continue;
        }
        let Some(panel) = page.panel(panel_box.panel) else {
            continue;
        };
        for bubble in panel.bubbles() {
            if bubble.pixel_rect(&panel_box.rect).intersects(area) {
                result.push((panel.id, bubble.id));
            }
        }
    }
    result
}
