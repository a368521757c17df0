//! Page data model.
//!
//! A page is an ordered list of rows. A row holds either one full-width
//! panel or a group of two to four panels arranged by a registered
//! layout. Every panel owns a z-ordered stack of layers: its image at the
//! bottom, then overlays and bubbles interleaved above it.

use crate::bubble::Bubble;
use crate::id::{IdCounters, LayerId, OverlayId, PanelId, RowId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Page width, in pixels, that stored offsets and heights are authored against.
pub const STANDARD_WIDTH: f32 = 800.0;
/// Height given to a new panel when the image's aspect is unknown.
pub const DEFAULT_HEIGHT: f32 = 450.0;
/// Smallest width, in percent of the row, a grouped panel may take.
pub const MIN_WIDTH_PCT: f32 = 10.0;
/// Opacity given to a freshly added overlay.
pub const DEFAULT_OVERLAY_OPACITY: f32 = 0.5;

// ─── Geometry ────────────────────────────────────────────────────────────

/// Axis-aligned pixel rectangle on the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn intersects(&self, other: &PixelBox) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// Round every edge to whole pixels. Neighbouring boxes that shared an
    /// edge still share it after snapping.
    pub fn snapped(&self) -> PixelBox {
        let x0 = self.x.round();
        let y0 = self.y.round();
        PixelBox {
            x: x0,
            y: y0,
            width: self.right().round() - x0,
            height: self.bottom().round() - y0,
        }
    }
}

// ─── Overlays ────────────────────────────────────────────────────────────

/// How an overlay's pixels combine with what is beneath them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
}

impl BlendMode {
    pub const ALL: [BlendMode; 6] = [
        BlendMode::Normal,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::Darken,
        BlendMode::Lighten,
    ];

    /// CSS `mix-blend-mode` keyword.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
        }
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlendMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown blend mode `{s}`"))
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An effect image stretched over its panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    pub id: OverlayId,
    /// Image source: a data URL or a path.
    pub file: String,
    /// 0.0–1.0.
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

impl Overlay {
    pub fn new(id: OverlayId, file: impl Into<String>) -> Self {
        Self {
            id,
            file: file.into(),
            opacity: DEFAULT_OVERLAY_OPACITY,
            blend_mode: BlendMode::Normal,
        }
    }
}

// ─── Layers ──────────────────────────────────────────────────────────────

/// What a layer draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerContent {
    /// The panel's own image.
    Image,
    Overlay(Overlay),
    Bubble(Bubble),
}

/// Layer kind without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Image,
    Overlay,
    Bubble,
}

/// One entry of a panel's layer stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub z_index: i32,
    pub content: LayerContent,
}

impl Layer {
    pub fn kind(&self) -> LayerKind {
        match self.content {
            LayerContent::Image => LayerKind::Image,
            LayerContent::Overlay(_) => LayerKind::Overlay,
            LayerContent::Bubble(_) => LayerKind::Bubble,
        }
    }

    /// Stable identifier; the image layer is named after its panel.
    pub fn id(&self, panel: PanelId) -> LayerId {
        match &self.content {
            LayerContent::Image => LayerId::Image(panel),
            LayerContent::Overlay(o) => LayerId::Overlay(o.id),
            LayerContent::Bubble(b) => LayerId::Bubble(b.id),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.content, LayerContent::Image)
    }
}

// ─── Panels & rows ───────────────────────────────────────────────────────

/// A rectangular image region of the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Panel {
    pub id: PanelId,
    /// Image source: a data URL or a path.
    pub src: String,
    /// Authored height in pixels at [`STANDARD_WIDTH`].
    pub height: f32,
    /// Natural height / width of the image, once known.
    pub aspect_ratio: Option<f32>,
    /// Image pan, in pixels at [`STANDARD_WIDTH`].
    pub ox: f32,
    pub oy: f32,
    /// Image zoom, percent.
    pub scale: f32,
    /// Share of the row, percent. Only meaningful inside a group.
    pub width: f32,
    /// Locked panels keep their width when a sibling is resized.
    pub locked: bool,
    /// Kept sorted by `z_index`; see [`Panel::initialize_layers`].
    pub layers: Vec<Layer>,
}

impl Panel {
    /// A new panel with default transform and a lone image layer.
    pub fn new(id: PanelId, src: impl Into<String>) -> Self {
        Self {
            id,
            src: src.into(),
            height: DEFAULT_HEIGHT,
            aspect_ratio: None,
            ox: 0.0,
            oy: 0.0,
            scale: 100.0,
            width: 100.0,
            locked: false,
            layers: vec![Layer {
                z_index: 0,
                content: LayerContent::Image,
            }],
        }
    }
}

/// How a row arranges its panels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RowKind {
    /// Exactly one full-width panel.
    Single,
    /// Two to four panels placed by a layout key.
    Group { layout: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    #[serde(flatten)]
    pub kind: RowKind,
    pub panels: Vec<Panel>,
}

impl Row {
    pub fn single(id: RowId, panel: Panel) -> Self {
        Self {
            id,
            kind: RowKind::Single,
            panels: vec![panel],
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, RowKind::Group { .. })
    }

    /// Layout key, for groups.
    pub fn layout(&self) -> Option<&str> {
        match &self.kind {
            RowKind::Group { layout } => Some(layout),
            RowKind::Single => None,
        }
    }
}

/// The whole document: rows top to bottom plus the id counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub rows: Vec<Row>,
    pub counters: IdCounters,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapped_boxes_share_edges() {
        let a = PixelBox::new(0.0, 0.0, 265.3, 100.0);
        let b = PixelBox::new(a.right(), 0.0, 265.3, 100.0);
        assert_eq!(a.snapped().right(), b.snapped().x);
    }

    #[test]
    fn blend_mode_keywords() {
        for m in BlendMode::ALL {
            assert_eq!(m.as_str().parse::<BlendMode>(), Ok(m));
        }
        assert!("hue".parse::<BlendMode>().is_err());
    }

    #[test]
    fn new_panel_defaults() {
        let p = Panel::new(PanelId(1), "a.png");
        assert_eq!(p.height, 450.0);
        assert_eq!(p.scale, 100.0);
        assert_eq!(p.width, 100.0);
        assert_eq!(p.layers.len(), 1);
        assert!(p.layers[0].is_image());
    }
}
