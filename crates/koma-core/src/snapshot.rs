//! Versioned page snapshots for autosave and restore.
//!
//! A snapshot stores rows, panels, flat bubble and overlay lists, and a
//! compact layer list (`id`, `kind`, `zIndex`) that refers to bubbles and
//! overlays by id. Restoring re-links each layer to its entity, fills in
//! missing fields with defaults, and raises the id counters past every id
//! found. Snapshots of another schema version are rejected outright.

use crate::bubble::{BorderStyle, Bubble, BubbleKind, BubbleShape};
use crate::color::Color;
use crate::id::{BubbleId, IdCounters, LayerId, OverlayId, PanelId, RowId};
use crate::layout::default_layout;
use crate::lint::lint_page;
use crate::model::{
    DEFAULT_HEIGHT, DEFAULT_OVERLAY_OPACITY, Layer, LayerContent, Overlay, Page, Panel, Row,
    RowKind, STANDARD_WIDTH,
};
use crate::page::normalize_widths;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current snapshot schema.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot schema {found} does not match {expected}")]
    Version { found: u32, expected: u32 },
    #[error("snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("snapshot decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

// ─── Records ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Autosaves written before versioning carry no field and read as
    /// schema 1.
    #[serde(default = "first_version")]
    pub version: u32,
    #[serde(default)]
    pub rows: Vec<RowRecord>,
    #[serde(default, alias = "PC")]
    pub panel_counter: u32,
    #[serde(default, alias = "RC")]
    pub row_counter: u32,
    #[serde(default, alias = "BC")]
    pub bubble_counter: u32,
    #[serde(default, alias = "OC")]
    pub overlay_counter: u32,
    #[serde(default, alias = "selPID", skip_serializing_if = "Option::is_none")]
    pub selected_panel: Option<PanelId>,
    #[serde(default, alias = "selBID", skip_serializing_if = "Option::is_none")]
    pub selected_bubble: Option<BubbleId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRecord {
    pub id: RowId,
    /// `single`, `group`, or the legacy `row`.
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub panels: Vec<PanelRecord>,
}

fn first_version() -> u32 {
    1
}

fn default_height() -> f32 {
    DEFAULT_HEIGHT
}

fn default_percent() -> f32 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelRecord {
    pub id: PanelId,
    #[serde(default)]
    pub src: String,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default)]
    pub aspect_ratio: Option<f32>,
    #[serde(default)]
    pub ox: f32,
    #[serde(default)]
    pub oy: f32,
    #[serde(default = "default_percent")]
    pub scale: f32,
    #[serde(default = "default_percent")]
    pub width: f32,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub bubbles: Vec<BubbleRecord>,
    #[serde(default)]
    pub overlays: Vec<OverlayRecord>,
    #[serde(default)]
    pub layers: Vec<LayerRecord>,
}

/// Bubble as persisted. Keyword and color fields are kept as text so one
/// unrecognised value falls back to its default instead of failing the
/// whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BubbleRecord {
    pub id: BubbleId,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_pct: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_pct: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w_pct: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_pct: Option<f32>,
    /// Legacy absolute pixel geometry, read only.
    #[serde(default, skip_serializing)]
    pub x: Option<f32>,
    #[serde(default, skip_serializing)]
    pub y: Option<f32>,
    #[serde(default, skip_serializing)]
    pub w: Option<f32>,
    #[serde(default, skip_serializing)]
    pub h: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(default, alias = "tailDir", skip_serializing_if = "Option::is_none")]
    pub tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayRecord {
    pub id: OverlayId,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub opacity: Option<f32>,
    #[serde(default)]
    pub blend_mode: Option<String>,
}

/// Layer ids are numbers for bubbles and overlays and `img-N` for the
/// image layer. The prefixed string form is accepted for any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerRef {
    Num(u32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerRecord {
    pub id: LayerRef,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub z_index: i32,
}

impl LayerRecord {
    fn resolve(&self, panel: PanelId) -> Option<LayerId> {
        match (&self.id, self.kind.as_deref()) {
            (_, Some("image")) => Some(LayerId::Image(panel)),
            (LayerRef::Num(n), Some("overlay")) => Some(LayerId::Overlay(OverlayId(*n))),
            (LayerRef::Num(n), Some("bubble")) => Some(LayerId::Bubble(BubbleId(*n))),
            (LayerRef::Text(s), _) => s.parse().ok(),
            _ => None,
        }
    }
}

// ─── Capture ─────────────────────────────────────────────────────────────

impl Snapshot {
    /// Record the whole page.
    pub fn capture(page: &Page) -> Self {
        Snapshot {
            version: SCHEMA_VERSION,
            rows: page.rows.iter().map(RowRecord::capture).collect(),
            panel_counter: page.counters.panel,
            row_counter: page.counters.row,
            bubble_counter: page.counters.bubble,
            overlay_counter: page.counters.overlay,
            selected_panel: None,
            selected_bubble: None,
        }
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Compact MessagePack form, field names kept.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

impl RowRecord {
    fn capture(row: &Row) -> Self {
        RowRecord {
            id: row.id,
            kind: if row.is_group() { "group" } else { "single" }.to_string(),
            layout: row.layout().map(str::to_string),
            panels: row.panels.iter().map(PanelRecord::capture).collect(),
        }
    }
}

impl PanelRecord {
    fn capture(panel: &Panel) -> Self {
        PanelRecord {
            id: panel.id,
            src: panel.src.clone(),
            height: panel.height,
            aspect_ratio: panel.aspect_ratio,
            ox: panel.ox,
            oy: panel.oy,
            scale: panel.scale,
            width: panel.width,
            locked: panel.locked,
            bubbles: panel.bubbles().map(BubbleRecord::capture).collect(),
            overlays: panel
                .overlays()
                .map(|o| OverlayRecord {
                    id: o.id,
                    file: o.file.clone(),
                    opacity: Some(o.opacity),
                    blend_mode: Some(o.blend_mode.as_str().to_string()),
                })
                .collect(),
            layers: panel
                .layers
                .iter()
                .map(|l| LayerRecord {
                    id: match l.id(panel.id) {
                        LayerId::Image(p) => LayerRef::Text(LayerId::Image(p).to_string()),
                        LayerId::Overlay(o) => LayerRef::Num(o.0),
                        LayerId::Bubble(b) => LayerRef::Num(b.0),
                    },
                    kind: Some(
                        match l.content {
                            LayerContent::Image => "image",
                            LayerContent::Overlay(_) => "overlay",
                            LayerContent::Bubble(_) => "bubble",
                        }
                        .to_string(),
                    ),
                    z_index: l.z_index,
                })
                .collect(),
        }
    }
}

impl BubbleRecord {
    pub fn capture(b: &Bubble) -> Self {
        BubbleRecord {
            id: b.id,
            kind: Some(b.kind.as_str().to_string()),
            text: Some(b.text.clone()),
            x_pct: Some(b.x_pct),
            y_pct: Some(b.y_pct),
            w_pct: Some(b.w_pct),
            h_pct: Some(b.h_pct),
            font_size: Some(b.font_size),
            tail: Some(b.tail.as_str().to_string()),
            fill_color: Some(b.fill_color.to_hex()),
            text_color: Some(b.text_color.to_hex()),
            stroke_color: Some(b.stroke_color.to_hex()),
            shape: Some(b.shape.as_str().to_string()),
            border_style: Some(b.border_style.as_str().to_string()),
            ..Default::default()
        }
    }

    /// Build the live bubble. `reference` is the panel's authored pixel
    /// size, used only to convert legacy pixel geometry.
    pub fn restore(&self, reference: (f32, f32)) -> Bubble {
        let kind = keyword(self.kind.as_deref(), "type").unwrap_or_default();
        let mut b = Bubble::new(self.id, kind);
        if let Some(text) = &self.text {
            b.text = text.clone();
        }

        let (ref_w, ref_h) = reference;
        let legacy = |px: Option<f32>, of: f32| px.filter(|_| of > 0.0).map(|v| v / of * 100.0);
        let pct = |stored: Option<f32>, px: Option<f32>, of: f32, fallback: f32| {
            stored
                .or_else(|| legacy(px, of))
                .filter(|v| v.is_finite())
                .unwrap_or(fallback)
        };
        if self.x_pct.is_none() && self.x.is_some() {
            log::debug!("bubble {}: migrating pixel geometry", self.id);
        }
        b.x_pct = pct(self.x_pct, self.x, ref_w, b.x_pct);
        b.y_pct = pct(self.y_pct, self.y, ref_h, b.y_pct);
        b.w_pct = pct(self.w_pct, self.w, ref_w, b.w_pct);
        b.h_pct = pct(self.h_pct, self.h, ref_h, b.h_pct);

        if let Some(fs) = self.font_size.filter(|f| f.is_finite() && *f > 0.0) {
            b.font_size = fs;
        }
        if let Some(tail) = keyword(self.tail.as_deref(), "tail") {
            b.tail = tail;
        }
        if let Some(c) = color(self.fill_color.as_deref()) {
            b.fill_color = c;
        }
        if let Some(c) = color(self.text_color.as_deref()) {
            b.text_color = c;
        }
        if let Some(c) = color(self.stroke_color.as_deref()) {
            b.stroke_color = c;
        }
        b.shape = keyword(self.shape.as_deref(), "shape").unwrap_or(BubbleShape::Oval);
        b.border_style =
            keyword(self.border_style.as_deref(), "border style").unwrap_or(BorderStyle::Solid);
        b
    }
}

fn keyword<T: std::str::FromStr>(value: Option<&str>, what: &str) -> Option<T> {
    let value = value.filter(|v| !v.is_empty())?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("unknown {what} `{value}`, using default");
            None
        }
    }
}

fn color(value: Option<&str>) -> Option<Color> {
    let value = value.filter(|v| !v.is_empty())?;
    let parsed = Color::from_hex(value);
    if parsed.is_none() {
        log::warn!("invalid color `{value}`, using default");
    }
    parsed
}

// ─── Restore ─────────────────────────────────────────────────────────────

impl Snapshot {
    /// Rebuild the page. Fails only on a schema version mismatch.
    pub fn restore(&self) -> Result<Page, SnapshotError> {
        if self.version != SCHEMA_VERSION {
            return Err(SnapshotError::Version {
                found: self.version,
                expected: SCHEMA_VERSION,
            });
        }

        let mut seen = IdCounters::default();
        let mut rows = Vec::with_capacity(self.rows.len());
        for record in &self.rows {
            if let Some(row) = restore_row(record, &mut seen) {
                rows.push(row);
            }
        }

        let mut counters = IdCounters {
            panel: self.panel_counter,
            row: self.row_counter,
            bubble: self.bubble_counter,
            overlay: self.overlay_counter,
        };
        counters.raise_to(&seen);
        let page = Page { rows, counters };
        for d in lint_page(&page) {
            log::debug!("restored page: [{}] {}", d.rule, d.message);
        }
        Ok(page)
    }
}

fn restore_row(record: &RowRecord, seen: &mut IdCounters) -> Option<Row> {
    if record.panels.is_empty() {
        log::warn!("row {}: no panels, dropped", record.id);
        return None;
    }
    seen.row = seen.row.max(record.id.0);

    let mut panels: Vec<Panel> = record
        .panels
        .iter()
        .map(|p| restore_panel(p, seen))
        .collect();

    let kind = if panels.len() == 1 {
        if record.kind == "group" {
            log::warn!("row {}: group with one panel restored as single", record.id);
        }
        let only = &mut panels[0];
        only.width = 100.0;
        only.locked = false;
        RowKind::Single
    } else {
        let layout = match (&record.layout, record.kind.as_str()) {
            (Some(key), "group") => key.clone(),
            (_, "row") => String::new(),
            _ => default_layout(panels.len())
                .map(|l| l.key.to_string())
                .unwrap_or_default(),
        };
        normalize_widths(&mut panels);
        RowKind::Group { layout }
    };

    Some(Row {
        id: record.id,
        kind,
        panels,
    })
}

fn restore_panel(record: &PanelRecord, seen: &mut IdCounters) -> Panel {
    seen.panel = seen.panel.max(record.id.0);
    let mut panel = Panel::new(record.id, record.src.clone());
    panel.height = if record.height.is_finite() && record.height >= 1.0 {
        record.height
    } else {
        DEFAULT_HEIGHT
    };
    panel.aspect_ratio = record.aspect_ratio.filter(|a| a.is_finite() && *a > 0.0);
    panel.ox = if record.ox.is_finite() { record.ox } else { 0.0 };
    panel.oy = if record.oy.is_finite() { record.oy } else { 0.0 };
    panel.scale = if record.scale.is_finite() && record.scale > 0.0 {
        record.scale
    } else {
        100.0
    };
    panel.width = if record.width.is_finite() && record.width > 0.0 {
        record.width
    } else {
        100.0
    };
    panel.locked = record.locked;

    let reference = (STANDARD_WIDTH * panel.width / 100.0, panel.height);
    let mut bubbles: Vec<Bubble> = record
        .bubbles
        .iter()
        .map(|b| {
            seen.bubble = seen.bubble.max(b.id.0);
            b.restore(reference)
        })
        .collect();
    let mut overlays: Vec<Overlay> = record
        .overlays
        .iter()
        .map(|o| {
            seen.overlay = seen.overlay.max(o.id.0);
            let mut overlay = Overlay::new(o.id, o.file.clone());
            overlay.opacity = o
                .opacity
                .filter(|v| !v.is_nan())
                .map_or(DEFAULT_OVERLAY_OPACITY, |v| v.clamp(0.0, 1.0));
            if let Some(mode) = keyword(o.blend_mode.as_deref(), "blend mode") {
                overlay.blend_mode = mode;
            }
            overlay
        })
        .collect();

    let mut layers = Vec::with_capacity(record.layers.len() + 1);
    for l in &record.layers {
        let content = match l.resolve(record.id) {
            Some(LayerId::Image(_)) => Some(LayerContent::Image),
            Some(LayerId::Overlay(id)) => take(&mut overlays, |o| o.id == id).map(LayerContent::Overlay),
            Some(LayerId::Bubble(id)) => take(&mut bubbles, |b| b.id == id).map(LayerContent::Bubble),
            None => None,
        };
        match content {
            Some(content) => layers.push(Layer {
                z_index: l.z_index,
                content,
            }),
            None => log::warn!("panel {}: dangling layer {:?} dropped", record.id, l.id),
        }
    }
    if layers.is_empty() {
        layers.push(Layer {
            z_index: 0,
            content: LayerContent::Image,
        });
    }
    panel.layers = layers;
    panel.initialize_layers();

    // Entities without a layer record go on top, overlays first.
    for overlay in overlays {
        panel.push_overlay(overlay);
    }
    for bubble in bubbles {
        panel.push_bubble(bubble);
    }
    panel
}

fn take<T>(items: &mut Vec<T>, pred: impl Fn(&T) -> bool) -> Option<T> {
    items.iter().position(pred).map(|i| items.remove(i))
}

/// Restore a JSON snapshot, or start over with an empty page when it is
/// unreadable or from another schema version.
pub fn restore_or_empty(input: &str) -> Page {
    match Snapshot::from_json(input).and_then(|s| s.restore()) {
        Ok(page) => page,
        Err(e) => {
            log::warn!("discarding saved page: {e}");
            Page::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bubble::TailDir;
    use crate::model::BlendMode;

    fn sample_page() -> Page {
        let mut page = Page::new();
        let ids: Vec<_> = (0..3).map(|i| page.add_panel(format!("{i}.png"))).collect();
        page.create_group_from_panels(&ids[..2], "col-2-left").unwrap();
        page.set_width(ids[0], 60.0).unwrap();
        page.add_overlay(ids[0], "fx.png").unwrap();
        let b = page.add_bubble(ids[0], BubbleKind::Thought).unwrap();
        page.add_overlay(ids[0], "grain.png").unwrap();
        page.layers_of(ids[0])
            .unwrap()
            .move_layer_down(LayerId::Bubble(b))
            .unwrap();
        page.add_bubble(ids[2], BubbleKind::Sfx).unwrap();
        page
    }

    #[test]
    fn capture_restore_preserves_page() {
        let page = sample_page();
        let restored = Snapshot::capture(&page).restore().unwrap();
        assert_eq!(restored, page);
    }

    #[test]
    fn msgpack_restore_preserves_page() {
        let page = sample_page();
        let bytes = Snapshot::capture(&page).to_msgpack().unwrap();
        let restored = Snapshot::from_msgpack(&bytes).unwrap().restore().unwrap();
        assert_eq!(restored, page);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut snap = Snapshot::capture(&sample_page());
        snap.version = 99;
        assert!(matches!(
            snap.restore(),
            Err(SnapshotError::Version { found: 99, .. })
        ));
        let json = snap.to_json().unwrap();
        assert_eq!(restore_or_empty(&json), Page::new());
        assert_eq!(restore_or_empty("{not json"), Page::new());
    }

    #[test]
    fn counters_raised_past_restored_ids() {
        let mut snap = Snapshot::capture(&sample_page());
        snap.panel_counter = 0;
        snap.bubble_counter = 1;
        let mut page = snap.restore().unwrap();
        assert_eq!(page.counters.panel, 3);
        let fresh = page.counters.next_bubble();
        assert!(page.panels().all(|p| p.bubble(fresh).is_none()));
    }

    #[test]
    fn bubble_defaults_fill_gaps() {
        let record = BubbleRecord {
            id: BubbleId(5),
            kind: Some("thought".into()),
            shape: Some("hexagon".into()),
            fill_color: Some("not-a-color".into()),
            ..Default::default()
        };
        let b = record.restore((800.0, 450.0));
        assert_eq!(b.shape, BubbleShape::Oval);
        assert_eq!(b.border_style, BorderStyle::Solid);
        assert_eq!(b.fill_color, Color::WHITE);
        assert_eq!(b.tail, TailDir::BottomLeft);
        assert_eq!(b.text, "...");
    }

    #[test]
    fn legacy_pixels_become_percentages() {
        let record = BubbleRecord {
            id: BubbleId(1),
            x: Some(200.0),
            y: Some(45.0),
            w: Some(160.0),
            h: Some(90.0),
            ..Default::default()
        };
        let b = record.restore((800.0, 450.0));
        assert_eq!((b.x_pct, b.y_pct, b.w_pct, b.h_pct), (25.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn overlay_defaults_and_clamps() {
        let json = r#"{"version":1,"rows":[{"id":1,"type":"single","panels":[
            {"id":1,"src":"a.png","overlays":[
                {"id":3,"file":"fx.png"},
                {"id":4,"file":"glow.png","opacity":4,"blendMode":"screen"},
                {"id":5,"file":"old.png","blendMode":"dissolve"}
            ]}]}]}"#;
        let page = Snapshot::from_json(json).unwrap().restore().unwrap();
        let p = &page.rows[0].panels[0];
        let ov: Vec<&Overlay> = p.overlays().collect();
        assert_eq!(ov[0].opacity, 0.5);
        assert_eq!(ov[1].opacity, 1.0);
        assert_eq!(ov[1].blend_mode, BlendMode::Screen);
        assert_eq!(ov[2].blend_mode, BlendMode::Normal);
        assert_eq!(page.counters.overlay, 5);
    }
}
