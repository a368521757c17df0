//! Bulk bubble import from JSON.
//!
//! ```json
//! { "panels": [ { "id": 1, "bubbles": [ { "text": "Hi!", "x": 10, "y": 8, "w": 30, "h": 12 } ] } ] }
//! ```
//!
//! `id` is the 1-based panel index shown in the editor; entries without
//! one are reported as skipped. `x`, `y`, `w`, `h` are percentages of the
//! panel box. Every imported bubble is a speech
//! bubble; optional style fields override its defaults.

use crate::id::BubbleId;
use crate::model::Page;
use crate::snapshot::BubbleRecord;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON syntax: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("missing or invalid \"panels\" array")]
    MissingPanels,
    #[error("panel at index {0} has an invalid \"id\" field")]
    PanelId(usize),
    #[error("panel {0} missing or invalid \"bubbles\" array")]
    Bubbles(String),
    #[error("bubble missing required field \"text\" at panel {panel}, bubble index {bubble}")]
    Text { panel: String, bubble: usize },
    #[error("bubble missing or invalid field \"{field}\" at panel {panel}, bubble index {bubble}")]
    Field {
        field: &'static str,
        panel: String,
        bubble: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportDocument {
    pub panels: Vec<ImportPanel>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportPanel {
    /// 1-based panel index. Missing, null and fractional indices name no
    /// panel and are skipped.
    #[serde(default, deserialize_with = "panel_index")]
    pub id: Option<usize>,
    #[serde(default)]
    pub bubbles: Vec<ImportBubble>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBubble {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default, alias = "tail")]
    pub tail_dir: Option<String>,
    #[serde(default)]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub stroke_color: Option<String>,
    #[serde(default)]
    pub shape: Option<String>,
    #[serde(default)]
    pub border_style: Option<String>,
}

impl ImportBubble {
    fn record(&self, id: BubbleId) -> BubbleRecord {
        BubbleRecord {
            id,
            kind: Some("speech".to_string()),
            text: Some(self.text.clone()),
            x_pct: Some(self.x),
            y_pct: Some(self.y),
            w_pct: Some(self.w),
            h_pct: Some(self.h),
            font_size: self.font_size,
            tail: self.tail_dir.clone(),
            fill_color: self.fill_color.clone(),
            text_color: self.text_color.clone(),
            stroke_color: self.stroke_color.clone(),
            shape: self.shape.clone(),
            border_style: self.border_style.clone(),
            ..Default::default()
        }
    }
}

fn panel_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let index = Option::<f64>::deserialize(deserializer)?;
    Ok(index
        .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64)
        .map(|n| n as usize))
}

/// Outcome of [`Page::import_bubbles`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Panel indices that matched no panel; `None` for entries without a
    /// usable one.
    pub skipped: Vec<Option<usize>>,
}

// ─── Parsing ─────────────────────────────────────────────────────────────

/// Parse and validate an import document.
pub fn parse_import(input: &str) -> Result<ImportDocument, ImportError> {
    let value: Value = serde_json::from_str(input)?;
    validate(&value)?;
    Ok(serde_json::from_value(value)?)
}

fn validate(doc: &Value) -> Result<(), ImportError> {
    let panels = doc
        .get("panels")
        .and_then(Value::as_array)
        .ok_or(ImportError::MissingPanels)?;

    for (i, panel) in panels.iter().enumerate() {
        let id = match panel.get("id") {
            None | Some(Value::Null) => format!("#{}", i + 1),
            Some(v) if v.is_number() => v.to_string(),
            Some(_) => return Err(ImportError::PanelId(i)),
        };
        let bubbles = panel
            .get("bubbles")
            .and_then(Value::as_array)
            .ok_or_else(|| ImportError::Bubbles(id.clone()))?;

        for (j, bubble) in bubbles.iter().enumerate() {
            let has_text = bubble
                .get("text")
                .and_then(Value::as_str)
                .is_some_and(|t| !t.is_empty());
            if !has_text {
                return Err(ImportError::Text {
                    panel: id,
                    bubble: j,
                });
            }
            for field in ["x", "y", "w", "h"] {
                if !bubble.get(field).is_some_and(Value::is_number) {
                    return Err(ImportError::Field {
                        field,
                        panel: id,
                        bubble: j,
                    });
                }
            }
        }
    }
    Ok(())
}

// ─── Applying ────────────────────────────────────────────────────────────

impl Page {
    /// Add every bubble of `doc` on top of its panel's stack. Entries whose
    /// index matches no panel are reported and create nothing.
    pub fn import_bubbles(&mut self, doc: &ImportDocument) -> ImportReport {
        let mut report = ImportReport::default();
        for entry in &doc.panels {
            let target = entry
                .id
                .and_then(|n| self.panel_by_index(n))
                .map(|p| p.id);
            let Some(panel) = target else {
                log::debug!("import: no panel at index {:?}", entry.id);
                report.skipped.push(entry.id);
                continue;
            };
            for bubble in &entry.bubbles {
                let added = self.add_bubble_with(panel, |id| bubble.record(id).restore((0.0, 0.0)));
                if added.is_ok() {
                    report.imported += 1;
                }
            }
        }
        report
    }
}
