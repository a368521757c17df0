//! WASM bridge for Koma: exposes the page editor to the browser UI.
//!
//! Compiled via `wasm-pack build --target web`. Structured data crosses
//! the boundary as JSON strings; edits are JSON-encoded mutations.

mod render2d;

use koma_core::geometry::{PageMetrics, dom_layout};
use koma_core::id::{BubbleId, PanelId};
use koma_core::import::parse_import;
use koma_core::layout::{find_layout, get_layouts};
use koma_core::lint::lint_page;
use koma_editor::{EditorSession, InputEvent, Mutation, ToolKind};
use koma_render::hit::Hit;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::CanvasRenderingContext2d;

/// Milliseconds between autosaves when the page keeps changing.
const AUTOSAVE_INTERVAL_MS: f64 = 1000.0;

/// The main WASM-facing editor controller.
///
/// Holds the editor session; every interaction from the page's JS goes
/// through this struct.
#[wasm_bindgen]
pub struct KomaEditor {
    session: EditorSession,
    last_save_ms: Option<f64>,
}

#[wasm_bindgen]
impl KomaEditor {
    /// Create an editor for an empty page rendered `page_width` pixels wide.
    #[wasm_bindgen(constructor)]
    pub fn new(page_width: f32) -> Self {
        console_error_panic_hook_setup();
        Self {
            session: EditorSession::new(metrics_for(page_width)),
            last_save_ms: None,
        }
    }

    /// Resume from an autosave string. Unreadable input gives an empty page.
    pub fn restore(json: &str, page_width: f32) -> Self {
        console_error_panic_hook_setup();
        Self {
            session: EditorSession::restore(json, metrics_for(page_width)),
            last_save_ms: None,
        }
    }

    /// Change the render width.
    pub fn resize(&mut self, page_width: f32) {
        self.session.set_metrics(metrics_for(page_width));
    }

    pub fn revision(&self) -> f64 {
        self.session.revision() as f64
    }

    // ─── Edits ───────────────────────────────────────────────────────────

    /// Apply a JSON mutation such as `{"op":"setHeight","panel":2,"height":300}`.
    /// Returns `{"ok":true,"outcome":…}` or `{"ok":false,"error":"…"}`.
    pub fn apply(&mut self, mutation_json: &str) -> String {
        let mutation: Mutation = match serde_json::from_str(mutation_json) {
            Ok(m) => m,
            Err(e) => return error_json(&format!("invalid mutation: {e}")),
        };
        match self.session.apply(mutation) {
            Ok(outcome) => serde_json::json!({ "ok": true, "outcome": outcome }).to_string(),
            Err(e) => error_json(&e.to_string()),
        }
    }

    /// Bulk bubble import. Returns the import report or an error.
    pub fn import_bubbles(&mut self, json: &str) -> String {
        match parse_import(json) {
            Ok(doc) => {
                let report = self.session.import_bubbles(&doc);
                serde_json::json!({ "ok": true, "report": report }).to_string()
            }
            Err(e) => error_json(&e.to_string()),
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    /// Select a panel; a negative id clears the selection.
    pub fn select_panel(&mut self, id: i32) {
        let panel = u32::try_from(id).ok().map(PanelId);
        self.session.select_panel(panel);
    }

    pub fn select_bubble(&mut self, id: u32) -> bool {
        self.session.select_bubble(BubbleId(id)).is_ok()
    }

    pub fn selection_json(&self) -> String {
        serde_json::to_string(&self.session.selection).unwrap_or_else(|_| "{}".to_string())
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    /// `"bubble"` or `"pan"`. Unknown names are ignored.
    pub fn set_tool(&mut self, name: &str) {
        match name {
            "bubble" => self.session.set_tool(ToolKind::Bubble),
            "pan" => self.session.set_tool(ToolKind::Pan),
            other => log::debug!("unknown tool `{other}`"),
        }
    }

    /// Handle pointer down. Returns true if the page changed.
    pub fn handle_pointer_down(&mut self, x: f32, y: f32) -> bool {
        self.session.handle_input(&InputEvent::PointerDown { x, y })
    }

    pub fn handle_pointer_move(&mut self, x: f32, y: f32) -> bool {
        self.session.handle_input(&InputEvent::PointerMove { x, y })
    }

    pub fn handle_pointer_up(&mut self, x: f32, y: f32) -> bool {
        self.session.handle_input(&InputEvent::PointerUp { x, y })
    }

    /// What lies under a point, as JSON (`null` over the background).
    pub fn hit_json(&self, x: f32, y: f32) -> String {
        let hit = self.session.hit(x, y).map(HitJson::from);
        serde_json::to_string(&hit).unwrap_or_else(|_| "null".to_string())
    }

    // ─── Read-only views ─────────────────────────────────────────────────

    /// Row and cell placement for the DOM renderer.
    pub fn dom_layout_json(&self) -> String {
        let rows = dom_layout(self.session.page(), &self.session.metrics());
        serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string())
    }

    /// Page in snapshot form, selection included.
    pub fn page_json(&self) -> String {
        self.session
            .snapshot()
            .to_json()
            .unwrap_or_else(|e| error_json(&e.to_string()))
    }

    pub fn lint_json(&self) -> String {
        serde_json::to_string(&lint_page(self.session.page())).unwrap_or_else(|_| "[]".to_string())
    }

    /// Registered layouts for `count` panels.
    pub fn layouts_json(count: usize) -> String {
        serde_json::to_string(&get_layouts(count)).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Autosave ────────────────────────────────────────────────────────

    /// Snapshot JSON when the page changed and the last save is at least
    /// a second old; `undefined` otherwise. Call from a timer.
    pub fn autosave(&mut self) -> Option<String> {
        let now = now_ms();
        if self.last_save_ms.is_some_and(|last| now - last < AUTOSAVE_INTERVAL_MS) {
            return None;
        }
        let snapshot = self.session.snapshot_if_changed()?;
        self.last_save_ms = Some(now);
        match snapshot.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                log::warn!("autosave failed: {e}");
                None
            }
        }
    }

    // ─── Canvas ──────────────────────────────────────────────────────────

    /// Draw the page wireframe.
    pub fn render(&self, ctx: &CanvasRenderingContext2d) {
        render2d::render_page(
            ctx,
            self.session.page(),
            self.session.layout(),
            &self.session.selection,
            &render2d::CanvasTheme::dark(),
        );
    }

    /// Draw a thumbnail of a registered layout. Returns false for an
    /// unknown key.
    pub fn render_layout_preview(ctx: &CanvasRenderingContext2d, key: &str, width: f64, height: f64) -> bool {
        let Some(def) = find_layout(key) else {
            return false;
        };
        render2d::draw_layout_preview(ctx, &def.resolve(), width, height, &render2d::CanvasTheme::dark());
        true
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum HitJson {
    Panel {
        panel: PanelId,
    },
    Bubble {
        panel: PanelId,
        bubble: BubbleId,
        #[serde(rename = "onHandle")]
        on_handle: bool,
    },
}

impl From<Hit> for HitJson {
    fn from(hit: Hit) -> Self {
        match hit {
            Hit::Panel(panel) => HitJson::Panel { panel },
            Hit::Bubble {
                panel,
                bubble,
                on_handle,
            } => HitJson::Bubble {
                panel,
                bubble,
                on_handle,
            },
        }
    }
}

fn metrics_for(page_width: f32) -> PageMetrics {
    let base = PageMetrics::default();
    if page_width.is_finite() && page_width > 0.0 {
        base.scaled(page_width / base.page_width)
    } else {
        base
    }
}

fn error_json(message: &str) -> String {
    serde_json::json!({ "ok": false, "error": message }).to_string()
}

fn now_ms() -> f64 {
    #[cfg(target_arch = "wasm32")]
    {
        js_sys::Date::now()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        0.0
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Koma WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Standalone functions (no editor needed) ─────────────────────────────

/// Validate an import document. Returns `{"ok":true}` or `{"ok":false,"error":"…"}`.
#[wasm_bindgen]
pub fn validate_import(json: &str) -> String {
    match parse_import(json) {
        Ok(_) => r#"{"ok":true}"#.to_string(),
        Err(e) => error_json(&e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor_with_panel() -> KomaEditor {
        let mut ed = KomaEditor::new(800.0);
        let out = ed.apply(r#"{"op":"addPanel","src":"a.png"}"#);
        assert!(out.contains(r#""ok":true"#), "{out}");
        ed
    }

    #[test]
    fn apply_reports_outcome_and_errors() {
        let mut ed = editor_with_panel();
        let out = ed.apply(r#"{"op":"setHeight","panel":1,"height":300}"#);
        assert_eq!(out, r#"{"ok":true,"outcome":{"kind":"done"}}"#);
        let out = ed.apply(r#"{"op":"setHeight","panel":7,"height":300}"#);
        assert_eq!(out, r#"{"error":"panel 7 not found","ok":false}"#);
        let out = ed.apply(r#"{"op":"fly"}"#);
        assert!(out.contains("invalid mutation"));
    }

    #[test]
    fn hit_and_selection_json() {
        let mut ed = editor_with_panel();
        assert_eq!(ed.hit_json(10.0, 10.0), r#"{"kind":"panel","panel":1}"#);
        assert_eq!(ed.hit_json(10.0, 2000.0), "null");
        ed.select_panel(-1);
        assert_eq!(ed.selection_json(), r#"{"panel":null,"bubble":null}"#);
    }

    #[test]
    fn autosave_hands_out_each_change_once() {
        let mut ed = editor_with_panel();
        let saved = ed.autosave().unwrap();
        assert!(saved.contains(r#""version":1"#));
        assert!(ed.autosave().is_none());
        let again = KomaEditor::restore(&saved, 400.0);
        assert_eq!(again.session.page().panel_count(), 1);
    }

    #[test]
    fn layouts_and_validation() {
        let layouts = KomaEditor::layouts_json(3);
        assert!(layouts.contains("col-2-stack-r"));
        assert_eq!(validate_import(r#"{"panels":[]}"#), r#"{"ok":true}"#);
        assert!(validate_import("[]").contains(r#""ok":false"#));
    }
}
