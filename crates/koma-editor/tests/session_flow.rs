//! Integration tests: pointer gestures, selection and autosave through
//! the editor session.

use koma_core::bubble::BubbleKind;
use koma_core::geometry::PageMetrics;
use koma_core::id::{BubbleId, PanelId};
use koma_core::import::parse_import;
use koma_editor::{EditorSession, InputEvent, Mutation, Outcome, Selection, ToolKind};
use pretty_assertions::assert_eq;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

/// One 800×450 panel holding one speech bubble at 160,90 160×45.
fn session_with_bubble() -> (EditorSession, PanelId, BubbleId) {
    let mut s = EditorSession::default();
    let Ok(Outcome::Panel(panel)) = s.apply(Mutation::AddPanel {
        src: "p.png".into(),
        aspect: None,
    }) else {
        panic!("panel not added");
    };
    let Ok(Outcome::Bubble(bubble)) = s.apply(Mutation::AddBubble {
        panel,
        kind: BubbleKind::Speech,
    }) else {
        panic!("bubble not added");
    };
    (s, panel, bubble)
}

fn bubble_pct(s: &EditorSession, panel: PanelId, bubble: BubbleId) -> (f32, f32, f32, f32) {
    let b = s.page().panel(panel).unwrap().bubble(bubble).unwrap();
    (b.x_pct, b.y_pct, b.w_pct, b.h_pct)
}

// ─── Pointer gestures ────────────────────────────────────────────────────

#[test]
fn drag_is_clamped_to_the_panel() {
    let (mut s, panel, bubble) = session_with_bubble();
    s.select_panel(None);

    assert!(!s.handle_input(&InputEvent::PointerDown { x: 200.0, y: 100.0 }));
    assert_eq!(
        s.selection,
        Selection {
            panel: Some(panel),
            bubble: Some(bubble)
        }
    );
    assert!(s.handle_input(&InputEvent::PointerMove { x: 1000.0, y: 100.0 }));
    s.handle_input(&InputEvent::PointerUp { x: 1000.0, y: 100.0 });

    let (x, y, w, h) = bubble_pct(&s, panel, bubble);
    assert!(close(x, 80.0), "x = {x}");
    assert!(close(y, 20.0));
    assert!(close(w, 20.0));
    assert!(close(h, 10.0));
}

#[test]
fn resize_stops_at_minimum_size() {
    let (mut s, panel, bubble) = session_with_bubble();
    s.handle_input(&InputEvent::PointerDown { x: 315.0, y: 130.0 });
    s.handle_input(&InputEvent::PointerMove { x: 215.0, y: 120.0 });
    s.handle_input(&InputEvent::PointerUp { x: 215.0, y: 120.0 });

    let (x, _, w, h) = bubble_pct(&s, panel, bubble);
    assert!(close(x, 20.0));
    assert!(close(w, 7.5), "w = {w}");
    assert!(close(h, 35.0 / 450.0 * 100.0), "h = {h}");
}

#[test]
fn pan_tool_moves_the_image() {
    let (mut s, panel, _) = session_with_bubble();
    s.set_tool(ToolKind::Pan);
    s.handle_input(&InputEvent::PointerDown { x: 600.0, y: 300.0 });
    s.handle_input(&InputEvent::PointerMove { x: 620.0, y: 290.0 });
    s.handle_input(&InputEvent::PointerUp { x: 620.0, y: 290.0 });
    let p = s.page().panel(panel).unwrap();
    assert_eq!((p.ox, p.oy), (20.0, -10.0));
    assert_eq!(s.selection.panel, Some(panel));
}

#[test]
fn clicking_the_background_clears_selection() {
    let (mut s, _, _) = session_with_bubble();
    s.handle_input(&InputEvent::PointerDown { x: 10.0, y: 900.0 });
    assert_eq!(s.selection, Selection::default());
}

// ─── Autosave ────────────────────────────────────────────────────────────

#[test]
fn autosave_only_after_edits() {
    let (mut s, panel, _) = session_with_bubble();
    assert_eq!(s.revision(), 2);
    assert!(s.snapshot_if_changed().is_some());
    assert!(s.snapshot_if_changed().is_none());

    // A move that goes nowhere is not an edit.
    s.apply(Mutation::MoveRow { row: 0, delta: -1 }).unwrap();
    assert!(s.snapshot_if_changed().is_none());

    s.apply(Mutation::SetScale { panel, scale: 150.0 }).unwrap();
    assert!(s.snapshot_if_changed().is_some());
}

#[test]
fn snapshot_restores_page_and_selection() {
    let (s, panel, bubble) = session_with_bubble();
    let json = s.snapshot().to_json().unwrap();
    let restored = EditorSession::restore(&json, PageMetrics::default());
    assert_eq!(restored.page(), s.page());
    assert_eq!(
        restored.selection,
        Selection {
            panel: Some(panel),
            bubble: Some(bubble)
        }
    );
    assert_eq!(restored.revision(), 0);
}

#[test]
fn overflowing_width_is_rejected_and_autosave_survives() {
    let mut s = EditorSession::default();
    let mut panels = Vec::new();
    for src in ["a.png", "b.png"] {
        let Ok(Outcome::Panel(id)) = s.apply(Mutation::AddPanel {
            src: src.into(),
            aspect: None,
        }) else {
            panic!("panel not added");
        };
        panels.push(id);
    }
    s.apply(Mutation::CreateGroup {
        panels: panels.clone(),
        layout: "col-2".into(),
    })
    .unwrap();

    // 1e39 does not fit an f32 and parses as infinity.
    let json = format!(r#"{{"op":"setWidth","panel":{},"width":1e39}}"#, panels[0].0);
    let mutation: Mutation = serde_json::from_str(&json).unwrap();
    assert!(s.apply(mutation).is_err());

    let saved = s.snapshot().to_json().unwrap();
    let restored = EditorSession::restore(&saved, PageMetrics::default());
    assert_eq!(restored.page().panel_count(), 2);
    let widths: Vec<f32> = restored.page().panels().map(|p| p.width).collect();
    assert_eq!(widths, vec![50.0, 50.0]);
}

#[test]
fn unreadable_autosave_starts_empty() {
    let s = EditorSession::restore("{ not json", PageMetrics::default());
    assert_eq!(s.page().panel_count(), 0);
    assert_eq!(s.selection, Selection::default());
}

// ─── Import ──────────────────────────────────────────────────────────────

#[test]
fn import_counts_as_an_edit() {
    let (mut s, _, _) = session_with_bubble();
    s.snapshot_if_changed();
    let doc = parse_import(
        r#"{"panels":[{"id":1,"bubbles":[{"text":"Hi","x":5,"y":5,"w":30,"h":20}]}]}"#,
    )
    .unwrap();
    let report = s.import_bubbles(&doc);
    assert_eq!(report.imported, 1);
    assert!(s.snapshot_if_changed().is_some());
}
