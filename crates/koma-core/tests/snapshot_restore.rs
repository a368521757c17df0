//! Integration tests: restoring autosaves, including ones written before
//! percentages, layers, and schema versions existed.

use koma_core::geometry::{PageMetrics, layout_page};
use koma_core::snapshot::{SCHEMA_VERSION, Snapshot};
use koma_core::{
    BlendMode, BubbleId, BubbleKind, LayerId, OverlayId, Page, PanelId, RowKind, TailDir,
    lint_page, restore_or_empty,
};
use pretty_assertions::assert_eq;

const LEGACY: &str = include_str!("fixtures/legacy_snapshot.json");

fn legacy_page() -> Page {
    Snapshot::from_json(LEGACY).unwrap().restore().unwrap()
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.01
}

#[test]
fn legacy_autosave_restores_every_row() {
    let page = legacy_page();
    assert_eq!(page.rows.len(), 3);
    assert_eq!(page.rows[0].kind, RowKind::Single);
    assert_eq!(
        page.rows[1].kind,
        RowKind::Group {
            layout: String::new()
        }
    );
    assert_eq!(page.rows[2].layout(), Some("col-2-stack-r"));
    assert_eq!(page.panel_count(), 6);
}

#[test]
fn legacy_selection_keys_are_read() {
    let snap = Snapshot::from_json(LEGACY).unwrap();
    assert_eq!(snap.version, SCHEMA_VERSION);
    assert_eq!(snap.selected_panel, Some(PanelId(2)));
    assert_eq!(snap.selected_bubble, None);
}

#[test]
fn stale_counters_are_raised_past_restored_ids() {
    let mut page = legacy_page();
    assert_eq!(page.counters.panel, 6);
    assert_eq!(page.counters.bubble, 7);
    assert_eq!(page.counters.row, 3);
    assert_eq!(page.counters.overlay, 2);

    let a = page.add_panel("new.png");
    assert_eq!(a, PanelId(7));
    let b = page.add_bubble(a, BubbleKind::Speech).unwrap();
    assert_eq!(b, BubbleId(8));
}

#[test]
fn pixel_bubbles_become_percentages() {
    let page = legacy_page();
    let b = page.panel(PanelId(1)).unwrap().bubble(BubbleId(1)).unwrap();
    assert_eq!((b.x_pct, b.y_pct, b.w_pct, b.h_pct), (25.0, 10.0, 20.0, 20.0));
    assert_eq!(b.tail, TailDir::BottomLeft);
}

#[test]
fn layers_are_relinked_and_sorted() {
    let page = legacy_page();
    let p = page.panel(PanelId(4)).unwrap();
    assert_eq!(
        p.layer_ids(),
        vec![
            LayerId::Image(PanelId(4)),
            LayerId::Overlay(OverlayId(2)),
            LayerId::Bubble(BubbleId(7)),
        ]
    );
    let overlay = p.overlay(OverlayId(2)).unwrap();
    assert_eq!(overlay.blend_mode, BlendMode::Multiply);
    assert!(close(overlay.opacity, 0.3));
    assert_eq!(p.bubble(BubbleId(7)).unwrap().kind, BubbleKind::Thought);
}

#[test]
fn legacy_row_uses_weighted_fallback_geometry() {
    let page = legacy_page();
    let widths: Vec<f32> = page.rows[1].panels.iter().map(|p| p.width).collect();
    assert!(close(widths[0], 50.0) && close(widths[1], 50.0));

    let layout = layout_page(&page, &PageMetrics::default());
    let row = &layout.rows[1];
    assert!(close(row.y, 454.0));
    assert!(close(row.height, 320.0));
    let right = layout.panel_box(PanelId(3)).unwrap().rect;
    assert!(close(right.x, 402.0));
    assert!(close(right.width, 398.0));

    let last = layout.panel_box(PanelId(6)).unwrap().rect;
    assert!(close(last.y, 778.0 + 227.0));
    assert!(close(layout.height, 1228.0));
}

#[test]
fn legacy_row_is_reported_by_lint() {
    let diags = lint_page(&legacy_page());
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].rule, "unknown-layout");
}

#[test]
fn restored_page_survives_another_round_trip() {
    let page = legacy_page();
    let json = Snapshot::capture(&page).to_json().unwrap();
    assert_eq!(restore_or_empty(&json), page);

    let bytes = Snapshot::capture(&page).to_msgpack().unwrap();
    let back = Snapshot::from_msgpack(&bytes).unwrap().restore().unwrap();
    assert_eq!(back, page);
}

#[test]
fn foreign_schema_starts_over() {
    let json = LEGACY.replacen('{', "{\"version\": 2,", 1);
    assert_eq!(restore_or_empty(&json), Page::new());
    assert_eq!(restore_or_empty("not json"), Page::new());
}
