//! Integration tests: snapshot → layout → raster export.

use image::{Rgba, RgbaImage};
use koma_core::geometry::PageMetrics;
use koma_core::snapshot::Snapshot;
use koma_render::{ExportOptions, SourceCache, export_page, export_png, hit_test};
use pretty_assertions::assert_eq;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const PANEL: Rgba<u8> = Rgba([0x11, 0x11, 0x11, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SFX: Rgba<u8> = Rgba([0xff, 0xee, 0x00, 255]);

fn load_page() -> koma_core::Page {
    let input = include_str!("fixtures/two_row_page.json");
    Snapshot::from_json(input).unwrap().restore().unwrap()
}

fn seeded_cache() -> SourceCache {
    let mut cache = SourceCache::new();
    cache.insert("red", RgbaImage::from_pixel(8, 8, RED));
    cache.insert("blue", RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])));
    cache.insert("white", RgbaImage::from_pixel(2, 2, WHITE));
    cache
}

// ─── Page frame ──────────────────────────────────────────────────────────

#[test]
fn export_matches_page_layout() {
    let page = load_page();
    let img = export_page(&page, &mut seeded_cache(), &ExportOptions::default()).unwrap();
    // 200 + gap 4 + 100
    assert_eq!(img.dimensions(), (800, 304));
    // Column gap between the grouped panels.
    assert_eq!(*img.get_pixel(400, 100), BLACK);
    // Row gap.
    assert_eq!(*img.get_pixel(100, 202), BLACK);
    // Empty panel keeps its dark fill.
    assert_eq!(*img.get_pixel(50, 280), PANEL);
}

// ─── Layers ──────────────────────────────────────────────────────────────

#[test]
fn images_and_overlays_composite() {
    let page = load_page();
    let img = export_page(&page, &mut seeded_cache(), &ExportOptions::default()).unwrap();
    assert_eq!(*img.get_pixel(200, 100), RED);
    // Opaque white screened over blue is white.
    assert_eq!(*img.get_pixel(600, 100), WHITE);
}

#[test]
fn sfx_bubble_is_painted_without_border() {
    let page = load_page();
    let img = export_page(&page, &mut seeded_cache(), &ExportOptions::default()).unwrap();
    assert_eq!(*img.get_pixel(400, 251), SFX);
}

#[test]
fn unresolved_sources_leave_the_panel_fill() {
    let page = load_page();
    let img = export_page(&page, &mut SourceCache::new(), &ExportOptions::default()).unwrap();
    assert_eq!(*img.get_pixel(200, 100), PANEL);
    assert_eq!(*img.get_pixel(600, 100), PANEL);
}

#[test]
fn export_at_double_width() {
    let page = load_page();
    let options = ExportOptions {
        metrics: PageMetrics {
            page_width: 1600.0,
            gap: 8.0,
        },
        ..ExportOptions::default()
    };
    let img = export_page(&page, &mut seeded_cache(), &options).unwrap();
    assert_eq!(img.dimensions(), (1600, 608));
    assert_eq!(*img.get_pixel(800, 502), SFX);
}

#[test]
fn png_bytes_decode_back() {
    let page = load_page();
    let bytes = export_png(&page, &mut seeded_cache(), &ExportOptions::default()).unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (800, 304));
    assert_eq!(*decoded.get_pixel(200, 100), RED);
}

// ─── Hit testing against the same layout ─────────────────────────────────

#[test]
fn hit_test_finds_sfx_bubble() {
    let page = load_page();
    let layout = koma_core::layout_page(&page, &PageMetrics::default());
    let hit = hit_test(&page, &layout, 400.0, 251.0).unwrap();
    assert!(matches!(hit, koma_render::Hit::Bubble { .. }));
    assert_eq!(hit.panel().0, 3);
}
