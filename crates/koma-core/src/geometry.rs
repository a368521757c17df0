//! Geometry projector.
//!
//! Turns the page into pixel boxes. The interactive view and the
//! rasterized export both read [`layout_page`], so the two agree on every
//! track boundary. [`dom_layout`] restates the same boxes as CSS grid
//! templates and percentages for the browser.

use crate::id::{PanelId, RowId};
use crate::layout::{GridCell, GridLayout, fallback_grid, find_layout};
use crate::model::{Page, Panel, PixelBox, Row, RowKind, STANDARD_WIDTH};
use crate::template::Span;
use serde::{Deserialize, Serialize};

/// Page geometry shared by every renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetrics {
    /// Rendered page width in pixels.
    pub page_width: f32,
    /// Gap between grid tracks and between rows, in pixels.
    pub gap: f32,
}

impl Default for PageMetrics {
    fn default() -> Self {
        Self {
            page_width: STANDARD_WIDTH,
            gap: 4.0,
        }
    }
}

impl PageMetrics {
    /// Factor from authored pixels (at the standard width) to rendered pixels.
    pub fn unit(&self) -> f32 {
        self.page_width / STANDARD_WIDTH
    }

    /// Same page rendered `factor` times larger, gaps included.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            page_width: self.page_width * factor,
            gap: self.gap * factor,
        }
    }
}

// ─── Tracks ──────────────────────────────────────────────────────────────

/// One resolved grid track: offset from the grid origin and size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub start: f32,
    pub size: f32,
}

impl Track {
    pub fn end(&self) -> f32 {
        self.start + self.size
    }
}

/// Split `total` pixels into tracks proportional to `fractions`, with
/// `gap` pixels between consecutive tracks.
pub fn resolve_tracks(fractions: &[f32], total: f32, gap: f32) -> Vec<Track> {
    if fractions.is_empty() {
        return Vec::new();
    }
    let gaps = gap * (fractions.len() - 1) as f32;
    let available = (total - gaps).max(0.0);
    let sum: f32 = fractions.iter().sum();

    let mut tracks = Vec::with_capacity(fractions.len());
    let mut cursor = 0.0;
    for fr in fractions {
        let size = if sum > 0.0 {
            available * fr / sum
        } else {
            available / fractions.len() as f32
        };
        tracks.push(Track {
            start: cursor,
            size,
        });
        cursor += size + gap;
    }
    tracks
}

/// Pixel extent of a span over resolved tracks: from the start of its
/// first track to the end of its last, gaps in between included.
pub fn span_extent(tracks: &[Track], span: Span) -> Option<(f32, f32)> {
    let range = span.tracks();
    let first = tracks.get(range.start)?;
    let last = tracks.get(range.end.checked_sub(1)?)?;
    Some((first.start, last.end() - first.start))
}

// ─── Page layout ─────────────────────────────────────────────────────────

/// A panel's resolved box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PanelBox {
    pub panel: PanelId,
    pub rect: PixelBox,
    pub cell: GridCell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowLayout {
    pub row: RowId,
    pub y: f32,
    pub height: f32,
    /// Grid used to place the panels; `None` for single rows.
    pub grid: Option<GridLayout>,
    pub panels: Vec<PanelBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub rows: Vec<RowLayout>,
}

impl PageLayout {
    pub fn panel_box(&self, id: PanelId) -> Option<&PanelBox> {
        self.rows
            .iter()
            .flat_map(|r| r.panels.iter())
            .find(|b| b.panel == id)
    }

    pub fn panel_boxes(&self) -> impl Iterator<Item = &PanelBox> {
        self.rows.iter().flat_map(|r| r.panels.iter())
    }
}

/// The grid a row is placed with. Unregistered layout keys, legacy rows,
/// and groups whose panel count no longer matches their layout fall back
/// to one row of columns weighted by panel width. Grouped widths start at
/// `100 / n`, so an unedited row falls back to even columns.
pub fn row_grid(row: &Row) -> Option<GridLayout> {
    match &row.kind {
        RowKind::Single => None,
        RowKind::Group { layout } => match find_layout(layout) {
            Some(def) if def.count == row.panels.len() => Some(def.resolve()),
            _ => {
                log::debug!("row {}: layout `{layout}` unavailable, using fallback", row.id);
                let weights: Vec<f32> = row.panels.iter().map(|p| p.width).collect();
                Some(fallback_grid(&weights))
            }
        },
    }
}

/// Authored row height: the tallest panel.
fn row_height(row: &Row) -> f32 {
    row.panels.iter().map(|p| p.height).fold(0.0, f32::max)
}

/// Resolve every panel of the page to a pixel box.
pub fn layout_page(page: &Page, metrics: &PageMetrics) -> PageLayout {
    let unit = metrics.unit();
    let width = metrics.page_width;
    let mut rows = Vec::with_capacity(page.rows.len());
    let mut y = 0.0;

    for (i, row) in page.rows.iter().enumerate() {
        if i > 0 {
            y += metrics.gap;
        }
        let height = row_height(row) * unit;
        let grid = row_grid(row);
        let panels = match &grid {
            None => row
                .panels
                .iter()
                .map(|p| PanelBox {
                    panel: p.id,
                    rect: PixelBox::new(0.0, y, width, height),
                    cell: GridCell::auto(0, 1),
                })
                .collect(),
            Some(grid) => place_in_grid(&row.panels, grid, PixelBox::new(0.0, y, width, height), metrics.gap),
        };
        rows.push(RowLayout {
            row: row.id,
            y,
            height,
            grid,
            panels,
        });
        y += height;
    }

    PageLayout {
        width,
        height: y,
        rows,
    }
}

fn place_in_grid(panels: &[Panel], grid: &GridLayout, area: PixelBox, gap: f32) -> Vec<PanelBox> {
    let cols = resolve_tracks(&grid.cols, area.width, gap);
    let rows = resolve_tracks(&grid.rows, area.height, gap);
    panels
        .iter()
        .zip(grid.positions.iter())
        .map(|(p, cell)| {
            let (x, w) = span_extent(&cols, cell.col).unwrap_or((0.0, area.width));
            let (y, h) = span_extent(&rows, cell.row).unwrap_or((0.0, area.height));
            PanelBox {
                panel: p.id,
                rect: PixelBox::new(area.x + x, area.y + y, w, h),
                cell: *cell,
            }
        })
        .collect()
}

// ─── Image placement ─────────────────────────────────────────────────────

/// Destination rectangle of a panel's image, before clipping to the box.
///
/// The image first covers the box (scaled to fill it, centred), then is
/// zoomed by `scale` percent about its centre and panned by `(ox, oy)`.
/// This matches `object-fit: cover` followed by
/// `transform: translate(ox, oy) scale(s)` with a centred origin.
pub fn place_image(panel: &Panel, area: &PixelBox, natural: (f32, f32), unit: f32) -> PixelBox {
    let (nw, nh) = natural;
    let cover = if nw > 0.0 && nh > 0.0 {
        (area.width / nw).max(area.height / nh)
    } else {
        1.0
    };
    let zoom = panel.scale / 100.0;
    let w = nw * cover * zoom;
    let h = nh * cover * zoom;
    let (cx, cy) = area.center();
    PixelBox::new(
        cx + panel.ox * unit - w / 2.0,
        cy + panel.oy * unit - h / 2.0,
        w,
        h,
    )
}

/// CSS transform reproducing [`place_image`] in the browser.
pub fn image_transform(panel: &Panel) -> String {
    format!(
        "translate({}px, {}px) scale({})",
        panel.ox,
        panel.oy,
        panel.scale / 100.0
    )
}

// ─── DOM projection ──────────────────────────────────────────────────────

/// One panel's CSS placement within its row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomCell {
    pub panel: PanelId,
    pub grid_column: String,
    pub grid_row: String,
    /// Box relative to the row, percent of row width / height.
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomRow {
    pub row: RowId,
    /// `None` for single rows, which are plain blocks.
    pub template_columns: Option<String>,
    pub template_rows: Option<String>,
    /// Row height in pixels.
    pub height: f32,
    pub cells: Vec<DomCell>,
}

/// CSS view of [`layout_page`]: grid templates and percentage boxes.
pub fn dom_layout(page: &Page, metrics: &PageMetrics) -> Vec<DomRow> {
    let resolved = layout_page(page, metrics);
    resolved
        .rows
        .iter()
        .map(|row| {
            let pct = |v: f32, of: f32| if of > 0.0 { v / of * 100.0 } else { 0.0 };
            DomRow {
                row: row.row,
                template_columns: row.grid.as_ref().map(GridLayout::cols_template),
                template_rows: row.grid.as_ref().map(GridLayout::rows_template),
                height: row.height,
                cells: row
                    .panels
                    .iter()
                    .map(|b| DomCell {
                        panel: b.panel,
                        grid_column: b.cell.col.to_string(),
                        grid_row: b.cell.row.to_string(),
                        left: pct(b.rect.x, resolved.width),
                        top: pct(b.rect.y - row.y, row.height),
                        width: pct(b.rect.width, resolved.width),
                        height: pct(b.rect.height, row.height),
                    })
                    .collect(),
            }
        })
        .collect()
}
